//! Local whisper.cpp backend (feature `whisper`).

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task;
use tracing::info;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use super::backend::{BackendError, SpeechBackend};

/// Speech backend wrapping a GGML whisper model.
///
/// The context is created once on `load` and reused; a fresh decoding state is
/// created per transcription call. Model loading and inference are CPU-bound
/// native calls, so both run on the blocking pool.
pub struct WhisperBackend {
    model_path: PathBuf,
    n_threads: i32,
    ctx: Mutex<Option<Arc<WhisperContext>>>,
}

impl WhisperBackend {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
            .min(8) as i32;
        Self {
            model_path: model_path.into(),
            n_threads: threads,
            ctx: Mutex::new(None),
        }
    }
}

#[async_trait]
impl SpeechBackend for WhisperBackend {
    async fn load(&self) -> Result<(), BackendError> {
        let mut ctx = self.ctx.lock().await;
        if ctx.is_some() {
            return Ok(());
        }

        let path = self.model_path.to_string_lossy().to_string();
        if !self.model_path.exists() {
            return Err(BackendError::ModelUnavailable(format!(
                "model file not found: {path}"
            )));
        }

        info!(model = %path, "loading whisper model");
        let loaded = task::spawn_blocking(move || {
            WhisperContext::new_with_params(&path, WhisperContextParameters::default())
        })
        .await
        .map_err(|e| BackendError::ModelUnavailable(format!("load task: {e}")))?
        .map_err(|e| BackendError::ModelUnavailable(format!("load whisper model: {e}")))?;
        *ctx = Some(Arc::new(loaded));
        Ok(())
    }

    async fn transcribe(
        &self,
        pcm: &[f32],
        _sample_rate: u32,
        forced_language: Option<&str>,
        prompt: Option<&str>,
    ) -> Result<(String, String), BackendError> {
        let ctx = {
            let guard = self.ctx.lock().await;
            guard
                .as_ref()
                .cloned()
                .ok_or_else(|| BackendError::ModelUnavailable("model not loaded".to_string()))?
        };

        let pcm = pcm.to_vec();
        let forced = forced_language.map(str::to_string);
        let prompt = prompt.map(str::to_string);
        let n_threads = self.n_threads;

        task::spawn_blocking(move || {
            let mut state = ctx
                .create_state()
                .map_err(|e| BackendError::Inference(format!("create state: {e}")))?;

            let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
            match forced.as_deref() {
                Some(lang) => {
                    params.set_language(Some(lang));
                    params.set_detect_language(false);
                }
                None => {
                    params.set_language(None);
                    params.set_detect_language(true);
                }
            }
            if let Some(prompt) = prompt.as_deref() {
                params.set_initial_prompt(prompt);
            }
            params.set_n_threads(n_threads);
            params.set_print_progress(false);
            params.set_print_timestamps(false);
            params.set_print_special(false);
            params.set_print_realtime(false);
            params.set_translate(false);

            state
                .full(params, &pcm)
                .map_err(|e| BackendError::Inference(format!("whisper full: {e}")))?;

            let num_segments = state
                .full_n_segments()
                .map_err(|e| BackendError::Inference(format!("segment count: {e}")))?;

            let mut text = String::new();
            for i in 0..num_segments {
                let segment = state
                    .full_get_segment_text(i)
                    .map_err(|e| BackendError::Inference(format!("segment {i}: {e}")))?;
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(segment.trim());
            }

            let language = forced.unwrap_or_default();
            Ok((text, language))
        })
        .await
        .map_err(|e| BackendError::Inference(format!("inference task: {e}")))?
    }
}
