use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tokio::task;
use tracing::{debug, info, warn};

use super::backend::{
    BackendError, DecodePath, SpeechBackend, TranscribeFailure, TranscriptResult,
};
use crate::audio::{
    DecodeCascade, DecodeError, DecodeStrategy, DecodedAudio, FfmpegStrategy, FormatHint,
};
use crate::device::DeviceContext;

/// Upper bound on the domain-conditioning text prepended to the model prompt.
const MAX_DOMAIN_CONTEXT_CHARS: usize = 2000;

struct ModelState {
    loaded: bool,
    load_time_ms: u64,
}

/// Routes audio into the speech backend, preferring the external demuxer and
/// falling back to the decode cascade.
///
/// The model handle is a single shared, expensive resource; the internal lock
/// serializes inference because the accelerator context is not assumed to be
/// safely re-entrant.
pub struct TranscriptionDispatcher {
    backend: Arc<dyn SpeechBackend>,
    cascade: Arc<DecodeCascade>,
    supported_languages: Vec<String>,
    domain_context: Option<String>,
    model: Mutex<ModelState>,
}

impl TranscriptionDispatcher {
    pub fn new(
        device: &DeviceContext,
        backend: Arc<dyn SpeechBackend>,
        cascade: DecodeCascade,
        domain_context: Option<String>,
    ) -> Self {
        let domain_context = domain_context.map(|text| {
            if text.chars().count() > MAX_DOMAIN_CONTEXT_CHARS {
                text.chars().take(MAX_DOMAIN_CONTEXT_CHARS).collect()
            } else {
                text
            }
        });

        info!(
            device = %device.device,
            model = %device.model_variant,
            languages = ?device.supported_languages,
            has_domain_context = domain_context.is_some(),
            "transcription dispatcher created"
        );

        Self {
            backend,
            cascade: Arc::new(cascade),
            supported_languages: device.supported_languages.clone(),
            domain_context,
            model: Mutex::new(ModelState {
                loaded: false,
                load_time_ms: 0,
            }),
        }
    }

    /// Transcribe an audio blob. Never fails past this boundary: every error
    /// is captured into the returned result.
    pub async fn transcribe(&self, bytes: &[u8], hint: FormatHint) -> TranscriptResult {
        if bytes.is_empty() {
            return TranscriptResult::failed(TranscribeFailure::NoAudio);
        }

        // Serializes concurrent transcribe calls and guards lazy-load state.
        let mut model = self.model.lock().await;

        if !model.loaded {
            let t0 = Instant::now();
            match self.backend.load().await {
                Ok(()) => {
                    model.loaded = true;
                    model.load_time_ms = t0.elapsed().as_millis() as u64;
                    info!(load_ms = model.load_time_ms, "speech backend loaded");
                }
                Err(e) => {
                    warn!(error = %e, "speech backend failed to load");
                    return TranscriptResult::failed(TranscribeFailure::ModelUnavailable(
                        e.to_string(),
                    ));
                }
            }
        }
        let load_time_ms = model.load_time_ms;

        let mut primary_failure: Option<String> = None;

        // Primary path: decode through the external demuxer when present.
        if FfmpegStrategy::demuxer_available() {
            match Self::decode_primary(bytes.to_vec(), hint, self.cascade.target_rate()).await {
                Ok(audio) => {
                    match self
                        .run_inference(&audio, load_time_ms, DecodePath::Primary)
                        .await
                    {
                        Ok(result) => return result,
                        Err(e) => {
                            warn!(error = %e, "primary path inference failed");
                            primary_failure = Some(e.to_string());
                        }
                    }
                }
                Err(reason) => {
                    debug!(%reason, "primary decode path failed, falling back to cascade");
                    primary_failure = Some(reason);
                }
            }
        } else {
            debug!("external demuxer unavailable, skipping primary decode path");
        }

        // Fallback path: the full decode cascade at the model's required rate.
        let cascade = Arc::clone(&self.cascade);
        let input = bytes.to_vec();
        let decoded = task::spawn_blocking(move || cascade.decode(&input, hint)).await;

        match decoded {
            Ok(Ok(audio)) => match self
                .run_inference(&audio, load_time_ms, DecodePath::Fallback)
                .await
            {
                Ok(result) => result,
                Err(BackendError::ModelUnavailable(reason)) => {
                    TranscriptResult::failed(TranscribeFailure::ModelUnavailable(reason))
                }
                Err(BackendError::Inference(reason)) => {
                    TranscriptResult::failed(TranscribeFailure::Inference(reason))
                }
            },
            Ok(Err(DecodeError::EmptyAudio)) => {
                TranscriptResult::failed(TranscribeFailure::NoAudio)
            }
            Ok(Err(e)) => {
                let reason = match primary_failure {
                    Some(primary) => format!("primary: {primary}; cascade: {e}"),
                    None => e.to_string(),
                };
                TranscriptResult::failed(TranscribeFailure::DecodeFailed(reason))
            }
            Err(e) => {
                TranscriptResult::failed(TranscribeFailure::DecodeFailed(format!(
                    "decode task: {e}"
                )))
            }
        }
    }

    /// Demuxer decode is a process spawn plus pipe drain; run it off the
    /// async executor so other tasks keep making progress.
    async fn decode_primary(
        bytes: Vec<u8>,
        hint: FormatHint,
        target_rate: u32,
    ) -> Result<DecodedAudio, String> {
        task::spawn_blocking(move || FfmpegStrategy.try_decode(&bytes, hint, target_rate))
            .await
            .map_err(|e| format!("decode task: {e}"))?
    }

    async fn run_inference(
        &self,
        audio: &DecodedAudio,
        load_time_ms: u64,
        path: DecodePath,
    ) -> Result<TranscriptResult, BackendError> {
        let forced = self.pick_language(audio).await;

        let t0 = Instant::now();
        let (text, language) = self
            .backend
            .transcribe(
                &audio.samples,
                audio.sample_rate,
                forced.as_deref(),
                self.domain_context.as_deref(),
            )
            .await?;
        let infer_time_ms = t0.elapsed().as_millis() as u64;

        // Whatever the model reports, the surfaced language stays inside the
        // supported set (or empty when undetermined).
        let language = if self.supported_languages.iter().any(|l| *l == language) {
            language
        } else {
            String::new()
        };

        info!(
            ?path,
            infer_ms = infer_time_ms,
            language = %language,
            chars = text.len(),
            "transcription complete"
        );

        Ok(TranscriptResult {
            text: text.trim().to_string(),
            language,
            load_time_ms,
            infer_time_ms,
            path,
            failure: None,
        })
    }

    /// Restricted language check: probabilities over the supported set only.
    /// All-zero probabilities mean the detector was inconclusive, in which
    /// case the model is left to auto-detect.
    async fn pick_language(&self, audio: &DecodedAudio) -> Option<String> {
        if self.supported_languages.is_empty() {
            return None;
        }

        let probs = match self
            .backend
            .language_probs(&audio.samples, audio.sample_rate, &self.supported_languages)
            .await
        {
            Ok(p) if p.len() == self.supported_languages.len() => p,
            Ok(_) | Err(_) => return None,
        };

        if probs.iter().all(|p| *p == 0.0) {
            return None;
        }

        let (idx, prob) = probs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, p)| (i, *p))?;

        debug!(language = %self.supported_languages[idx], prob, "restricted language detection");
        Some(self.supported_languages[idx].clone())
    }
}
