use async_trait::async_trait;
use serde::Serialize;

/// Narrow boundary to the speech-recognition model.
///
/// Implementations own the model handle; the dispatcher never sees a vendor
/// API. `load` must be idempotent so the dispatcher can call it lazily.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Load the model if it is not already resident.
    async fn load(&self) -> Result<(), BackendError>;

    /// Transcribe mono f32 PCM at `sample_rate`.
    ///
    /// Returns the recognized text and a language code. `forced_language`
    /// skips the model's own detection; `prompt` biases vocabulary.
    async fn transcribe(
        &self,
        pcm: &[f32],
        sample_rate: u32,
        forced_language: Option<&str>,
        prompt: Option<&str>,
    ) -> Result<(String, String), BackendError>;

    /// Class probabilities for `candidates` only, skipping full detection.
    ///
    /// The default is inconclusive (all zeros), which leaves language
    /// selection to the model itself.
    async fn language_probs(
        &self,
        _pcm: &[f32],
        _sample_rate: u32,
        candidates: &[String],
    ) -> Result<Vec<f32>, BackendError> {
        Ok(vec![0.0; candidates.len()])
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Model weights or driver could not be loaded.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// The model loaded but inference failed.
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Which decode path produced a transcription result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodePath {
    Primary,
    Fallback,
    None,
}

/// Captured transcription failure, folded into results instead of raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum TranscribeFailure {
    NoAudio,
    DecodeFailed(String),
    ModelUnavailable(String),
    Inference(String),
}

impl std::fmt::Display for TranscribeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAudio => f.write_str("no audio to transcribe"),
            Self::DecodeFailed(reason) => write!(f, "decode failed: {reason}"),
            Self::ModelUnavailable(reason) => write!(f, "model unavailable: {reason}"),
            Self::Inference(reason) => write!(f, "inference failed: {reason}"),
        }
    }
}

/// Outcome of one transcription request. Always well-formed: failures are
/// carried in `failure` with an empty transcript rather than propagated.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptResult {
    pub text: String,
    /// Detected or forced language code; empty when undetermined
    pub language: String,
    pub load_time_ms: u64,
    pub infer_time_ms: u64,
    pub path: DecodePath,
    pub failure: Option<TranscribeFailure>,
}

impl TranscriptResult {
    pub fn failed(failure: TranscribeFailure) -> Self {
        Self {
            text: String::new(),
            language: String::new(),
            load_time_ms: 0,
            infer_time_ms: 0,
            path: DecodePath::None,
            failure: Some(failure),
        }
    }
}
