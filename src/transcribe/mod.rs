//! Transcription dispatch
//!
//! The dispatcher owns the lazily loaded, device-pinned model handle and
//! routes decoded audio into a [`SpeechBackend`]. The backend is a narrow
//! trait so recognition engines stay swappable; a whisper.cpp implementation
//! ships behind the `whisper` feature.

mod backend;
mod dispatcher;

#[cfg(feature = "whisper")]
mod whisper;

pub use backend::{BackendError, DecodePath, SpeechBackend, TranscribeFailure, TranscriptResult};
pub use dispatcher::TranscriptionDispatcher;

#[cfg(feature = "whisper")]
pub use whisper::WhisperBackend;
