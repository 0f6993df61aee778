pub mod audio;
pub mod config;
pub mod device;
pub mod session;
pub mod transcribe;

pub use audio::{DecodeCascade, DecodeError, DecodedAudio, FormatHint, StrategyFailure};
pub use config::Config;
pub use device::{Device, DeviceContext};
pub use session::{
    FinalizeOutcome, RecordingSession, SessionError, SessionId, SessionManager,
    DEFAULT_MAX_DURATION,
};
pub use transcribe::{
    BackendError, DecodePath, SpeechBackend, TranscribeFailure, TranscriptResult,
    TranscriptionDispatcher,
};
