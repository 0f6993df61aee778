//! Recording session management
//!
//! `SessionManager` owns the lifecycle of in-progress captures: begin,
//! accept-chunk, live transcript/waveform snapshots, finalize, cancel. The
//! duration limit is enforced lazily on each accepted chunk rather than by a
//! background timer; a session that stops receiving chunks stays "open but
//! over limit" until the next accept or an explicit finalize/cancel.

mod manager;
mod recording;

pub use manager::{FinalizeOutcome, SessionError, SessionId, SessionManager};
pub use recording::{AudioChunk, RecordingSession, DEFAULT_MAX_DURATION};
