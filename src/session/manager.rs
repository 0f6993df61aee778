use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::recording::{rms_windows, RecordingSession};
use crate::audio::DecodeCascade;
use crate::transcribe::{DecodePath, TranscribeFailure, TranscriptResult, TranscriptionDispatcher};

/// Opaque identifier for one recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SessionId(Uuid);

impl SessionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Operation on an id that was never issued or already finalized/cancelled.
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),

    /// Chunk pushed after the session closed; the caller should stop streaming.
    #[error("session is closed: {0}")]
    SessionClosed(SessionId),
}

/// Metadata returned by `finalize`. Always well-formed: transcription
/// failures are captured in `failure` instead of raised, so a session can
/// always be closed cleanly.
#[derive(Debug, Clone, Serialize)]
pub struct FinalizeOutcome {
    pub session_id: SessionId,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub chunk_count: usize,
    pub transcript: String,
    pub language: String,
    pub decode_path: DecodePath,
    pub load_time_ms: u64,
    pub infer_time_ms: u64,
    pub failure: Option<TranscribeFailure>,
}

/// Registry and lifecycle owner for in-progress recordings.
///
/// Sessions are independent units of state: per-session mutation happens under
/// each session's own lock, so operations on different sessions never block
/// each other. `finalize` and `cancel` remove the entry under the registry
/// write lock, which makes their destructive effect atomic with respect to a
/// racing `accept_chunk`.
pub struct SessionManager {
    dispatcher: Arc<TranscriptionDispatcher>,
    cascade: Arc<DecodeCascade>,
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<RecordingSession>>>>,
}

impl SessionManager {
    pub fn new(dispatcher: Arc<TranscriptionDispatcher>, cascade: DecodeCascade) -> Self {
        Self {
            dispatcher,
            cascade: Arc::new(cascade),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Allocate a new open, empty session. Always succeeds.
    pub async fn begin(&self, owner: impl Into<String>, max_duration: Duration) -> SessionId {
        let id = SessionId::new();
        let session = RecordingSession::new(owner.into(), max_duration);
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(session)));
        info!(session = %id, max_ms = max_duration.as_millis() as u64, "recording session started");
        id
    }

    async fn get(&self, id: SessionId) -> Result<Arc<Mutex<RecordingSession>>, SessionError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(SessionError::UnknownSession(id))
    }

    /// Append an audio chunk to an open session.
    ///
    /// Closing due to the duration limit happens after the append: this call
    /// still succeeds, the next one fails with `SessionClosed`.
    pub async fn accept_chunk(
        &self,
        id: SessionId,
        bytes: Vec<u8>,
        sample_rate_hint: Option<u32>,
    ) -> Result<(), SessionError> {
        let session = self.get(id).await?;
        let mut session = session.lock().await;

        // A finalize/cancel may have raced us between the registry lookup and
        // the session lock; the registry is the source of truth.
        if !self.sessions.read().await.contains_key(&id) {
            return Err(SessionError::UnknownSession(id));
        }
        if session.is_closed() {
            return Err(SessionError::SessionClosed(id));
        }

        session.push_chunk(bytes, sample_rate_hint);

        if session.is_closed() {
            info!(
                session = %id,
                elapsed_ms = session.elapsed().as_millis() as u64,
                "session reached its duration limit, no further chunks will be accepted"
            );
        }
        Ok(())
    }

    /// Snapshot of the running best-effort transcript.
    pub async fn live_transcript(&self, id: SessionId) -> Result<String, SessionError> {
        let session = self.get(id).await?;
        let session = session.lock().await;
        Ok(session.live_transcript().to_string())
    }

    /// Loudness-over-time snapshot: at most `max_points` values in [-1, 1],
    /// derived from the decoded capture (empty when nothing decodes yet).
    ///
    /// The session lock is released before decoding; the cascade runs on the
    /// blocking pool so snapshots never stall other sessions.
    pub async fn waveform(&self, id: SessionId, max_points: usize) -> Result<Vec<f32>, SessionError> {
        let session = self.get(id).await?;
        let (audio, hint) = {
            let session = session.lock().await;
            (session.best_effort_audio(), session.format_hint())
        };
        if max_points == 0 || audio.is_empty() {
            return Ok(Vec::new());
        }

        let cascade = Arc::clone(&self.cascade);
        let points = task::spawn_blocking(move || match cascade.decode(&audio, hint) {
            Ok(decoded) => rms_windows(&decoded.samples, max_points),
            Err(e) => {
                debug!(error = %e, "waveform snapshot: captured audio not decodable");
                Vec::new()
            }
        })
        .await
        .unwrap_or_default();
        Ok(points)
    }

    /// Single contiguous byte buffer representing the session's capture.
    pub async fn best_effort_audio(&self, id: SessionId) -> Result<Vec<u8>, SessionError> {
        let session = self.get(id).await?;
        let session = session.lock().await;
        Ok(session.best_effort_audio())
    }

    /// Close the session, transcribe its best-effort audio, and remove it
    /// from the registry.
    ///
    /// Decode/transcription failures never propagate: they are folded into
    /// the outcome so the caller always receives well-formed metadata.
    pub async fn finalize(&self, id: SessionId) -> Result<FinalizeOutcome, SessionError> {
        let session = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or(SessionError::UnknownSession(id))?;

        let mut session = session.lock().await;
        session.close();

        let audio = session.best_effort_audio();
        let hint = session.format_hint();

        let result = if audio.is_empty() {
            info!(session = %id, "finalized with no audio to transcribe");
            TranscriptResult::failed(TranscribeFailure::NoAudio)
        } else {
            self.dispatcher.transcribe(&audio, hint).await
        };

        if let Some(failure) = &result.failure {
            warn!(session = %id, %failure, "transcription did not produce text");
        }

        let transcript = if result.text.is_empty() {
            session.live_transcript().trim().to_string()
        } else {
            result.text.clone()
        };

        let outcome = FinalizeOutcome {
            session_id: id,
            owner: session.owner().to_string(),
            created_at: session.created_at(),
            duration_ms: session.elapsed().as_millis() as u64,
            chunk_count: session.chunk_count(),
            transcript,
            language: result.language,
            decode_path: result.path,
            load_time_ms: result.load_time_ms,
            infer_time_ms: result.infer_time_ms,
            failure: result.failure,
        };

        info!(
            session = %id,
            path = ?outcome.decode_path,
            chunks = outcome.chunk_count,
            "recording session finalized"
        );
        Ok(outcome)
    }

    /// Close and discard a session without transcribing. Effective
    /// immediately: no further effects from this session can be observed.
    pub async fn cancel(&self, id: SessionId) -> Result<(), SessionError> {
        let session = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or(SessionError::UnknownSession(id))?;
        session.lock().await.close();
        info!(session = %id, "recording session cancelled");
        Ok(())
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }
}
