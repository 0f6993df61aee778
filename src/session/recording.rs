use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::audio::FormatHint;

/// Default cap on a single recording session (one minute).
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(60);

/// One arrival unit of raw audio bytes pushed into an open session.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub bytes: Vec<u8>,
    /// Arrival offset from session creation, in milliseconds
    pub offset_ms: u64,
}

/// In-memory state of one in-progress capture.
///
/// Chunks are append-only while the session is open; the closed flag is
/// one-way. Elapsed time is measured against a monotonic clock, so it can
/// never be reported negative.
#[derive(Debug)]
pub struct RecordingSession {
    owner: String,
    created_at: DateTime<Utc>,
    started: Instant,
    max_duration: Duration,
    declared_sample_rate: Option<u32>,
    chunks: Vec<AudioChunk>,
    live_transcript: String,
    closed: bool,
}

impl RecordingSession {
    pub fn new(owner: String, max_duration: Duration) -> Self {
        Self {
            owner,
            created_at: Utc::now(),
            started: Instant::now(),
            max_duration,
            declared_sample_rate: None,
            chunks: Vec::new(),
            live_transcript: String::new(),
            closed: false,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn is_over_limit(&self) -> bool {
        self.elapsed() >= self.max_duration
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn declared_sample_rate(&self) -> Option<u32> {
        self.declared_sample_rate
    }

    pub fn live_transcript(&self) -> &str {
        &self.live_transcript
    }

    /// Append a chunk and re-evaluate the duration limit.
    ///
    /// The first sample-rate declaration wins; later hints are ignored. When
    /// the limit is exceeded the session closes, but the accepting call has
    /// already succeeded; only the next push is refused by the manager.
    pub fn push_chunk(&mut self, bytes: Vec<u8>, sample_rate_hint: Option<u32>) {
        if self.declared_sample_rate.is_none() {
            self.declared_sample_rate = sample_rate_hint;
        }

        let offset_ms = self.started.elapsed().as_millis() as u64;
        self.chunks.push(AudioChunk { bytes, offset_ms });

        // Progress marker until the real transcript lands at finalize.
        if self.chunks.len() % 3 == 0 {
            if !self.live_transcript.is_empty() {
                self.live_transcript.push(' ');
            }
            self.live_transcript.push_str("...");
        }

        if self.is_over_limit() {
            self.closed = true;
        }
    }

    /// Container format guess from the first chunk's magic bytes.
    pub fn format_hint(&self) -> FormatHint {
        self.chunks
            .first()
            .map(|c| FormatHint::sniff(&c.bytes))
            .unwrap_or(FormatHint::Unknown)
    }

    /// Single byte buffer representing this session's capture.
    ///
    /// Streamed containers put their header on the first blob; when later
    /// chunks are header-less continuations, concatenation reproduces the
    /// complete file. Independent fragments cannot be safely joined, so the
    /// largest single chunk stands in as a documented heuristic.
    pub fn best_effort_audio(&self) -> Vec<u8> {
        if self.chunks.is_empty() {
            return Vec::new();
        }
        if self.chunks.len() == 1 {
            return self.chunks[0].bytes.clone();
        }

        if self.is_continuation_stream() {
            let total = self.chunks.iter().map(|c| c.bytes.len()).sum();
            let mut joined = Vec::with_capacity(total);
            for chunk in &self.chunks {
                joined.extend_from_slice(&chunk.bytes);
            }
            return joined;
        }

        self.chunks
            .iter()
            .max_by_key(|c| c.bytes.len())
            .map(|c| c.bytes.clone())
            .unwrap_or_default()
    }

    /// True when chunk 0 carries a container header and no later chunk does.
    fn is_continuation_stream(&self) -> bool {
        let Some(first) = self.chunks.first() else {
            return false;
        };
        if FormatHint::sniff(&first.bytes) == FormatHint::Unknown {
            return false;
        }
        self.chunks[1..]
            .iter()
            .all(|c| FormatHint::sniff(&c.bytes) == FormatHint::Unknown)
    }

}

/// Per-window RMS loudness of decoded PCM, at most `max_points` values in
/// [0, 1]. The manager feeds this from the decoded best-effort audio; an
/// undecodable capture yields an empty snapshot rather than a synthetic one.
pub(crate) fn rms_windows(samples: &[f32], max_points: usize) -> Vec<f32> {
    if samples.is_empty() || max_points == 0 {
        return Vec::new();
    }

    let windows = max_points.min(samples.len());
    let window_len = samples.len().div_ceil(windows);
    samples
        .chunks(window_len)
        .map(|window| {
            let energy = window.iter().map(|s| s * s).sum::<f32>() / window.len() as f32;
            energy.sqrt().clamp(0.0, 1.0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_rate_declaration_wins() {
        let mut session = RecordingSession::new("user-1".into(), DEFAULT_MAX_DURATION);
        session.push_chunk(vec![1, 2, 3], Some(48_000));
        session.push_chunk(vec![4, 5, 6], Some(8_000));
        assert_eq!(session.declared_sample_rate(), Some(48_000));
    }

    #[test]
    fn missing_hint_leaves_rate_open_for_later_declaration() {
        let mut session = RecordingSession::new("user-1".into(), DEFAULT_MAX_DURATION);
        session.push_chunk(vec![1], None);
        assert_eq!(session.declared_sample_rate(), None);
        session.push_chunk(vec![2], Some(44_100));
        assert_eq!(session.declared_sample_rate(), Some(44_100));
    }

    #[test]
    fn largest_chunk_heuristic() {
        let mut session = RecordingSession::new("user-1".into(), DEFAULT_MAX_DURATION);
        session.push_chunk(vec![1u8; 10], None);
        session.push_chunk(vec![2u8; 50], None);
        session.push_chunk(vec![3u8; 30], None);
        assert_eq!(session.best_effort_audio(), vec![2u8; 50]);
    }

    #[test]
    fn continuation_stream_is_concatenated() {
        let mut session = RecordingSession::new("user-1".into(), DEFAULT_MAX_DURATION);
        // First chunk carries the container header, later ones do not.
        let mut header_chunk = b"OggS".to_vec();
        header_chunk.extend_from_slice(&[0u8; 60]);
        session.push_chunk(header_chunk.clone(), None);
        session.push_chunk(vec![9u8; 100], None);
        let joined = session.best_effort_audio();
        assert_eq!(joined.len(), header_chunk.len() + 100);
        assert_eq!(&joined[..4], b"OggS");
    }

    #[test]
    fn zero_budget_session_closes_on_first_chunk() {
        let mut session = RecordingSession::new("user-1".into(), Duration::ZERO);
        assert!(!session.is_closed());
        session.push_chunk(vec![1, 2, 3], None);
        assert!(session.is_over_limit());
        assert!(session.is_closed());
        assert_eq!(session.chunk_count(), 1);
    }

    #[test]
    fn live_transcript_gains_progress_marker_every_third_chunk() {
        let mut session = RecordingSession::new("user-1".into(), DEFAULT_MAX_DURATION);
        for _ in 0..6 {
            session.push_chunk(vec![0u8; 4], None);
        }
        assert_eq!(session.live_transcript(), "... ...");
    }

    #[test]
    fn empty_session_has_no_audio_and_unknown_format() {
        let session = RecordingSession::new("user-1".into(), DEFAULT_MAX_DURATION);
        assert!(session.best_effort_audio().is_empty());
        assert_eq!(session.format_hint(), FormatHint::Unknown);
    }

    #[test]
    fn rms_windows_caps_point_count_and_range() {
        let samples = vec![0.5f32; 1000];
        let points = rms_windows(&samples, 64);
        assert_eq!(points.len(), 63);
        assert!(points.iter().all(|p| (*p - 0.5).abs() < 1e-3));
    }

    #[test]
    fn rms_windows_of_nothing_is_empty() {
        assert!(rms_windows(&[], 64).is_empty());
        assert!(rms_windows(&[0.5], 0).is_empty());
    }
}
