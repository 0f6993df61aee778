use std::fmt;
use std::io::{Cursor, Write};
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use super::resample::{downmix_to_mono, resample_linear};

/// Declared (or sniffed) container format for an incoming audio buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatHint {
    Wav,
    Webm,
    Ogg,
    Mp3,
    Unknown,
}

impl FormatHint {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "wav" => Self::Wav,
            "webm" => Self::Webm,
            "ogg" | "oga" | "opus" => Self::Ogg,
            "mp3" => Self::Mp3,
            _ => Self::Unknown,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Webm => "webm",
            Self::Ogg => "ogg",
            Self::Mp3 => "mp3",
            Self::Unknown => "bin",
        }
    }

    /// Identify a container by its leading magic bytes.
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.len() < 4 {
            return Self::Unknown;
        }
        match &bytes[..4] {
            b"RIFF" => Self::Wav,
            [0x1A, 0x45, 0xDF, 0xA3] => Self::Webm,
            b"OggS" => Self::Ogg,
            [b'I', b'D', b'3', _] => Self::Mp3,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for FormatHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Normalized output of the decode cascade: mono f32 samples in ~[-1.0, 1.0].
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Why one strategy declined or failed to decode a buffer.
#[derive(Debug, Clone)]
pub struct StrategyFailure {
    pub strategy: &'static str,
    pub reason: String,
}

impl fmt::Display for StrategyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.strategy, self.reason)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("empty audio input")]
    EmptyAudio,

    #[error("all decode strategies failed: {}", .0.iter().map(|f| f.to_string()).collect::<Vec<_>>().join("; "))]
    AllStrategiesFailed(Vec<StrategyFailure>),
}

/// One algorithm capable of turning bytes in some format subset into PCM.
///
/// Strategies are stateless; failures (including "cannot handle this format"
/// and "external dependency missing") are reported as reasons so the cascade
/// can aggregate them.
pub trait DecodeStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn try_decode(
        &self,
        bytes: &[u8],
        hint: FormatHint,
        target_rate: u32,
    ) -> Result<DecodedAudio, String>;
}

/// Handles uncompressed RIFF/WAV only, with no external tooling.
pub struct WavStrategy;

impl DecodeStrategy for WavStrategy {
    fn name(&self) -> &'static str {
        "wav"
    }

    fn try_decode(
        &self,
        bytes: &[u8],
        hint: FormatHint,
        target_rate: u32,
    ) -> Result<DecodedAudio, String> {
        if hint != FormatHint::Wav && hint != FormatHint::Unknown {
            return Err(format!("refusing {hint} container, handles WAV only"));
        }
        if bytes.len() < 12 || &bytes[..4] != b"RIFF" {
            return Err("not a RIFF stream".to_string());
        }

        let reader =
            hound::WavReader::new(Cursor::new(bytes)).map_err(|e| format!("wav parse: {e}"))?;
        let spec = reader.spec();
        let channels = spec.channels as usize;

        let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Float, _) => reader
                .into_samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(|e| format!("wav samples: {e}"))?,
            (hound::SampleFormat::Int, 16) => reader
                .into_samples::<i16>()
                .map(|s| s.map(|v| v as f32 / 32768.0))
                .collect::<Result<_, _>>()
                .map_err(|e| format!("wav samples: {e}"))?,
            (hound::SampleFormat::Int, 24) => reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 8_388_608.0))
                .collect::<Result<_, _>>()
                .map_err(|e| format!("wav samples: {e}"))?,
            (hound::SampleFormat::Int, 32) => reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 2_147_483_648.0))
                .collect::<Result<_, _>>()
                .map_err(|e| format!("wav samples: {e}"))?,
            (_, bits) => return Err(format!("unsupported bit depth: {bits}")),
        };

        let mono = downmix_to_mono(&samples, channels);
        let samples = resample_linear(&mono, spec.sample_rate, target_rate);
        Ok(DecodedAudio {
            samples,
            sample_rate: target_rate,
        })
    }
}

/// Handles compressed containers by piping through the external `ffmpeg`
/// demuxer. Fails with a distinct reason when the binary is not on PATH.
pub struct FfmpegStrategy;

impl FfmpegStrategy {
    /// Probe for the external demuxer once per process; the result is cached
    /// so repeated transcribe/waveform calls do not re-spawn the binary.
    pub fn demuxer_available() -> bool {
        static PRESENT: OnceLock<bool> = OnceLock::new();
        *PRESENT.get_or_init(|| {
            Command::new("ffmpeg")
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|s| s.success())
                .unwrap_or(false)
        })
    }
}

impl DecodeStrategy for FfmpegStrategy {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn try_decode(
        &self,
        bytes: &[u8],
        hint: FormatHint,
        target_rate: u32,
    ) -> Result<DecodedAudio, String> {
        if !Self::demuxer_available() {
            return Err("ffmpeg demuxer not found on PATH".to_string());
        }

        debug!(%hint, input_bytes = bytes.len(), "invoking external demuxer");

        let mut child = Command::new("ffmpeg")
            .args([
                "-hide_banner",
                "-loglevel",
                "error",
                "-i",
                "pipe:0",
                "-f",
                "f32le",
                "-ac",
                "1",
                "-ar",
                &target_rate.to_string(),
                "pipe:1",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("spawn ffmpeg: {e}"))?;

        // Feed stdin from a separate thread so a full stdout pipe can't deadlock us.
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| "ffmpeg stdin unavailable".to_string())?;
        let input = bytes.to_vec();
        let writer = std::thread::spawn(move || {
            let _ = stdin.write_all(&input);
        });

        let output = child
            .wait_with_output()
            .map_err(|e| format!("ffmpeg wait: {e}"))?;
        let _ = writer.join();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr.trim()
            ));
        }
        if output.stdout.is_empty() {
            return Err("ffmpeg produced no samples".to_string());
        }

        let samples: Vec<f32> = output
            .stdout
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        Ok(DecodedAudio {
            samples,
            sample_rate: target_rate,
        })
    }
}

/// General-purpose best-effort loader backed by symphonia's format probe.
pub struct SymphoniaStrategy;

impl DecodeStrategy for SymphoniaStrategy {
    fn name(&self) -> &'static str {
        "symphonia"
    }

    fn try_decode(
        &self,
        bytes: &[u8],
        hint: FormatHint,
        target_rate: u32,
    ) -> Result<DecodedAudio, String> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

        let mut probe_hint = Hint::new();
        if hint != FormatHint::Unknown {
            probe_hint.with_extension(hint.extension());
        }

        let probed = symphonia::default::get_probe()
            .format(
                &probe_hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| format!("probe: {e}"))?;

        let mut format = probed.format;
        let track = format
            .default_track()
            .ok_or_else(|| "no audio track found".to_string())?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let source_rate = codec_params
            .sample_rate
            .ok_or_else(|| "unknown sample rate".to_string())?;
        let channels = codec_params.channels.map(|c| c.count()).unwrap_or(1);

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| format!("codec: {e}"))?;

        let mut samples: Vec<f32> = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(symphonia::core::errors::Error::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => return Err(format!("packet: {e}")),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(symphonia::core::errors::Error::DecodeError(e)) => {
                    warn!(error = %e, "skipping corrupt audio frame");
                    continue;
                }
                Err(e) => return Err(format!("decode: {e}")),
            };

            let spec = *decoded.spec();
            let frames = decoded.frames();
            if frames == 0 {
                continue;
            }

            let mut buf = SampleBuffer::<f32>::new(frames as u64, spec);
            buf.copy_interleaved_ref(decoded);
            samples.extend(downmix_to_mono(buf.samples(), channels));
        }

        if samples.is_empty() {
            return Err("no audio samples decoded".to_string());
        }

        let samples = resample_linear(&samples, source_rate, target_rate);
        Ok(DecodedAudio {
            samples,
            sample_rate: target_rate,
        })
    }
}

/// Ordered list of decode strategies tried until one produces PCM.
///
/// The order is simple-format-first: plain WAV without tooling, compressed
/// containers through the external demuxer, then symphonia as the catch-all.
pub struct DecodeCascade {
    target_rate: u32,
    strategies: Vec<Box<dyn DecodeStrategy>>,
}

impl DecodeCascade {
    pub fn new(target_rate: u32) -> Self {
        Self::with_strategies(
            target_rate,
            vec![
                Box::new(WavStrategy),
                Box::new(FfmpegStrategy),
                Box::new(SymphoniaStrategy),
            ],
        )
    }

    pub fn with_strategies(target_rate: u32, strategies: Vec<Box<dyn DecodeStrategy>>) -> Self {
        Self {
            target_rate,
            strategies,
        }
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Decode `bytes` to mono PCM at the cascade's target rate.
    ///
    /// Empty input short-circuits without attempting any strategy. Otherwise
    /// each strategy is tried in order; total failure carries one reason per
    /// attempted strategy.
    pub fn decode(&self, bytes: &[u8], hint: FormatHint) -> Result<DecodedAudio, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::EmptyAudio);
        }

        let mut failures = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            match strategy.try_decode(bytes, hint, self.target_rate) {
                Ok(audio) => {
                    debug!(
                        strategy = strategy.name(),
                        samples = audio.samples.len(),
                        duration_secs = audio.duration_seconds(),
                        "audio decoded"
                    );
                    return Ok(audio);
                }
                Err(reason) => {
                    debug!(strategy = strategy.name(), %reason, "decode strategy failed");
                    failures.push(StrategyFailure {
                        strategy: strategy.name(),
                        reason,
                    });
                }
            }
        }

        warn!(attempts = failures.len(), "no decode strategy could parse the audio");
        Err(DecodeError::AllStrategiesFailed(failures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniff_identifies_common_containers() {
        assert_eq!(FormatHint::sniff(b"RIFF....WAVE"), FormatHint::Wav);
        assert_eq!(FormatHint::sniff(&[0x1A, 0x45, 0xDF, 0xA3, 0x00]), FormatHint::Webm);
        assert_eq!(FormatHint::sniff(b"OggS\x00\x02"), FormatHint::Ogg);
        assert_eq!(FormatHint::sniff(b"ID3\x04rest"), FormatHint::Mp3);
        assert_eq!(FormatHint::sniff(&[1, 2, 3, 4]), FormatHint::Unknown);
        assert_eq!(FormatHint::sniff(&[1]), FormatHint::Unknown);
    }

    #[test]
    fn hint_from_extension() {
        assert_eq!(FormatHint::from_extension("WAV"), FormatHint::Wav);
        assert_eq!(FormatHint::from_extension("opus"), FormatHint::Ogg);
        assert_eq!(FormatHint::from_extension("flac"), FormatHint::Unknown);
    }

    #[test]
    fn wav_strategy_refuses_other_containers() {
        let err = WavStrategy
            .try_decode(b"RIFF....WAVE", FormatHint::Mp3, 16000)
            .unwrap_err();
        assert!(err.contains("WAV only"));
    }

    #[test]
    fn wav_strategy_rejects_non_riff_bytes() {
        let err = WavStrategy
            .try_decode(&[0u8; 64], FormatHint::Wav, 16000)
            .unwrap_err();
        assert!(err.contains("RIFF"));
    }
}
