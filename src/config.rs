use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub transcribe: TranscribeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// Sample rate the recognition model expects (16kHz for Whisper-family models)
    #[serde(default = "default_sample_rate")]
    pub target_sample_rate: u32,

    /// Maximum recording session length in milliseconds
    #[serde(default = "default_max_duration_ms")]
    pub max_duration_ms: u64,

    /// Number of waveform points served to the UI per snapshot
    #[serde(default = "default_waveform_points")]
    pub waveform_points: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscribeConfig {
    /// Model variant override; picked from the device probe when unset
    #[serde(default)]
    pub model_variant: Option<String>,

    /// Path to local model weights (used by the whisper feature)
    #[serde(default)]
    pub model_path: Option<String>,

    /// Languages the restricted detection pass may force
    #[serde(default = "default_languages")]
    pub supported_languages: Vec<String>,

    /// Optional text file with domain terminology used to bias the prompt
    #[serde(default)]
    pub domain_context_path: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
        }
    }
}

impl Default for TranscribeConfig {
    fn default() -> Self {
        Self {
            model_variant: None,
            model_path: None,
            supported_languages: default_languages(),
            domain_context_path: None,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: default_sample_rate(),
            max_duration_ms: default_max_duration_ms(),
            waveform_points: default_waveform_points(),
        }
    }
}

fn default_service_name() -> String {
    "voice-intake".to_string()
}

fn default_sample_rate() -> u32 {
    16_000
}

fn default_max_duration_ms() -> u64 {
    60_000
}

fn default_waveform_points() -> usize {
    200
}

fn default_languages() -> Vec<String> {
    vec!["en".to_string(), "ar".to_string()]
}

impl Config {
    /// Load configuration from a TOML file; every field has a default so a
    /// missing file yields a usable config.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let cfg = Config::default();
        assert_eq!(cfg.audio.target_sample_rate, 16_000);
        assert_eq!(cfg.audio.max_duration_ms, 60_000);
        assert_eq!(cfg.audio.waveform_points, 200);
        assert_eq!(cfg.transcribe.supported_languages, vec!["en", "ar"]);
        assert!(cfg.transcribe.model_variant.is_none());
    }
}
