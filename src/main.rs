use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

use voice_intake::audio::{DecodeCascade, FormatHint};
use voice_intake::{Config, DeviceContext};

#[derive(Parser)]
#[command(name = "voice-intake", about = "Voice capture to transcript pipeline")]
struct Args {
    /// Configuration file (TOML; extension may be omitted)
    #[arg(long, default_value = "config/voice-intake")]
    config: String,

    /// Audio file to decode (and transcribe when a speech backend is compiled in)
    audio_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;
    let device = DeviceContext::detect(&cfg);

    info!("{} starting", cfg.service.name);
    info!(
        device = %device.device,
        model = %device.model_variant,
        languages = ?device.supported_languages,
        "device context"
    );

    let Some(path) = args.audio_file else {
        info!("no audio file given; pass a path to decode it through the cascade");
        return Ok(());
    };

    let bytes = std::fs::read(&path)
        .with_context(|| format!("Failed to read audio file: {}", path.display()))?;
    let hint = path
        .extension()
        .and_then(|e| e.to_str())
        .map(FormatHint::from_extension)
        .unwrap_or(FormatHint::Unknown);

    let cascade = DecodeCascade::new(cfg.audio.target_sample_rate);
    let audio = cascade
        .decode(&bytes, hint)
        .with_context(|| format!("Failed to decode {}", path.display()))?;

    println!(
        "{}",
        serde_json::json!({
            "file": path.display().to_string(),
            "format_hint": hint.to_string(),
            "samples": audio.samples.len(),
            "sample_rate": audio.sample_rate,
            "duration_seconds": audio.duration_seconds(),
        })
    );

    #[cfg(feature = "whisper")]
    {
        use std::sync::Arc;
        use voice_intake::transcribe::{TranscriptionDispatcher, WhisperBackend};

        let Some(model_path) = cfg.transcribe.model_path.clone() else {
            warn!("transcribe.model_path not configured; skipping transcription");
            return Ok(());
        };

        let domain_context = load_domain_context(&cfg);
        let backend = Arc::new(WhisperBackend::new(model_path));
        let dispatcher = TranscriptionDispatcher::new(
            &device,
            backend,
            DecodeCascade::new(cfg.audio.target_sample_rate),
            domain_context,
        );

        let result = dispatcher.transcribe(&bytes, hint).await;
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    #[cfg(not(feature = "whisper"))]
    warn!("built without a speech backend (enable the `whisper` feature to transcribe)");

    Ok(())
}

#[cfg(feature = "whisper")]
fn load_domain_context(cfg: &Config) -> Option<String> {
    let path = cfg.transcribe.domain_context_path.as_ref()?;
    match std::fs::read_to_string(path) {
        Ok(text) => {
            info!(path = %path, chars = text.len(), "loaded domain context");
            Some(text)
        }
        Err(e) => {
            warn!(path = %path, error = %e, "failed to read domain context, proceeding without it");
            None
        }
    }
}
