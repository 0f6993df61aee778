use std::fmt;
use std::path::Path;
use std::process::{Command, Stdio};

use serde::Serialize;
use tracing::info;

use crate::config::Config;

/// Compute device the speech backend is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cpu,
    Cuda,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            Self::Cuda => f.write_str("cuda"),
        }
    }
}

/// Startup-time record of accelerator availability and the resulting
/// model/device choice.
///
/// Computed once by [`DeviceContext::detect`] and passed by reference into
/// the dispatcher constructor; changing it requires a restart. Tests
/// construct the struct directly with whatever they need.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceContext {
    pub accelerator: bool,
    pub device: Device,
    pub model_variant: String,
    /// Languages the restricted detection pass may force (small, fixed set)
    pub supported_languages: Vec<String>,
}

impl DeviceContext {
    /// Probe the hardware once and pick a device plus a correspondingly sized
    /// model variant. The `VOICE_DEVICE` environment variable overrides the
    /// probe (`cuda` or `cpu`), mirroring how deployments pin the device.
    pub fn detect(config: &Config) -> Self {
        let accelerator = match std::env::var("VOICE_DEVICE") {
            Ok(value) => value.eq_ignore_ascii_case("cuda"),
            Err(_) => accelerator_present(),
        };

        let device = if accelerator { Device::Cuda } else { Device::Cpu };
        let model_variant = config
            .transcribe
            .model_variant
            .clone()
            .unwrap_or_else(|| if accelerator { "base" } else { "tiny" }.to_string());

        info!(%device, model = %model_variant, accelerator, "device context initialized");

        Self {
            accelerator,
            device,
            model_variant,
            supported_languages: config.transcribe.supported_languages.clone(),
        }
    }
}

/// One-shot NVIDIA probe: driver procfs entry first, `nvidia-smi` second.
fn accelerator_present() -> bool {
    if Path::new("/proc/driver/nvidia/version").exists() {
        return true;
    }
    Command::new("nvidia-smi")
        .arg("-L")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_context_for_injection() {
        let ctx = DeviceContext {
            accelerator: false,
            device: Device::Cpu,
            model_variant: "tiny".to_string(),
            supported_languages: vec!["en".to_string(), "ar".to_string()],
        };
        assert_eq!(ctx.device, Device::Cpu);
        assert_eq!(ctx.device.to_string(), "cpu");
    }

    #[test]
    fn variant_override_is_honored() {
        let mut cfg = Config::default();
        cfg.transcribe.model_variant = Some("small".to_string());
        let ctx = DeviceContext::detect(&cfg);
        assert_eq!(ctx.model_variant, "small");
    }
}
