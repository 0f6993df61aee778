// Integration tests for configuration loading.

use std::io::Write;

use voice_intake::Config;

#[test]
fn missing_file_falls_back_to_defaults() {
    let cfg = Config::load("/nonexistent/path/voice-intake").unwrap();
    assert_eq!(cfg.service.name, "voice-intake");
    assert_eq!(cfg.audio.target_sample_rate, 16_000);
    assert_eq!(cfg.audio.max_duration_ms, 60_000);
    assert_eq!(cfg.transcribe.supported_languages, vec!["en", "ar"]);
}

#[test]
fn file_values_override_defaults() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    writeln!(
        file,
        r#"
[audio]
target_sample_rate = 8000
max_duration_ms = 30000

[transcribe]
model_variant = "small"
supported_languages = ["en"]
"#
    )
    .unwrap();

    let cfg = Config::load(file.path().to_str().unwrap()).unwrap();
    assert_eq!(cfg.audio.target_sample_rate, 8_000);
    assert_eq!(cfg.audio.max_duration_ms, 30_000);
    assert_eq!(cfg.transcribe.model_variant.as_deref(), Some("small"));
    assert_eq!(cfg.transcribe.supported_languages, vec!["en"]);
    // Untouched sections keep their defaults
    assert_eq!(cfg.service.name, "voice-intake");
    assert_eq!(cfg.audio.waveform_points, 200);
}

#[test]
fn partial_section_keeps_sibling_defaults() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    writeln!(file, "[audio]\nwaveform_points = 50").unwrap();

    let cfg = Config::load(file.path().to_str().unwrap()).unwrap();
    assert_eq!(cfg.audio.waveform_points, 50);
    assert_eq!(cfg.audio.target_sample_rate, 16_000);
}
