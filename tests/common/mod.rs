// Shared test fixtures: a scripted speech backend and audio helpers.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use voice_intake::audio::{encode_wav, DecodeCascade};
use voice_intake::transcribe::{BackendError, SpeechBackend, TranscriptionDispatcher};
use voice_intake::{Device, DeviceContext, SessionManager};

pub const TEST_RATE: u32 = 16_000;

/// Scripted speech backend: returns canned text/language, counts loads, and
/// can be told to fail at either stage.
pub struct MockBackend {
    pub text: String,
    pub language: String,
    pub probs: Vec<f32>,
    pub fail_load: bool,
    pub fail_inference: bool,
    pub loads: AtomicUsize,
}

impl MockBackend {
    pub fn speaking(text: &str) -> Self {
        Self {
            text: text.to_string(),
            language: "en".to_string(),
            probs: Vec::new(),
            fail_load: false,
            fail_inference: false,
            loads: AtomicUsize::new(0),
        }
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    pub fn with_probs(mut self, probs: &[f32]) -> Self {
        self.probs = probs.to_vec();
        self
    }

    pub fn failing_load() -> Self {
        Self {
            fail_load: true,
            ..Self::speaking("")
        }
    }

    pub fn failing_inference() -> Self {
        Self {
            fail_inference: true,
            ..Self::speaking("")
        }
    }
}

#[async_trait]
impl SpeechBackend for MockBackend {
    async fn load(&self) -> Result<(), BackendError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_load {
            return Err(BackendError::ModelUnavailable("missing weights".to_string()));
        }
        Ok(())
    }

    async fn transcribe(
        &self,
        _pcm: &[f32],
        _sample_rate: u32,
        forced_language: Option<&str>,
        _prompt: Option<&str>,
    ) -> Result<(String, String), BackendError> {
        if self.fail_inference {
            return Err(BackendError::Inference("scripted failure".to_string()));
        }
        let language = forced_language
            .map(str::to_string)
            .unwrap_or_else(|| self.language.clone());
        Ok((self.text.clone(), language))
    }

    async fn language_probs(
        &self,
        _pcm: &[f32],
        _sample_rate: u32,
        candidates: &[String],
    ) -> Result<Vec<f32>, BackendError> {
        if self.probs.len() == candidates.len() {
            Ok(self.probs.clone())
        } else {
            Ok(vec![0.0; candidates.len()])
        }
    }
}

pub fn test_device() -> DeviceContext {
    DeviceContext {
        accelerator: false,
        device: Device::Cpu,
        model_variant: "tiny".to_string(),
        supported_languages: vec!["en".to_string(), "ar".to_string()],
    }
}

pub fn dispatcher_with(backend: MockBackend) -> TranscriptionDispatcher {
    dispatcher_with_arc(Arc::new(backend))
}

pub fn dispatcher_with_arc(backend: Arc<MockBackend>) -> TranscriptionDispatcher {
    TranscriptionDispatcher::new(
        &test_device(),
        backend,
        DecodeCascade::new(TEST_RATE),
        None,
    )
}

pub fn manager_with(backend: MockBackend) -> SessionManager {
    SessionManager::new(
        Arc::new(dispatcher_with(backend)),
        DecodeCascade::new(TEST_RATE),
    )
}

/// Mono sine tone as f32 PCM.
pub fn sine_samples(count: usize, rate: u32, freq: f32, amplitude: f32) -> Vec<f32> {
    (0..count)
        .map(|i| {
            amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin()
        })
        .collect()
}

/// One-second 440 Hz sine encoded as a WAV file.
pub fn sine_wav_bytes() -> Vec<u8> {
    let samples = sine_samples(TEST_RATE as usize, TEST_RATE, 440.0, 0.5);
    encode_wav(&samples, TEST_RATE).expect("encode test WAV")
}

/// One-second digital silence encoded as a WAV file.
pub fn silent_wav_bytes() -> Vec<u8> {
    encode_wav(&vec![0.0; TEST_RATE as usize], TEST_RATE).expect("encode silent WAV")
}
