//! Speech-to-text for voice turns.
//!
//! Room audio arrives as short PCM frames. `UtteranceSegmenter` groups them
//! into utterances using a simple energy gate, and a `Transcriber` turns each
//! finished utterance into text.

use std::io::Cursor;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::audio_utils::{rms, samples_for_ms};
use crate::models::OPENAI_API_BASE;

/// Converts a finished utterance into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, pcm16: &[i16], sample_rate: u32) -> Result<String>;
}

#[derive(Deserialize, Debug)]
struct TranscriptionResponse {
    text: String,
}

/// `Transcriber` backed by the OpenAI `/audio/transcriptions` endpoint.
pub struct OpenAITranscriber {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl OpenAITranscriber {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            api_base: OPENAI_API_BASE.to_string(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl Transcriber for OpenAITranscriber {
    async fn transcribe(&self, pcm16: &[i16], sample_rate: u32) -> Result<String> {
        let wav = encode_wav(pcm16, sample_rate)?;
        let file = Part::bytes(wav)
            .file_name("utterance.wav")
            .mime_str("audio/wav")?;
        let form = Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("response_format", "json");

        let response = self
            .http
            .post(format!(
                "{}/audio/transcriptions",
                self.api_base.trim_end_matches('/')
            ))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .context("Failed to reach transcription endpoint")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!("Transcription failed with status {}: {}", status, detail);
        }

        let body: TranscriptionResponse = response.json().await?;
        Ok(body.text.trim().to_string())
    }
}

/// Wraps mono PCM16 in a WAV container.
pub fn encode_wav(pcm16: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut buffer = Vec::with_capacity(44 + pcm16.len() * 2);
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut buffer), spec)?;
        for &sample in pcm16 {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(buffer)
}

/// Tuning for `UtteranceSegmenter`.
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    pub sample_rate: u32,
    /// Frames at or above this RMS level (i16 scale) count as speech.
    pub speech_threshold: f32,
    /// Utterances with less speech than this are discarded.
    pub min_speech_ms: u32,
    /// Trailing silence that closes an utterance.
    pub silence_ms: u32,
    /// Hard cap on utterance length.
    pub max_utterance_ms: u32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            sample_rate: crate::audio_utils::PIPELINE_SAMPLE_RATE,
            speech_threshold: 500.0,
            min_speech_ms: 300,
            silence_ms: 800,
            max_utterance_ms: 30_000,
        }
    }
}

/// Energy-gated utterance detector.
#[derive(Debug)]
pub struct UtteranceSegmenter {
    config: SegmenterConfig,
    buffer: Vec<i16>,
    in_speech: bool,
    speech_samples: usize,
    silence_samples: usize,
}

impl UtteranceSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self {
            config,
            buffer: Vec::new(),
            in_speech: false,
            speech_samples: 0,
            silence_samples: 0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Feeds one frame; returns a finished utterance when one closes.
    pub fn push(&mut self, frame: &[i16]) -> Option<Vec<i16>> {
        let loud = rms(frame) >= self.config.speech_threshold;

        if !self.in_speech {
            if !loud {
                return None;
            }
            self.in_speech = true;
            self.speech_samples = 0;
            self.silence_samples = 0;
        }

        self.buffer.extend_from_slice(frame);
        if loud {
            self.speech_samples += frame.len();
            self.silence_samples = 0;
        } else {
            self.silence_samples += frame.len();
        }

        let rate = self.config.sample_rate;
        if self.silence_samples >= samples_for_ms(rate, self.config.silence_ms)
            || self.buffer.len() >= samples_for_ms(rate, self.config.max_utterance_ms)
        {
            return self.flush();
        }
        None
    }

    /// Closes any open utterance, e.g. when the track ends.
    pub fn flush(&mut self) -> Option<Vec<i16>> {
        let utterance = std::mem::take(&mut self.buffer);
        let enough_speech = self.speech_samples
            >= samples_for_ms(self.config.sample_rate, self.config.min_speech_ms);
        self.in_speech = false;
        self.speech_samples = 0;
        self.silence_samples = 0;

        if enough_speech { Some(utterance) } else { None }
    }
}
