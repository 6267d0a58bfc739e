//! Speech synthesis.
//!
//! `SpeechSynthesizer` turns text into PCM audio; `SpeechOutput` is the
//! session-bound "say this" entry point the responder talks to.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::audio_utils;
use crate::models::OPENAI_API_BASE;

/// Sample rate of the raw PCM returned by the synthesis endpoint.
pub const TTS_SAMPLE_RATE: u32 = audio_utils::PIPELINE_SAMPLE_RATE;

/// Something that can speak text into the active session.
#[async_trait]
pub trait SpeechOutput: Send + Sync {
    async fn say(&self, text: &str) -> Result<()>;
}

/// Converts text into 16-bit mono PCM.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<i16>>;

    /// Sample rate of the PCM returned by `synthesize`.
    fn sample_rate(&self) -> u32 {
        TTS_SAMPLE_RATE
    }
}

#[derive(Serialize, Debug)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    instructions: &'a str,
    response_format: &'a str,
}

/// `SpeechSynthesizer` backed by the OpenAI `/audio/speech` endpoint.
pub struct OpenAITts {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    voice: String,
    instructions: String,
}

impl OpenAITts {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        voice: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            api_base: OPENAI_API_BASE.to_string(),
            model: model.into(),
            voice: voice.into(),
            instructions: instructions.into(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAITts {
    async fn synthesize(&self, text: &str) -> Result<Vec<i16>> {
        let body = SpeechRequest {
            model: &self.model,
            voice: &self.voice,
            input: text,
            instructions: &self.instructions,
            response_format: "pcm",
        };

        let response = self
            .http
            .post(format!("{}/audio/speech", self.api_base.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to reach speech synthesis endpoint")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!("Speech synthesis failed with status {}: {}", status, detail);
        }

        let bytes = response.bytes().await?;
        debug!(bytes = bytes.len(), "Synthesized speech");
        Ok(audio_utils::bytes_to_i16(&bytes))
    }
}
