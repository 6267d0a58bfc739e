//! LivePersona Core
//!
//! Provider-facing building blocks for the voice agent: the language-model
//! client, speech synthesis and transcription clients, the avatar service
//! client, room token minting, and the text-input bridge that turns a data
//! channel message into a spoken reply.

pub mod audio_utils;
pub mod avatar;
pub mod llm_client;
pub mod protocol;
pub mod responder;
pub mod speech;
pub mod tokens;
pub mod transcription;

/// Fixed model and voice choices for a session pipeline.
pub mod models {
    /// Chat model used for replies.
    pub const CHAT_MODEL: &str = "gpt-4.1-mini";
    /// Speech-to-text model used for voice turns.
    pub const TRANSCRIBE_MODEL: &str = "gpt-4o-mini-transcribe";
    /// Speech synthesis model.
    pub const TTS_MODEL: &str = "gpt-4o-mini-tts";
    /// Synthesis voice.
    pub const TTS_VOICE: &str = "ash";
    /// Style instructions passed to the synthesis model.
    pub const TTS_INSTRUCTIONS: &str = "Speak naturally, with short sentences and minimal filler.";
    /// Base URL for the OpenAI REST API.
    pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
}
