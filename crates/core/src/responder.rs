//! Conversation responder: one user utterance in, one spoken reply out.

use std::sync::Arc;

use anyhow::Result;
use futures::StreamExt;
use tracing::{error, info, warn};

use crate::llm_client::{LLMClient, LLMStreamEvent, build_turn_messages};
use crate::speech::SpeechOutput;

/// Spoken when the model streams back nothing usable.
pub const FALLBACK_REPLY: &str = "I heard you.";
/// Spoken when the model call fails.
pub const APOLOGY_REPLY: &str = "Sorry, I had trouble responding to that.";

/// Answers a single utterance with a fresh system + user context and speaks
/// the result. No history is kept between turns.
pub struct ConversationResponder {
    llm_client: Arc<dyn LLMClient>,
    speech: Arc<dyn SpeechOutput>,
    system_prompt: Arc<String>,
}

impl ConversationResponder {
    pub fn new(
        llm_client: Arc<dyn LLMClient>,
        speech: Arc<dyn SpeechOutput>,
        system_prompt: Arc<String>,
    ) -> Self {
        Self {
            llm_client,
            speech,
            system_prompt,
        }
    }

    /// Produces the reply text for `user_text`, propagating model errors.
    pub async fn generate_reply(&self, user_text: &str) -> Result<String> {
        let messages = build_turn_messages(&self.system_prompt, user_text)?;
        let mut stream = self.llm_client.stream_chat(messages).await?;

        let mut reply = String::new();
        while let Some(event) = stream.next().await {
            let LLMStreamEvent::TextChunk(chunk) = event?;
            reply.push_str(&chunk);
        }

        let reply = reply.trim();
        if reply.is_empty() {
            Ok(FALLBACK_REPLY.to_string())
        } else {
            Ok(reply.to_string())
        }
    }

    /// Generates and speaks a reply. Model failures become a spoken apology;
    /// nothing here ends the session.
    pub async fn respond(&self, user_text: &str) {
        let reply = match self.generate_reply(user_text).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = ?e, "LLM error");
                APOLOGY_REPLY.to_string()
            }
        };

        info!(chars = reply.len(), "Speaking reply");
        if let Err(e) = self.speak(&reply).await {
            warn!(error = ?e, "Failed to speak reply");
        }
    }

    async fn speak(&self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        self.speech.say(text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::{LLMStream, MockLLMClient};
    use async_openai::error::OpenAIError;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingSpeech {
        said: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SpeechOutput for RecordingSpeech {
        async fn say(&self, text: &str) -> Result<()> {
            self.said.lock().await.push(text.to_string());
            Ok(())
        }
    }

    fn stream_of(items: Vec<Result<LLMStreamEvent, OpenAIError>>) -> LLMStream {
        Box::pin(futures::stream::iter(items))
    }

    fn chunk(text: &str) -> Result<LLMStreamEvent, OpenAIError> {
        Ok(LLMStreamEvent::TextChunk(text.to_string()))
    }

    fn responder(llm: MockLLMClient, speech: Arc<RecordingSpeech>) -> ConversationResponder {
        ConversationResponder::new(
            Arc::new(llm),
            speech,
            Arc::new("You are a helpful assistant.".to_string()),
        )
    }

    #[tokio::test]
    async fn concatenates_fragments_in_order() {
        let mut llm = MockLLMClient::new();
        llm.expect_stream_chat()
            .times(1)
            .withf(|messages| messages.len() == 2)
            .returning(|_| Ok(stream_of(vec![chunk("Hel"), chunk("lo"), chunk(" there")])));
        let speech = Arc::new(RecordingSpeech::default());

        responder(llm, speech.clone()).respond("hi").await;

        assert_eq!(*speech.said.lock().await, vec!["Hello there".to_string()]);
    }

    #[tokio::test]
    async fn empty_reply_uses_filler() {
        let mut llm = MockLLMClient::new();
        llm.expect_stream_chat()
            .returning(|_| Ok(stream_of(vec![chunk("  "), chunk("\n")])));
        let speech = Arc::new(RecordingSpeech::default());

        responder(llm, speech.clone()).respond("hi").await;

        assert_eq!(*speech.said.lock().await, vec![FALLBACK_REPLY.to_string()]);
    }

    #[tokio::test]
    async fn mid_stream_failure_speaks_apology() {
        let mut llm = MockLLMClient::new();
        llm.expect_stream_chat().returning(|_| {
            Ok(stream_of(vec![
                chunk("partial"),
                Err(OpenAIError::StreamError("connection reset".to_string())),
                chunk("never seen"),
            ]))
        });
        let speech = Arc::new(RecordingSpeech::default());

        responder(llm, speech.clone()).respond("hi").await;

        assert_eq!(*speech.said.lock().await, vec![APOLOGY_REPLY.to_string()]);
    }

    #[tokio::test]
    async fn failure_to_open_stream_speaks_apology() {
        let mut llm = MockLLMClient::new();
        llm.expect_stream_chat()
            .returning(|_| Err(anyhow::anyhow!("network unreachable")));
        let speech = Arc::new(RecordingSpeech::default());

        responder(llm, speech.clone()).respond("hi").await;

        assert_eq!(*speech.said.lock().await, vec![APOLOGY_REPLY.to_string()]);
    }

    #[tokio::test]
    async fn reply_is_trimmed() {
        let mut llm = MockLLMClient::new();
        llm.expect_stream_chat()
            .returning(|_| Ok(stream_of(vec![chunk("  Sure"), chunk(". ")])));
        let speech = Arc::new(RecordingSpeech::default());

        let reply = responder(llm, speech).generate_reply("hi").await.unwrap();
        assert_eq!(reply, "Sure.");
    }

    #[tokio::test]
    async fn speech_failure_does_not_panic() {
        struct BrokenSpeech;

        #[async_trait]
        impl SpeechOutput for BrokenSpeech {
            async fn say(&self, _text: &str) -> Result<()> {
                Err(anyhow::anyhow!("avatar gone"))
            }
        }

        let mut llm = MockLLMClient::new();
        llm.expect_stream_chat()
            .returning(|_| Ok(stream_of(vec![chunk("ok")])));
        let responder = ConversationResponder::new(
            Arc::new(llm),
            Arc::new(BrokenSpeech),
            Arc::new("system".to_string()),
        );

        responder.respond("hi").await;
    }
}
