//! Session orchestrator.
//!
//! One run of `run_session` is one job: join the room, build the model
//! pipeline, start the avatar, then serve the room until it disconnects or
//! the last user leaves.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_openai::config::OpenAIConfig;
use async_trait::async_trait;
use livepersona_core::{
    avatar::{
        AVATAR_DISPLAY_NAME, AVATAR_IDENTITY, AvatarConversation, AvatarService,
        AvatarSessionRequest, TavusClient,
    },
    llm_client::{LLMClient, OpenAICompatibleClient},
    models,
    protocol::extract_user_text,
    responder::ConversationResponder,
    speech::{OpenAITts, SpeechSynthesizer},
    tokens::TokenIssuer,
    transcription::{OpenAITranscriber, SegmenterConfig, Transcriber},
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::config::AgentConfig;
use crate::room::{self, AvatarSpeech, ParticipantAudioSink, Presence, RoomProbe};

/// How often the idle loop checks the room connection.
pub const CONNECTION_POLL_INTERVAL: Duration = Duration::from_millis(250);

const INPUT_QUEUE_CAPACITY: usize = 64;

/// One unit of work for the per-room input task.
#[derive(Debug)]
pub enum SessionInput {
    /// Raw data-channel payload.
    Data(Vec<u8>),
    /// A finished voice utterance.
    Utterance { pcm: Vec<i16>, sample_rate: u32 },
}

pub trait ConnectionProbe: Send + Sync {
    fn is_connected(&self) -> bool;
}

/// Reports disconnected once the room has no users left, even while the
/// underlying connection is still up.
pub struct OccupiedRoom<P> {
    inner: P,
    vacated: watch::Receiver<bool>,
}

impl<P: ConnectionProbe> OccupiedRoom<P> {
    pub fn new(inner: P, vacated: watch::Receiver<bool>) -> Self {
        Self { inner, vacated }
    }
}

impl<P: ConnectionProbe> ConnectionProbe for OccupiedRoom<P> {
    fn is_connected(&self) -> bool {
        !*self.vacated.borrow() && self.inner.is_connected()
    }
}

/// Returns once `probe` stops reporting a connection, checking every `interval`.
pub async fn wait_until_disconnected(probe: &dyn ConnectionProbe, interval: Duration) {
    while probe.is_connected() {
        tokio::time::sleep(interval).await;
    }
}

/// Turns session inputs into spoken replies.
pub struct InputHandler {
    responder: ConversationResponder,
    transcriber: Arc<dyn Transcriber>,
}

impl InputHandler {
    pub fn new(responder: ConversationResponder, transcriber: Arc<dyn Transcriber>) -> Self {
        Self {
            responder,
            transcriber,
        }
    }

    pub async fn handle(&self, input: SessionInput) {
        match input {
            SessionInput::Data(payload) => match extract_user_text(&payload) {
                Some(text) => {
                    info!(chars = text.len(), "User text received");
                    self.responder.respond(&text).await;
                }
                None => debug!(bytes = payload.len(), "Ignoring data packet"),
            },
            SessionInput::Utterance { pcm, sample_rate } => {
                match self.transcriber.transcribe(&pcm, sample_rate).await {
                    Ok(text) if !text.trim().is_empty() => {
                        info!(chars = text.len(), "Voice turn transcribed");
                        self.responder.respond(text.trim()).await;
                    }
                    Ok(_) => debug!(samples = pcm.len(), "Empty transcript"),
                    Err(e) => warn!(error = ?e, "Transcription failed"),
                }
            }
        }
    }
}

/// Handles queued inputs one at a time, in arrival order.
pub fn spawn_input_consumer(
    mut rx: mpsc::Receiver<SessionInput>,
    handler: Arc<InputHandler>,
) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            while let Some(input) = rx.recv().await {
                handler.handle(input).await;
            }
            debug!("Input queue closed");
        }
        .in_current_span(),
    )
}

/// Runs one job for one room.
#[async_trait]
pub trait SessionRunner: Send + Sync {
    async fn run(&self, room: String) -> Result<()>;
}

/// `SessionRunner` that drives a real LiveKit room.
pub struct LiveSessionRunner {
    config: Arc<AgentConfig>,
}

impl LiveSessionRunner {
    pub fn new(config: Arc<AgentConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionRunner for LiveSessionRunner {
    async fn run(&self, room: String) -> Result<()> {
        let span = info_span!("session", room = %room);
        run_session(self.config.clone(), room).instrument(span).await
    }
}

struct Pipeline {
    llm: Arc<dyn LLMClient>,
    tts: Arc<dyn SpeechSynthesizer>,
    transcriber: Arc<dyn Transcriber>,
}

impl Pipeline {
    fn from_config(config: &AgentConfig) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(models::OPENAI_API_BASE);

        Self {
            llm: Arc::new(OpenAICompatibleClient::new(openai_config, models::CHAT_MODEL)),
            tts: Arc::new(OpenAITts::new(
                &config.openai_api_key,
                models::TTS_MODEL,
                models::TTS_VOICE,
                models::TTS_INSTRUCTIONS,
            )),
            transcriber: Arc::new(OpenAITranscriber::new(
                &config.openai_api_key,
                models::TRANSCRIBE_MODEL,
            )),
        }
    }
}

async fn run_session(config: Arc<AgentConfig>, room_name: String) -> Result<()> {
    let issuer = TokenIssuer::new(&config.livekit_api_key, &config.livekit_api_secret);

    info!("Connecting");
    let agent_token = issuer
        .join_token(&room_name, &config.agent_identity, None)
        .context("Failed to mint agent token")?;
    let (room, events) = room::connect(&config.livekit_url, &agent_token).await?;
    let room = Arc::new(room);

    info!(
        llm = models::CHAT_MODEL,
        stt = models::TRANSCRIBE_MODEL,
        tts = models::TTS_MODEL,
        "Initializing pipeline"
    );
    let pipeline = Pipeline::from_config(&config);

    info!(replica_id = %config.tavus_replica_id, "Starting avatar");
    let avatar = TavusClient::new(&config.tavus_api_key);
    let conversation = match start_avatar(&config, &issuer, &avatar, &room_name).await {
        Ok(conversation) => conversation,
        Err(e) => {
            let _ = room.close().await;
            return Err(e);
        }
    };

    let speech = Arc::new(AvatarSpeech::new(
        pipeline.tts,
        Arc::new(ParticipantAudioSink::new(room.clone(), AVATAR_IDENTITY)),
    ));
    let responder = ConversationResponder::new(
        pipeline.llm,
        speech,
        Arc::new(config.system_prompt.clone()),
    );
    let handler = Arc::new(InputHandler::new(responder, pipeline.transcriber));

    let presence = Presence::new(
        vec![AVATAR_IDENTITY.to_string(), config.agent_identity.clone()],
        room.remote_participants()
            .keys()
            .map(|identity| identity.to_string()),
    );
    let (vacated_tx, vacated_rx) = watch::channel(false);
    let (tx, rx) = mpsc::channel(INPUT_QUEUE_CAPACITY);
    let consumer = spawn_input_consumer(rx, handler);
    let pump = tokio::spawn(
        room::pump_events(events, tx, presence, vacated_tx, SegmenterConfig::default())
            .in_current_span(),
    );

    info!("Running");
    let probe = OccupiedRoom::new(RoomProbe(room.clone()), vacated_rx);
    wait_until_disconnected(&probe, CONNECTION_POLL_INTERVAL).await;

    info!("Room disconnected or empty, ending session");
    pump.abort();
    consumer.abort();
    if let Err(e) = avatar.end(&conversation.conversation_id).await {
        warn!(error = %e, "Failed to end avatar conversation");
    }
    let _ = room.close().await;
    Ok(())
}

async fn start_avatar(
    config: &AgentConfig,
    issuer: &TokenIssuer,
    avatar: &dyn AvatarService,
    room_name: &str,
) -> Result<AvatarConversation> {
    let avatar_token = issuer
        .join_token(room_name, AVATAR_IDENTITY, Some(AVATAR_DISPLAY_NAME))
        .context("Failed to mint avatar token")?;

    let request = AvatarSessionRequest {
        replica_id: config.tavus_replica_id.clone(),
        persona_id: config.tavus_persona_id.clone(),
        livekit_url: config.livekit_url.clone(),
        livekit_token: avatar_token,
    };
    avatar
        .start(&request)
        .await
        .context("Failed to start avatar session")
}
