//! LiveKit room adapter.
//!
//! Joins the room, turns room events into session inputs, and routes
//! synthesized speech to the avatar participant as PCM byte streams.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use livekit::prelude::{
    ConnectionState, ParticipantIdentity, RemoteTrack, Room, RoomEvent, RoomOptions,
};
use livekit::{StreamByteOptions, StreamWriter};
use livepersona_core::audio_utils::{AVATAR_CHUNK_MS, chunk_pcm, i16_to_bytes};
use livepersona_core::speech::{SpeechOutput, SpeechSynthesizer};
use livepersona_core::transcription::SegmenterConfig;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::session::{ConnectionProbe, SessionInput};
use crate::voice;

/// Byte-stream topic the avatar listens on for speech audio.
pub const AVATAR_AUDIO_TOPIC: &str = "lk.audio_stream";

/// Speech is mono PCM16.
pub const AVATAR_AUDIO_CHANNELS: u32 = 1;

/// Joins `url` with `token`.
pub async fn connect(url: &str, token: &str) -> Result<(Room, mpsc::UnboundedReceiver<RoomEvent>)> {
    info!(%url, "Connecting to room");
    let (room, events) = Room::connect(url, token, RoomOptions::default())
        .await
        .context("Failed to connect to LiveKit room")?;
    info!(room = %room.name(), "Connected to room");
    Ok((room, events))
}

/// Reports whether the joined room is still connected.
pub struct RoomProbe(pub Arc<Room>);

impl ConnectionProbe for RoomProbe {
    fn is_connected(&self) -> bool {
        matches!(self.0.connection_state(), ConnectionState::Connected)
    }
}

/// Tracks which user participants are in the room.
///
/// Participants named in `ignored` (the avatar and the agent itself) never
/// count as users.
#[derive(Debug)]
pub struct Presence {
    ignored: Vec<String>,
    users: HashSet<String>,
}

impl Presence {
    pub fn new(ignored: Vec<String>, present: impl IntoIterator<Item = String>) -> Self {
        let users = present
            .into_iter()
            .filter(|identity| !ignored.contains(identity))
            .collect();
        Self { ignored, users }
    }

    pub fn is_ignored(&self, identity: &str) -> bool {
        self.ignored.iter().any(|i| i == identity)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn joined(&mut self, identity: &str) {
        if !self.is_ignored(identity) {
            self.users.insert(identity.to_string());
        }
    }

    /// Returns `true` when this departure leaves no users behind.
    pub fn left(&mut self, identity: &str) -> bool {
        self.users.remove(identity) && self.users.is_empty()
    }
}

/// Converts room events into session inputs until the event stream ends.
///
/// Audio tracks from ignored participants (the avatar, which publishes our
/// own synthesized voice) are never listened to. When the last user leaves,
/// `vacated` is set to `true`. Reader tasks are aborted when this future
/// completes or is dropped.
pub async fn pump_events(
    mut events: mpsc::UnboundedReceiver<RoomEvent>,
    tx: mpsc::Sender<SessionInput>,
    mut presence: Presence,
    vacated: watch::Sender<bool>,
    segmenter: SegmenterConfig,
) {
    let mut readers = JoinSet::new();

    while let Some(event) = events.recv().await {
        match event {
            RoomEvent::DataReceived {
                payload,
                topic,
                participant,
                ..
            } => {
                let from = participant
                    .as_ref()
                    .map(|p| p.identity().to_string())
                    .unwrap_or_else(|| "server".to_string());
                debug!(%from, ?topic, bytes = payload.len(), "Data received");
                if tx.send(SessionInput::Data(payload.to_vec())).await.is_err() {
                    break;
                }
            }
            RoomEvent::TrackSubscribed {
                track, participant, ..
            } => {
                let identity = participant.identity().to_string();
                if presence.is_ignored(&identity) {
                    debug!(%identity, "Ignoring track from non-user participant");
                    continue;
                }
                match track {
                    RemoteTrack::Audio(audio) => {
                        readers.spawn(voice::read_track(
                            audio,
                            identity,
                            tx.clone(),
                            segmenter.clone(),
                        ));
                    }
                    RemoteTrack::Video(_) => {
                        debug!(%identity, "Ignoring video track");
                    }
                }
            }
            RoomEvent::ParticipantConnected(participant) => {
                let identity = participant.identity().to_string();
                presence.joined(&identity);
                info!(%identity, users = presence.user_count(), "Participant connected");
            }
            RoomEvent::ParticipantDisconnected(participant) => {
                let identity = participant.identity().to_string();
                let emptied = presence.left(&identity);
                info!(%identity, users = presence.user_count(), "Participant disconnected");
                if emptied {
                    info!("Last user left the room");
                    let _ = vacated.send(true);
                }
            }
            RoomEvent::Disconnected { reason } => {
                warn!(?reason, "Room disconnected");
                break;
            }
            _ => {}
        }

        // Reap finished readers.
        while readers.try_join_next().is_some() {}
    }
}

/// Delivers one reply's PCM to the avatar as a single stream of chunks.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn send_stream(&self, sample_rate: u32, chunks: Vec<Vec<u8>>) -> Result<()>;
}

/// Attributes the avatar reads to interpret a PCM byte stream.
pub fn audio_stream_attributes(sample_rate: u32) -> HashMap<String, String> {
    HashMap::from([
        ("sample_rate".to_string(), sample_rate.to_string()),
        ("num_channels".to_string(), AVATAR_AUDIO_CHANNELS.to_string()),
    ])
}

/// `AudioSink` that opens a byte stream addressed to one participant.
pub struct ParticipantAudioSink {
    room: Arc<Room>,
    destination: String,
}

impl ParticipantAudioSink {
    pub fn new(room: Arc<Room>, destination: impl Into<String>) -> Self {
        Self {
            room,
            destination: destination.into(),
        }
    }
}

#[async_trait]
impl AudioSink for ParticipantAudioSink {
    async fn send_stream(&self, sample_rate: u32, chunks: Vec<Vec<u8>>) -> Result<()> {
        let options = StreamByteOptions {
            topic: AVATAR_AUDIO_TOPIC.to_string(),
            attributes: audio_stream_attributes(sample_rate),
            destination_identities: vec![ParticipantIdentity(self.destination.clone())],
            ..Default::default()
        };
        let writer = self
            .room
            .local_participant()
            .stream_bytes(options)
            .await
            .context("Failed to open avatar audio stream")?;
        for chunk in &chunks {
            writer
                .write(&chunk[..])
                .await
                .context("Failed to write avatar audio")?;
        }
        writer
            .close()
            .await
            .context("Failed to close avatar audio stream")?;
        Ok(())
    }
}

/// Session speech output: synthesize, then stream to the avatar in
/// fixed-size chunks so it can start lip-syncing before the reply ends.
pub struct AvatarSpeech {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    sink: Arc<dyn AudioSink>,
}

impl AvatarSpeech {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, sink: Arc<dyn AudioSink>) -> Self {
        Self { synthesizer, sink }
    }
}

#[async_trait]
impl SpeechOutput for AvatarSpeech {
    async fn say(&self, text: &str) -> Result<()> {
        let pcm = self.synthesizer.synthesize(text).await?;
        let sample_rate = self.synthesizer.sample_rate();

        if pcm.is_empty() {
            debug!("Synthesized speech is empty");
            return Ok(());
        }

        let chunks: Vec<Vec<u8>> = chunk_pcm(&pcm, sample_rate, AVATAR_CHUNK_MS)
            .into_iter()
            .map(i16_to_bytes)
            .collect();
        debug!(samples = pcm.len(), chunks = chunks.len(), "Streaming speech to avatar");
        self.sink.send_stream(sample_rate, chunks).await
    }
}
