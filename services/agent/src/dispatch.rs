//! Job dispatch.
//!
//! Jobs arrive either as a direct `POST /jobs` or as a signed LiveKit webhook.
//! Each accepted job runs the session in its own task; the registry keeps at
//! most one live job per room.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Json, Response},
};
use livekit_api::access_token::TokenVerifier;
use livekit_api::webhooks::{WebhookError, WebhookReceiver};
use livekit_protocol::WebhookEvent;
use livepersona_core::avatar::AVATAR_IDENTITY;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::state::AppState;

/// Rooms with a running job.
#[derive(Clone, Default)]
pub struct JobRegistry {
    active: Arc<Mutex<HashSet<String>>>,
}

impl JobRegistry {
    /// Marks `room` as busy. Returns false if it already was.
    pub async fn try_claim(&self, room: &str) -> bool {
        self.active.lock().await.insert(room.to_string())
    }

    pub async fn release(&self, room: &str) {
        self.active.lock().await.remove(room);
    }

    pub async fn is_active(&self, room: &str) -> bool {
        self.active.lock().await.contains(room)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("A job is already running for room {0}")]
    AlreadyRunning(String),
}

/// Claims `room` and runs its session in the background.
pub async fn dispatch_job(state: &Arc<AppState>, room: String) -> Result<(), DispatchError> {
    if !state.jobs.try_claim(&room).await {
        return Err(DispatchError::AlreadyRunning(room));
    }

    let state = state.clone();
    tokio::spawn(async move {
        info!(%room, "Job started");
        match state.runner.run(room.clone()).await {
            Ok(()) => info!(%room, "Job finished"),
            Err(e) => error!(%room, error = ?e, "Job failed"),
        }
        state.jobs.release(&room).await;
    });
    Ok(())
}

#[derive(Deserialize, Debug)]
pub struct JobRequest {
    #[serde(default)]
    pub room: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct JobAccepted {
    pub room: String,
    pub status: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Conflict(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message),
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        ApiError::Conflict(err.to_string())
    }
}

/// Dispatch a session for a room.
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<JobRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<JobAccepted>), ApiError> {
    let Json(payload) = payload.map_err(|_| ApiError::BadRequest("Invalid JSON body".to_string()))?;

    let room = payload.room.trim().to_string();
    if room.is_empty() {
        return Err(ApiError::BadRequest("room is required".to_string()));
    }

    dispatch_job(&state, room.clone()).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(JobAccepted {
            room,
            status: "dispatched".to_string(),
        }),
    ))
}

/// Picks the room a webhook event should start a job for, if any.
///
/// `room_started` always qualifies; `participant_joined` qualifies unless the
/// participant is the agent or the avatar.
pub fn room_to_dispatch(event: &WebhookEvent, agent_identity: &str) -> Option<String> {
    let room = event.room.as_ref().map(|r| r.name.trim()).unwrap_or_default();
    if room.is_empty() {
        return None;
    }

    match event.event.as_str() {
        "room_started" => Some(room.to_string()),
        "participant_joined" => {
            let identity = event
                .participant
                .as_ref()
                .map(|p| p.identity.as_str())
                .unwrap_or_default();
            if identity == agent_identity || identity == AVATAR_IDENTITY {
                None
            } else {
                Some(room.to_string())
            }
        }
        _ => None,
    }
}

fn webhook_error(error: WebhookError) -> ApiError {
    match error {
        WebhookError::InvalidData(e) => ApiError::BadRequest(format!("Invalid webhook payload: {e}")),
        other => ApiError::Unauthorized(format!("Webhook verification failed: {other}")),
    }
}

/// Receive a LiveKit webhook.
pub async fn livekit_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, ApiError> {
    let auth_token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v))
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

    let verifier = TokenVerifier::with_api_key(
        &state.config.livekit_api_key,
        &state.config.livekit_api_secret,
    );
    let event = WebhookReceiver::new(verifier)
        .receive(&body, auth_token)
        .map_err(|e| {
            warn!(error = %e, "Rejected webhook");
            webhook_error(e)
        })?;

    debug!(event = %event.event, id = %event.id, "Webhook received");

    if let Some(room) = room_to_dispatch(&event, &state.config.agent_identity) {
        match dispatch_job(&state, room).await {
            Ok(()) => {}
            Err(DispatchError::AlreadyRunning(room)) => {
                debug!(%room, "Job already running, ignoring webhook")
            }
        }
    }

    Ok(Json(json!({ "status": "received" })))
}

pub async fn health() -> &'static str {
    "ok"
}
