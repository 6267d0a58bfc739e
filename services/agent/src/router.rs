//! Axum router for the agent's job dispatch surface.

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::{dispatch, state::AppState};

/// Creates the main Axum router for the agent process.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(dispatch::health))
        .route("/jobs", post(dispatch::create_job))
        .route("/livekit/webhook", post(dispatch::livekit_webhook))
        .with_state(app_state)
}
