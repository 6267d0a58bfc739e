//! Shared application state for the agent's HTTP surface.

use std::sync::Arc;

use crate::{config::AgentConfig, dispatch::JobRegistry, session::SessionRunner};

/// Created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AgentConfig>,
    pub jobs: JobRegistry,
    pub runner: Arc<dyn SessionRunner>,
}
