//! Shared Application State

use crate::config::ApiConfig;
use livepersona_core::tokens::TokenIssuer;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub tokens: TokenIssuer,
}
