//! Axum Handlers for the REST API
//!
//! Uses `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use livepersona_core::tokens::TokenError;
use std::sync::Arc;
use tracing::{error, info};

use crate::{
    models::{ConnectionDetails, ConnectionDetailsRequest, ErrorResponse},
    state::AppState,
};

pub enum ApiError {
    BadRequest(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(error) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { error })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let error = "Failed to build connection details".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { error }),
                )
                    .into_response()
            }
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::MissingRoomOrIdentity => ApiError::BadRequest(err.to_string()),
            TokenError::Signing(_) => ApiError::InternalServerError(err.into()),
        }
    }
}

/// Issue a room token for a browser client.
///
/// The body is parsed as JSON whatever its `Content-Type`.
#[utoipa::path(
    post,
    path = "/api/connection-details",
    request_body = ConnectionDetailsRequest,
    responses(
        (status = 200, description = "Server URL and access token", body = ConnectionDetails),
        (status = 400, description = "Invalid body or missing room/identity", body = ErrorResponse),
        (status = 500, description = "Token could not be signed", body = ErrorResponse)
    )
)]
pub async fn connection_details(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ConnectionDetails>, ApiError> {
    let payload: Option<ConnectionDetailsRequest> = serde_json::from_slice(&body)
        .map_err(|_| ApiError::BadRequest("Invalid JSON body".to_string()))?;
    let payload = payload.unwrap_or_default();

    let room = payload.room.unwrap_or_default();
    let identity = payload.identity.unwrap_or_default();
    let token = state.tokens.join_token(&room, &identity, None)?;

    info!(room = %room.trim(), identity = %identity.trim(), "Issued connection details");
    Ok(Json(ConnectionDetails {
        server_url: state.config.livekit_url.clone(),
        token,
    }))
}
