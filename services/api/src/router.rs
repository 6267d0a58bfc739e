//! Axum Router Configuration
//!
//! Routes for the connection-details endpoint and the OpenAPI documentation.

use crate::{
    handlers,
    models::{ConnectionDetails, ConnectionDetailsRequest, ErrorResponse},
    state::AppState,
};

use axum::{Router, routing::post};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::connection_details),
    components(schemas(ConnectionDetailsRequest, ConnectionDetails, ErrorResponse)),
    tags(
        (name = "LivePersona API", description = "Room access for browser clients")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/api/connection-details", post(handlers::connection_details))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
