//! Request and response bodies, documented for OpenAPI with `utoipa`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema, Debug, Default)]
pub struct ConnectionDetailsRequest {
    #[schema(example = "demo-room")]
    pub room: Option<String>,
    #[schema(example = "user-1234")]
    pub identity: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDetails {
    #[schema(example = "wss://example.livekit.cloud")]
    pub server_url: String,
    pub token: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub error: String,
}
