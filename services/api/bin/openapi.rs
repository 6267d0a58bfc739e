//! Writes the connection-details OpenAPI document to disk.
//!
//! Usage: `openapi [OUTPUT]` (defaults to `openapi.json`).

use livepersona_api::router::ApiDoc;
use utoipa::OpenApi;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "openapi.json".to_string());
    let document = ApiDoc::openapi().to_pretty_json()?;
    std::fs::write(&path, document)?;
    println!("Wrote {}", path);
    Ok(())
}
