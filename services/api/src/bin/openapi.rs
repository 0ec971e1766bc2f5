//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI document of the research assistant's REST surface.
//! Usage: `openapi [OUTPUT]`, defaulting to `openapi.json`.

use api_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

const DEFAULT_OUTPUT: &str = "openapi.json";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_OUTPUT.to_string());

    let mut doc = ApiDoc::openapi();
    doc.info.title = "Research Assistant API".to_string();
    doc.info.version = env!("CARGO_PKG_VERSION").to_string();

    std::fs::write(&output, doc.to_pretty_json()?)?;
    println!("OpenAPI document for {} paths written to {}", doc.paths.paths.len(), output);
    Ok(())
}
