//! Liveness endpoint. Kept intentionally simple — this process has no
//! external database or cache to probe; the store and scheduler either
//! started or the process never reached `axum::serve`.

use axum::{response::Json, routing::get, Router};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy", version: env!("CARGO_PKG_VERSION") })
}

pub fn routes() -> Router {
    Router::new().route("/health", get(health))
}
