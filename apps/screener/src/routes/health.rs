use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::config::ScoringBackend;
use crate::state::AppState;

/// GET /health
/// Returns service status, version and the active scoring setup.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let backend = match &state.config.scoring_backend {
        ScoringBackend::Simulated => "simulated",
        ScoringBackend::Http { .. } => "http",
    };
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "screener",
        "scoring_backend": backend,
        "suitability_threshold": state.config.suitability_threshold
    }))
}
