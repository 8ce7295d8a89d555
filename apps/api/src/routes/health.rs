use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// `tools` reports whether the tool services have been connected yet.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "hrbuddy-api",
        "tools": if state.mcp.is_initialized() { "connected" } else { "idle" }
    }))
}
