use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::errors::AppError;
use crate::mcp::gateway::GatewayOp;
use crate::mcp::tracker::TrackerOp;
use crate::mcp::ToolResult;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Tracker,
    Gateway,
}

#[derive(Debug, Deserialize)]
pub struct McpRequest {
    pub service: ServiceKind,
    pub operation: String,
    #[serde(default)]
    pub params: Option<Map<String, Value>>,
}

#[derive(Serialize)]
pub struct McpResponse {
    pub success: bool,
    pub result: ToolResult,
}

/// Parses `{operation, params}` into a service's closed operation set.
/// Unknown operations and malformed params are rejected here.
fn parse_op<T: serde::de::DeserializeOwned>(req: &McpRequest) -> Result<T, AppError> {
    let tagged = json!({
        "operation": req.operation,
        "params": req.params.clone().unwrap_or_default(),
    });
    serde_json::from_value(tagged).map_err(|e| {
        AppError::Validation(format!(
            "Invalid operation '{}' for service {:?}: {e}",
            req.operation, req.service
        ))
    })
}

/// POST /api/mcp
pub async fn handle_mcp(
    State(state): State<AppState>,
    Json(req): Json<McpRequest>,
) -> Result<Json<McpResponse>, AppError> {
    debug!("MCP {:?}.{}", req.service, req.operation);
    let result = match req.service {
        ServiceKind::Tracker => {
            let op: TrackerOp = parse_op(&req)?;
            state.mcp.tracker().call(op).await?
        }
        ServiceKind::Gateway => {
            let op: GatewayOp = parse_op(&req)?;
            state.mcp.gateway().call(op).await?
        }
    };
    Ok(Json(McpResponse {
        success: true,
        result,
    }))
}
