//! Database-gateway adapter. Arguments go out camelCase (`tableName`).
//!
//! Mutations must be scoped: `updateData` and `deleteData` refuse an empty
//! `where`, and writes refuse an empty `data`, before anything is sent.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::client::ToolSession;
use super::{require_non_blank, to_arguments, McpError, ToolInvocation, ToolResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteQueryParams {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetSchemaParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTableInfoParams {
    #[serde(alias = "table_name")]
    pub table_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertDataParams {
    #[serde(alias = "table_name")]
    pub table_name: String,
    pub data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDataParams {
    #[serde(alias = "table_name")]
    pub table_name: String,
    pub data: Map<String, Value>,
    #[serde(rename = "where")]
    pub filter: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteDataParams {
    #[serde(alias = "table_name")]
    pub table_name: String,
    #[serde(rename = "where")]
    pub filter: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

/// The closed set of database-gateway operations.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "operation", content = "params", rename_all = "camelCase")]
pub enum GatewayOp {
    ExecuteQuery(ExecuteQueryParams),
    GetSchema(GetSchemaParams),
    GetTableInfo(GetTableInfoParams),
    InsertData(InsertDataParams),
    UpdateData(UpdateDataParams),
    DeleteData(DeleteDataParams),
}

impl GatewayOp {
    pub fn tool_name(&self) -> &'static str {
        match self {
            GatewayOp::ExecuteQuery(_) => "execute_query",
            GatewayOp::GetSchema(_) => "get_schema",
            GatewayOp::GetTableInfo(_) => "get_table_info",
            GatewayOp::InsertData(_) => "insert_data",
            GatewayOp::UpdateData(_) => "update_data",
            GatewayOp::DeleteData(_) => "delete_data",
        }
    }

    pub fn into_invocation(self) -> Result<ToolInvocation, McpError> {
        let tool = self.tool_name();
        let arguments = match &self {
            GatewayOp::ExecuteQuery(p) => {
                require_non_blank(tool, "query", &p.query)?;
                to_arguments(tool, p)?
            }
            GatewayOp::GetSchema(p) => to_arguments(tool, p)?,
            GatewayOp::GetTableInfo(p) => {
                require_non_blank(tool, "tableName", &p.table_name)?;
                to_arguments(tool, p)?
            }
            GatewayOp::InsertData(p) => {
                require_non_blank(tool, "tableName", &p.table_name)?;
                require_non_empty(tool, "data", &p.data)?;
                to_arguments(tool, p)?
            }
            GatewayOp::UpdateData(p) => {
                require_non_blank(tool, "tableName", &p.table_name)?;
                require_non_empty(tool, "data", &p.data)?;
                require_non_empty(tool, "where", &p.filter)?;
                to_arguments(tool, p)?
            }
            GatewayOp::DeleteData(p) => {
                require_non_blank(tool, "tableName", &p.table_name)?;
                require_non_empty(tool, "where", &p.filter)?;
                to_arguments(tool, p)?
            }
        };
        Ok(ToolInvocation {
            tool_name: tool.to_string(),
            arguments,
        })
    }
}

fn require_non_empty(tool: &str, field: &str, map: &Map<String, Value>) -> Result<(), McpError> {
    if map.is_empty() {
        return Err(McpError::invalid(
            tool,
            format!("'{field}' must not be empty"),
        ));
    }
    Ok(())
}

/// Database-gateway operations bound to one session.
#[derive(Clone)]
pub struct DatabaseGateway {
    session: Arc<dyn ToolSession>,
}

impl DatabaseGateway {
    pub fn new(session: Arc<dyn ToolSession>) -> Self {
        Self { session }
    }

    /// Forwards an already-validated invocation.
    pub(crate) async fn send(&self, invocation: ToolInvocation) -> Result<ToolResult, McpError> {
        self.session.invoke(invocation).await
    }
}
