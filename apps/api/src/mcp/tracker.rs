//! Task-tracker adapter. Every operation is a 1:1 forward to `invoke` with a
//! fixed tool name; arguments go out snake_case.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::client::ToolSession;
use super::{require_non_blank, to_arguments, McpError, ToolInvocation, ToolResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTaskParams {
    #[serde(alias = "listId")]
    pub list_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    #[serde(default, alias = "dueDate", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignees: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetTasksParams {
    #[serde(alias = "listId")]
    pub list_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statuses: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignees: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetTaskParams {
    #[serde(alias = "taskId")]
    pub task_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTaskParams {
    #[serde(alias = "taskId")]
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    #[serde(default, alias = "dueDate", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignees: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddTaskCommentParams {
    #[serde(alias = "taskId")]
    pub task_id: String,
    #[serde(alias = "commentText")]
    pub comment_text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetListsParams {
    #[serde(alias = "folderId")]
    pub folder_id: String,
}

/// The closed set of task-tracker operations. The `/api/mcp` route deserializes
/// `{ "operation": ..., "params": ... }` straight into this.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "operation", content = "params", rename_all = "camelCase")]
pub enum TrackerOp {
    CreateTask(CreateTaskParams),
    GetTasks(GetTasksParams),
    GetTask(GetTaskParams),
    UpdateTask(UpdateTaskParams),
    AddTaskComment(AddTaskCommentParams),
    GetLists(GetListsParams),
}

impl TrackerOp {
    pub fn tool_name(&self) -> &'static str {
        match self {
            TrackerOp::CreateTask(_) => "create_task",
            TrackerOp::GetTasks(_) => "get_tasks",
            TrackerOp::GetTask(_) => "get_task",
            TrackerOp::UpdateTask(_) => "update_task",
            TrackerOp::AddTaskComment(_) => "add_task_comment",
            TrackerOp::GetLists(_) => "get_lists",
        }
    }

    /// Validates required identifiers and shapes the argument object.
    pub fn into_invocation(self) -> Result<ToolInvocation, McpError> {
        let tool = self.tool_name();
        let arguments = match &self {
            TrackerOp::CreateTask(p) => {
                require_non_blank(tool, "list_id", &p.list_id)?;
                require_non_blank(tool, "name", &p.name)?;
                to_arguments(tool, p)?
            }
            TrackerOp::GetTasks(p) => {
                require_non_blank(tool, "list_id", &p.list_id)?;
                to_arguments(tool, p)?
            }
            TrackerOp::GetTask(p) => {
                require_non_blank(tool, "task_id", &p.task_id)?;
                to_arguments(tool, p)?
            }
            TrackerOp::UpdateTask(p) => {
                require_non_blank(tool, "task_id", &p.task_id)?;
                to_arguments(tool, p)?
            }
            TrackerOp::AddTaskComment(p) => {
                require_non_blank(tool, "task_id", &p.task_id)?;
                require_non_blank(tool, "comment_text", &p.comment_text)?;
                to_arguments(tool, p)?
            }
            TrackerOp::GetLists(p) => {
                require_non_blank(tool, "folder_id", &p.folder_id)?;
                to_arguments(tool, p)?
            }
        };
        Ok(ToolInvocation {
            tool_name: tool.to_string(),
            arguments,
        })
    }
}

/// Task-tracker operations bound to one session.
#[derive(Clone)]
pub struct TaskTracker {
    session: Arc<dyn ToolSession>,
}

impl TaskTracker {
    pub fn new(session: Arc<dyn ToolSession>) -> Self {
        Self { session }
    }

    /// Forwards an already-validated invocation.
    pub(crate) async fn send(&self, invocation: ToolInvocation) -> Result<ToolResult, McpError> {
        self.session.invoke(invocation).await
    }
}
