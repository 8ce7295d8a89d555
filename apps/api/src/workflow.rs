//! Applicant workflow: move an application to a new stage and tell everyone.
//!
//! Steps run in order: connect tool services, write the status email, open a
//! tracker task, send the email, record the stage. The first failure stops the
//! run. Nothing already done is undone; the report says how far it got.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::generate_status_email;
use crate::applicants::store::{get_applicant, get_application, get_position, record_stage};
use crate::email::SendEmail;
use crate::errors::AppError;
use crate::mcp::tracker::CreateTaskParams;
use crate::models::applicant::ApplicantRow;
use crate::models::application::PositionRow;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRequest {
    pub stage: String,
    pub comments: Option<String>,
    #[serde(alias = "list_id")]
    pub list_id: String,
}

impl WorkflowRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.stage.trim().is_empty() {
            return Err(AppError::Validation("stage is required".to_string()));
        }
        if self.list_id.trim().is_empty() {
            return Err(AppError::Validation("listId is required".to_string()));
        }
        Ok(())
    }

    fn comments(&self) -> Option<&str> {
        self.comments.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }

    fn notes(&self) -> String {
        self.comments()
            .map(String::from)
            .unwrap_or_else(|| format!("Applicant is in the {} stage.", self.stage.trim()))
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowReport {
    pub success: bool,
    pub task_created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    pub email_sent: bool,
    pub stage_recorded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

async fn run_steps(
    state: &AppState,
    req: &WorkflowRequest,
    application_id: Uuid,
    applicant: &ApplicantRow,
    position: &PositionRow,
    report: &mut WorkflowReport,
) -> Result<(), AppError> {
    state.mcp.initialize().await?;

    let name = applicant.full_name();
    let stage = req.stage.trim();
    let html = generate_status_email(
        &name,
        &position.title,
        stage,
        req.comments(),
        state.llm.as_ref(),
    )
    .await?;

    let task = state
        .mcp
        .tracker()
        .create_task(CreateTaskParams {
            list_id: req.list_id.trim().to_string(),
            name: format!("Applicant: {name}"),
            description: Some(req.notes()),
            status: Some(stage.to_string()),
            ..CreateTaskParams::default()
        })
        .await?;
    report.task_created = true;
    report.task = Some(task.text());

    state
        .email
        .send(&SendEmail::new(
            &applicant.email,
            format!("Your Application Status: {}", position.title),
            html,
        ))
        .await?;
    report.email_sent = true;

    let mut conn = state.db.acquire().await?;
    record_stage(&mut conn, application_id, stage, Some(&req.notes()), "system").await?;
    report.stage_recorded = true;

    Ok(())
}

/// POST /api/applications/:id/workflow
pub async fn handle_workflow(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
    Json(req): Json<WorkflowRequest>,
) -> Result<Json<WorkflowReport>, AppError> {
    req.validate()?;

    let not_found = |what: &str| AppError::NotFound(format!("{what} not found"));
    let application = get_application(&state.db, application_id)
        .await?
        .ok_or_else(|| not_found("Application"))?;
    let applicant = get_applicant(&state.db, application.applicant_id)
        .await?
        .ok_or_else(|| not_found("Applicant"))?;
    let position = get_position(&state.db, application.position_id)
        .await?
        .ok_or_else(|| not_found("Position"))?;

    let mut report = WorkflowReport::default();
    match run_steps(&state, &req, application_id, &applicant, &position, &mut report).await {
        Ok(()) => {
            report.success = true;
            info!("Workflow moved application {application_id} to '{}'", req.stage.trim());
        }
        Err(e) => {
            warn!("Workflow for application {application_id} stopped: {e}");
            report.error = Some(e.to_string());
        }
    }
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_accepts_either_list_id_spelling() {
        let a: WorkflowRequest =
            serde_json::from_value(json!({"stage": "interview", "listId": "L1"})).unwrap();
        let b: WorkflowRequest =
            serde_json::from_value(json!({"stage": "interview", "list_id": "L1"})).unwrap();
        assert_eq!(a.list_id, b.list_id);
    }

    #[test]
    fn test_blank_stage_or_list_rejected() {
        let req: WorkflowRequest =
            serde_json::from_value(json!({"stage": " ", "listId": "L1"})).unwrap();
        assert!(req.validate().is_err());
        let req: WorkflowRequest =
            serde_json::from_value(json!({"stage": "offer", "listId": ""})).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_notes_fall_back_to_stage_sentence() {
        let req: WorkflowRequest =
            serde_json::from_value(json!({"stage": "offer", "listId": "L1", "comments": "  "}))
                .unwrap();
        assert_eq!(req.notes(), "Applicant is in the offer stage.");
    }

    #[test]
    fn test_partial_report_serializes_progress() {
        let report = WorkflowReport {
            task_created: true,
            error: Some("Email error: SendGrid API key is not configured".into()),
            ..WorkflowReport::default()
        };
        let body = serde_json::to_value(report).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["taskCreated"], true);
        assert_eq!(body["emailSent"], false);
        assert!(body.get("task").is_none());
    }
}
