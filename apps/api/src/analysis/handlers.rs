use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::analysis::resume_text::resolve_resume_text;
use crate::analysis::store::{link_detected_skills, record_analysis};
use crate::analysis::{analyze_resume, detected_skills, RESUME_ANALYSIS, RESUME_PARSING};
use crate::applicants::store::{get_application, latest_resume_file};
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct QueueRequest {
    pub application_id: Option<Uuid>,
}

/// How a resume analysis run ended. Generation failures are not an outcome;
/// they come back as `Err` after being recorded.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    NoResume,
    Pending,
    Completed { skills_linked: usize },
}

#[derive(Serialize)]
pub struct QueueResponse {
    pub success: bool,
    pub status: &'static str,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills_linked: Option<usize>,
}

impl From<AnalysisOutcome> for QueueResponse {
    fn from(outcome: AnalysisOutcome) -> Self {
        match outcome {
            AnalysisOutcome::NoResume => QueueResponse {
                success: true,
                status: "no_resume",
                message: "No resume file found for analysis",
                skills_linked: None,
            },
            AnalysisOutcome::Pending => QueueResponse {
                success: true,
                status: "pending",
                message: "Resume text extraction required before analysis can proceed",
                skills_linked: None,
            },
            AnalysisOutcome::Completed { skills_linked } => QueueResponse {
                success: true,
                status: "completed",
                message: "Resume analysis completed",
                skills_linked: Some(skills_linked),
            },
        }
    }
}

/// Analyzes the latest resume of an application and records the result.
///
/// Every branch leaves an `ai_analyses` row behind, including generation
/// failures, which are recorded before the error is returned.
pub async fn run_resume_analysis(
    state: &AppState,
    application_id: Uuid,
) -> Result<AnalysisOutcome, AppError> {
    let application = get_application(&state.db, application_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Application not found".to_string()))?;

    let Some(file) = latest_resume_file(&state.db, application_id).await? else {
        record_analysis(
            &state.db,
            application_id,
            RESUME_ANALYSIS,
            &json!({"status": "no_resume", "message": "No resume file found for analysis"}),
            None,
        )
        .await?;
        return Ok(AnalysisOutcome::NoResume);
    };

    let Some(resume_text) =
        resolve_resume_text(state, application.intake_form_data.as_ref(), &file).await
    else {
        record_analysis(
            &state.db,
            application_id,
            RESUME_PARSING,
            &json!({"status": "pending", "message": "Resume text extraction required"}),
            None,
        )
        .await?;
        return Ok(AnalysisOutcome::Pending);
    };

    let analysis = match analyze_resume(&resume_text, state.llm.as_ref()).await {
        Ok(analysis) => analysis,
        Err(e) => {
            error!("Resume analysis for application {application_id} failed: {e}");
            record_analysis(
                &state.db,
                application_id,
                RESUME_ANALYSIS,
                &json!({"error": "Failed to analyze resume", "message": e.to_string()}),
                None,
            )
            .await?;
            return Err(e.into());
        }
    };

    record_analysis(&state.db, application_id, RESUME_ANALYSIS, &analysis, None).await?;
    let skills = detected_skills(&analysis);
    let skills_linked =
        link_detected_skills(&state.db, application.applicant_id, &skills).await?;

    info!("Analyzed resume for application {application_id}: {skills_linked} skills linked");
    Ok(AnalysisOutcome::Completed { skills_linked })
}

/// POST /api/analysis/queue
pub async fn handle_queue_analysis(
    State(state): State<AppState>,
    Json(req): Json<QueueRequest>,
) -> Result<Json<QueueResponse>, AppError> {
    let application_id = req
        .application_id
        .ok_or_else(|| AppError::Validation("application_id is required".to_string()))?;

    let outcome = run_resume_analysis(&state, application_id).await?;
    Ok(Json(QueueResponse::from(outcome)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_responses() {
        let body = serde_json::to_value(QueueResponse::from(AnalysisOutcome::NoResume)).unwrap();
        assert_eq!(body["status"], "no_resume");
        assert!(body.get("skills_linked").is_none());

        let body = serde_json::to_value(QueueResponse::from(AnalysisOutcome::Completed {
            skills_linked: 4,
        }))
        .unwrap();
        assert_eq!(body["status"], "completed");
        assert_eq!(body["skills_linked"], 4);
    }

    #[test]
    fn test_missing_application_id_deserializes_to_none() {
        let req: QueueRequest = serde_json::from_str("{}").unwrap();
        assert!(req.application_id.is_none());
    }
}
