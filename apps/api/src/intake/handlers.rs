use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::handlers::run_resume_analysis;
use crate::applicants::store::{self, NewFile};
use crate::errors::AppError;
use crate::intake::{download_resume, IntakeForm};
use crate::state::AppState;
use crate::storage::save_file;

#[derive(Serialize)]
pub struct IntakeResponse {
    pub success: bool,
    pub applicant_id: Uuid,
    pub application_id: Uuid,
}

/// Downloads, stores and records the resume. Failures are logged; the
/// submission is kept either way.
async fn attach_resume(state: &AppState, form: &IntakeForm, application_id: Uuid, url: &str) {
    let result = async {
        let body = download_resume(&state.http, url).await?;
        let size = body.len() as i64;
        let path = save_file(
            &state.s3,
            &state.config.s3_bucket,
            body,
            form.resume_filename(),
            form.resume_content_type(),
            application_id,
        )
        .await?;
        store::insert_file(
            &state.db,
            &NewFile {
                application_id,
                file_name: form.resume_filename(),
                file_type: form.resume_content_type(),
                file_size: size,
                storage_path: &path,
                file_category: "resume",
            },
        )
        .await?;
        anyhow::Ok(())
    }
    .await;

    if let Err(e) = result {
        warn!("Resume for application {application_id} not attached: {e:#}");
    }
}

/// POST /api/webhooks/intake
pub async fn handle_intake(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<Json<IntakeResponse>, AppError> {
    let form = IntakeForm::deserialize(&payload)
        .map_err(|e| AppError::Validation(format!("Invalid submission: {e}")))?;
    form.validate().map_err(AppError::Validation)?;

    let mut tx = state.db.begin().await?;
    let applicant = store::upsert_applicant_by_email(&mut tx, &form.applicant_fields()).await?;
    let position_id = store::find_or_create_position(
        &mut tx,
        &form.position_applied,
        form.department.as_deref(),
        form.position_description.as_deref(),
    )
    .await?;
    let application_id = store::create_application(
        &mut tx,
        applicant.id,
        position_id,
        form.cover_letter.as_deref(),
        Some(&payload),
    )
    .await?;
    store::record_stage(
        &mut tx,
        application_id,
        "applied",
        Some("Application received via intake form"),
        "system",
    )
    .await?;
    tx.commit().await?;

    info!(
        "Intake: applicant {} applied to position {position_id} (application {application_id})",
        applicant.id
    );

    if let Some(url) = form.resume_url.as_deref().filter(|u| !u.trim().is_empty()) {
        attach_resume(&state, &form, application_id, url).await;
    }

    if let Err(e) = run_resume_analysis(&state, application_id).await {
        warn!("Resume analysis for application {application_id} deferred: {e}");
    }

    Ok(Json(IntakeResponse {
        success: true,
        applicant_id: applicant.id,
        application_id,
    }))
}
