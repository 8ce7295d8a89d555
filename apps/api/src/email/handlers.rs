use axum::{extract::State, Json};
use serde::Serialize;

use crate::email::SendEmail;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct SendEmailResponse {
    pub success: bool,
    pub message: &'static str,
}

/// POST /api/email/send
pub async fn handle_send_email(
    State(state): State<AppState>,
    Json(req): Json<SendEmail>,
) -> Result<Json<SendEmailResponse>, AppError> {
    if req.subject.trim().is_empty() {
        return Err(AppError::Validation("Subject cannot be empty".to_string()));
    }
    if req.html.trim().is_empty() {
        return Err(AppError::Validation("Email body cannot be empty".to_string()));
    }
    req.validate()?;

    state.email.send(&req).await?;

    Ok(Json(SendEmailResponse {
        success: true,
        message: "Email sent successfully",
    }))
}
