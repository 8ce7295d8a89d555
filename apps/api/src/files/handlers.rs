use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use crate::applicants::store::{self, NewFile};
use crate::errors::AppError;
use crate::files::normalize_category;
use crate::models::application::FileRow;
use crate::state::AppState;
use crate::storage::save_file;

struct Upload {
    file_name: String,
    content_type: String,
    body: Bytes,
}

/// POST /api/applications/:id/files
///
/// Multipart fields: `file` (required) and `category` (defaults to `resume`).
pub async fn handle_upload_file(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<FileRow>, AppError> {
    store::get_application(&state.db, application_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Application not found".to_string()))?;

    let bad_form = |e: axum::extract::multipart::MultipartError| {
        AppError::Validation(format!("Invalid multipart body: {e}"))
    };

    let mut upload: Option<Upload> = None;
    let mut category: Option<String> = None;
    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let body = field.bytes().await.map_err(bad_form)?;
                upload = Some(Upload {
                    file_name,
                    content_type,
                    body,
                });
            }
            Some("category") => category = Some(field.text().await.map_err(bad_form)?),
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| AppError::Validation("A 'file' field is required".to_string()))?;
    if upload.body.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".to_string()));
    }
    let category = normalize_category(category.as_deref()).map_err(AppError::Validation)?;

    let size = upload.body.len() as i64;
    let path = save_file(
        &state.s3,
        &state.config.s3_bucket,
        upload.body,
        &upload.file_name,
        &upload.content_type,
        application_id,
    )
    .await
    .map_err(|e| AppError::S3(e.to_string()))?;

    let file = store::insert_file(
        &state.db,
        &NewFile {
            application_id,
            file_name: &upload.file_name,
            file_type: &upload.content_type,
            file_size: size,
            storage_path: &path,
            file_category: &category,
        },
    )
    .await?;

    info!("Uploaded {} ({size} bytes) to application {application_id}", file.file_name);
    Ok(Json(file))
}
