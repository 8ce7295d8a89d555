//! Finding the plain text of a resume.
//!
//! Order: `resume_text` from the intake form, then the stored file itself
//! (PDF text extraction, or UTF-8 for text uploads). `None` means analysis has
//! to wait.

use anyhow::{Context, Result};
use bytes::Bytes;
use serde_json::Value;
use tracing::warn;

use crate::models::application::FileRow;
use crate::state::AppState;
use crate::storage::load_file;

/// `resume_text` from a stored intake payload, if present and non-blank.
pub fn form_resume_text(form: Option<&Value>) -> Option<String> {
    form?
        .get("resume_text")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
}

#[derive(Debug, PartialEq)]
enum FileKind {
    Pdf,
    Text,
    Other,
}

fn file_kind(file: &FileRow) -> FileKind {
    let mime = file.file_type.to_ascii_lowercase();
    let name = file.file_name.to_ascii_lowercase();
    if mime == "application/pdf" || name.ends_with(".pdf") {
        FileKind::Pdf
    } else if mime.starts_with("text/") || name.ends_with(".txt") || name.ends_with(".md") {
        FileKind::Text
    } else {
        FileKind::Other
    }
}

/// PDF parsing is CPU-bound; it runs on the blocking pool.
pub async fn extract_pdf_text(bytes: Bytes) -> Result<String> {
    tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .context("PDF extraction task panicked")?
        .map_err(|e| anyhow::anyhow!("Failed to extract PDF text: {e}"))
}

/// Collapses the runs of blank lines PDF extraction tends to leave behind.
fn tidy(text: &str) -> Option<String> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .collect();
    (!lines.is_empty()).then(|| lines.join("\n"))
}

async fn file_text(state: &AppState, file: &FileRow) -> Result<Option<String>> {
    let kind = file_kind(file);
    if kind == FileKind::Other {
        return Ok(None);
    }
    let bytes = load_file(&state.s3, &state.config.s3_bucket, &file.storage_path).await?;
    let text = match kind {
        FileKind::Pdf => extract_pdf_text(bytes).await?,
        _ => String::from_utf8_lossy(&bytes).into_owned(),
    };
    Ok(tidy(&text))
}

/// Resolves resume text for an application. Storage or extraction failures
/// are logged and treated as "no text yet".
pub async fn resolve_resume_text(
    state: &AppState,
    intake_form: Option<&Value>,
    file: &FileRow,
) -> Option<String> {
    if let Some(text) = form_resume_text(intake_form) {
        return Some(text);
    }
    match file_text(state, file).await {
        Ok(text) => text,
        Err(e) => {
            warn!("Could not read resume file {}: {e:#}", file.id);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn file(name: &str, mime: &str) -> FileRow {
        FileRow {
            id: Uuid::new_v4(),
            application_id: Uuid::new_v4(),
            file_name: name.to_string(),
            file_type: mime.to_string(),
            file_size: 10,
            storage_path: "applications/x/1-resume".to_string(),
            file_category: "resume".to_string(),
            uploaded_at: Utc::now(),
        }
    }

    #[test]
    fn test_form_text_wins_when_present() {
        let form = json!({"resume_text": "  Senior engineer  ", "name": "Ada"});
        assert_eq!(form_resume_text(Some(&form)).as_deref(), Some("Senior engineer"));
        assert_eq!(form_resume_text(Some(&json!({"resume_text": " "}))), None);
        assert_eq!(form_resume_text(Some(&json!({"resume_text": 5}))), None);
        assert_eq!(form_resume_text(None), None);
    }

    #[test]
    fn test_file_kind_uses_mime_or_extension() {
        assert_eq!(file_kind(&file("cv.PDF", "application/octet-stream")), FileKind::Pdf);
        assert_eq!(file_kind(&file("cv", "application/pdf")), FileKind::Pdf);
        assert_eq!(file_kind(&file("cv.txt", "")), FileKind::Text);
        assert_eq!(file_kind(&file("cv.docx", "application/msword")), FileKind::Other);
    }

    #[test]
    fn test_tidy_drops_blank_lines() {
        assert_eq!(tidy("Ada\n\n  \nEngineer  \n").as_deref(), Some("Ada\nEngineer"));
        assert_eq!(tidy(" \n\n"), None);
    }

    #[tokio::test]
    async fn test_garbage_bytes_are_not_a_pdf() {
        assert!(extract_pdf_text(Bytes::from_static(b"not a pdf")).await.is_err());
    }
}
