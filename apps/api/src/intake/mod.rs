//! Intake webhook: form submissions from the external forms integration.

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;

use crate::applicants::store::ApplicantFields;

pub mod handlers;

/// Resumes larger than this are not downloaded.
const MAX_RESUME_BYTES: usize = 10 * 1024 * 1024;

/// The fields read from a submission. The whole payload is also stored
/// verbatim on the application.
#[derive(Debug, Clone, Deserialize)]
pub struct IntakeForm {
    pub email: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub linkedin_url: Option<String>,
    pub portfolio_url: Option<String>,
    pub referral_source: Option<String>,
    pub position_applied: String,
    pub department: Option<String>,
    pub position_description: Option<String>,
    pub cover_letter: Option<String>,
    pub resume_url: Option<String>,
    pub resume_filename: Option<String>,
    pub resume_content_type: Option<String>,
}

impl IntakeForm {
    pub fn validate(&self) -> Result<(), String> {
        if !crate::email::is_valid_address(self.email.trim()) {
            return Err(format!("'{}' is not a valid email address", self.email));
        }
        if self.first_name.trim().is_empty() {
            return Err("first_name is required".to_string());
        }
        if self.position_applied.trim().is_empty() {
            return Err("position_applied is required".to_string());
        }
        Ok(())
    }

    pub fn applicant_fields(&self) -> ApplicantFields {
        let clean = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };
        ApplicantFields {
            first_name: Some(self.first_name.trim().to_string()),
            last_name: clean(&self.last_name),
            email: Some(self.email.trim().to_lowercase()),
            phone: clean(&self.phone),
            location: clean(&self.location),
            linkedin_url: clean(&self.linkedin_url),
            portfolio_url: clean(&self.portfolio_url),
            source: clean(&self.referral_source),
        }
    }

    pub fn resume_filename(&self) -> &str {
        self.resume_filename
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("resume.pdf")
    }

    pub fn resume_content_type(&self) -> &str {
        self.resume_content_type
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("application/pdf")
    }
}

/// Fetches a resume from the temporary URL the form provider hands out.
pub async fn download_resume(http: &Client, url: &str) -> Result<Bytes> {
    let response = http
        .get(url)
        .send()
        .await
        .with_context(|| format!("Requesting resume from {url}"))?;
    if !response.status().is_success() {
        bail!("Failed to download resume: HTTP {}", response.status());
    }
    if response
        .content_length()
        .is_some_and(|len| len as usize > MAX_RESUME_BYTES)
    {
        bail!("Resume exceeds {MAX_RESUME_BYTES} bytes");
    }
    let body = response.bytes().await.context("Reading resume body")?;
    if body.len() > MAX_RESUME_BYTES {
        bail!("Resume exceeds {MAX_RESUME_BYTES} bytes");
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form(value: serde_json::Value) -> IntakeForm {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_minimal_form_and_defaults() {
        let f = form(json!({
            "email": " Ada@Example.com ",
            "first_name": "Ada",
            "position_applied": "Engineer",
            "extra_question": "ignored but stored"
        }));
        assert!(f.validate().is_ok());
        let fields = f.applicant_fields();
        assert_eq!(fields.email.as_deref(), Some("ada@example.com"));
        assert_eq!(f.resume_filename(), "resume.pdf");
        assert_eq!(f.resume_content_type(), "application/pdf");
    }

    #[test]
    fn test_referral_source_maps_to_source() {
        let f = form(json!({
            "email": "a@example.com", "first_name": "A", "position_applied": "P",
            "referral_source": "LinkedIn", "phone": "  "
        }));
        let fields = f.applicant_fields();
        assert_eq!(fields.source.as_deref(), Some("LinkedIn"));
        assert!(fields.phone.is_none());
    }

    #[test]
    fn test_validation_failures() {
        let bad_email = form(json!({"email": "nope", "first_name": "A", "position_applied": "P"}));
        assert!(bad_email.validate().is_err());
        let no_position = form(json!({"email": "a@example.com", "first_name": "A", "position_applied": " "}));
        assert!(no_position.validate().is_err());
    }

    #[test]
    fn test_missing_required_field_fails_to_parse() {
        assert!(serde_json::from_value::<IntakeForm>(json!({"email": "a@example.com"})).is_err());
    }
}
