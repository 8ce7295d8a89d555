//! AI analysis of applicants: resume extraction, summaries and status emails.
//!
//! Every call goes through a `&dyn TextGenerator`. Only resume analysis parses
//! the reply; summaries and emails are HTML passed through as-is.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::llm_client::{extract_json_object, GenerationError, GenerationOptions, RawText, TextGenerator, MODEL};
use crate::models::applicant::ApplicantRow;

pub mod handlers;
pub mod prompts;
pub mod resume_text;
pub mod store;

use prompts::{applicant_summary_prompt, resume_analysis_prompt, status_email_prompt, SummaryPromptFields};

/// `analysis_type` values stored in `ai_analyses`.
pub const RESUME_ANALYSIS: &str = "resume_analysis";
pub const RESUME_PARSING: &str = "resume_parsing";
pub const APPLICANT_SUMMARY: &str = "applicant_summary";

/// Runs the resume analysis prompt. The result is the parsed JSON object, or
/// `{"rawAnalysis": <reply>}` when the reply held none.
pub async fn analyze_resume(
    resume_text: &str,
    llm: &dyn TextGenerator,
) -> Result<Value, GenerationError> {
    let reply = llm
        .generate(&resume_analysis_prompt(resume_text), GenerationOptions::extraction())
        .await?;
    Ok(match extract_json_object(&reply) {
        Ok(map) => Value::Object(map),
        Err(RawText(raw)) => json!({ "rawAnalysis": raw }),
    })
}

/// Skill names from an analysis `skills` field. Accepts plain strings and
/// objects carrying a `name`; anything else is skipped.
pub fn detected_skills(analysis: &Value) -> Vec<String> {
    let Some(items) = analysis.get("skills").and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut names: Vec<String> = items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.as_str()),
            Value::Object(o) => o.get("name").and_then(Value::as_str),
            _ => None,
        })
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    names.sort_by_key(|s| s.to_lowercase());
    names.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
    names
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantSummary {
    pub html: String,
    pub generated_at: DateTime<Utc>,
    pub model_version: &'static str,
}

pub async fn generate_applicant_summary(
    applicant: &ApplicantRow,
    position_title: Option<&str>,
    skills: &[String],
    llm: &dyn TextGenerator,
) -> Result<ApplicantSummary, GenerationError> {
    let name = applicant.full_name();
    let prompt = applicant_summary_prompt(&SummaryPromptFields {
        name: &name,
        email: &applicant.email,
        phone: applicant.phone.as_deref(),
        location: applicant.location.as_deref(),
        position: position_title,
        skills,
        linkedin: applicant.linkedin_url.as_deref(),
        portfolio: applicant.portfolio_url.as_deref(),
    });
    let reply = llm.generate(&prompt, GenerationOptions::default()).await?;
    info!("Generated summary for applicant {}", applicant.id);
    Ok(ApplicantSummary {
        html: strip_code_fence(&reply),
        generated_at: Utc::now(),
        model_version: MODEL,
    })
}

pub async fn generate_status_email(
    applicant_name: &str,
    position_title: &str,
    stage: &str,
    custom_message: Option<&str>,
    llm: &dyn TextGenerator,
) -> Result<String, GenerationError> {
    let prompt = status_email_prompt(applicant_name, position_title, stage, custom_message);
    let reply = llm.generate(&prompt, GenerationOptions::default()).await?;
    Ok(strip_code_fence(&reply))
}

/// Models sometimes wrap HTML in a ```html fence despite being told not to.
fn strip_code_fence(reply: &str) -> String {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
        .to_string()
}
