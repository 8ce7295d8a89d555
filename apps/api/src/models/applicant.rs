use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantRow {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub linkedin_url: Option<String>,
    pub portfolio_url: Option<String>,
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApplicantRow {
    /// "First Last", or just the first name when no last name is on file.
    pub fn full_name(&self) -> String {
        match self.last_name.as_deref().map(str::trim) {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

/// A skill joined through `applicant_skills`.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantSkillRow {
    #[serde(skip)]
    pub applicant_id: Uuid,
    pub skill_id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub years_experience: Option<f64>,
    pub proficiency_level: Option<String>,
    pub is_highlighted: bool,
    pub is_ai_detected: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn applicant(last_name: Option<&str>) -> ApplicantRow {
        ApplicantRow {
            id: Uuid::new_v4(),
            first_name: "Ada".to_string(),
            last_name: last_name.map(String::from),
            email: "ada@example.com".to_string(),
            phone: None,
            location: None,
            linkedin_url: None,
            portfolio_url: None,
            source: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_full_name_skips_missing_or_blank_last_name() {
        assert_eq!(applicant(Some("Lovelace")).full_name(), "Ada Lovelace");
        assert_eq!(applicant(None).full_name(), "Ada");
        assert_eq!(applicant(Some("  ")).full_name(), "Ada");
    }

    #[test]
    fn test_rows_serialize_camel_case() {
        let value = serde_json::to_value(applicant(None)).unwrap();
        assert_eq!(value["firstName"], "Ada");
        assert!(value.get("linkedinUrl").is_some());
    }
}
