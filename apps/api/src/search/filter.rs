//! Structured search criteria derived from a `QueryInterpretation`.
//!
//! The parsed object is untrusted model output: every field is read
//! independently and a mistyped field is dropped, never turned into a
//! constraint that excludes everything.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::search::query_parser::QueryInterpretation;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryFilter {
    pub skills: BTreeSet<String>,
    /// Minimum years of experience. Never negative.
    pub experience: Option<f64>,
    pub job_titles: BTreeSet<String>,
    pub education: Option<String>,
}

impl QueryFilter {
    pub fn from_interpretation(interpretation: &QueryInterpretation) -> Self {
        match interpretation {
            QueryInterpretation::Parsed(map) => Self::from_map(map),
            QueryInterpretation::Raw { .. } => Self::default(),
        }
    }

    fn from_map(map: &Map<String, Value>) -> Self {
        Self {
            skills: string_set(map.get("skills")),
            experience: map.get("experience").and_then(years),
            job_titles: string_set(map.get("jobTitles").or_else(|| map.get("job_titles"))),
            education: map
                .get("education")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
        }
    }

    /// True when no field constrains the search.
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
            && self.experience.is_none()
            && self.job_titles.is_empty()
            && self.education.is_none()
    }
}

/// Accepts an array of strings or a single string; non-string items are skipped.
fn string_set(value: Option<&Value>) -> BTreeSet<String> {
    let non_blank = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter_map(non_blank)
            .collect(),
        Some(Value::String(s)) => non_blank(s).into_iter().collect(),
        _ => BTreeSet::new(),
    }
}

/// A number, or a string such as "3" / "5+" / "2 years". Positive values only;
/// zero means "no minimum".
fn years(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let digits: String = s
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            digits.parse().ok()?
        }
        _ => return None,
    };
    (n.is_finite() && n > 0.0).then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parsed(value: Value) -> QueryInterpretation {
        match value {
            Value::Object(map) => QueryInterpretation::Parsed(map),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_full_interpretation_maps_every_field() {
        let filter = QueryFilter::from_interpretation(&parsed(json!({
            "skills": ["React", "TypeScript"],
            "experience": 3,
            "jobTitles": ["Frontend Developer"],
            "education": "Bachelor's degree"
        })));
        assert_eq!(filter.skills.len(), 2);
        assert!(filter.skills.contains("React"));
        assert_eq!(filter.experience, Some(3.0));
        assert!(filter.job_titles.contains("Frontend Developer"));
        assert_eq!(filter.education.as_deref(), Some("Bachelor's degree"));
    }

    #[test]
    fn test_raw_interpretation_means_no_constraints() {
        let filter = QueryFilter::from_interpretation(&QueryInterpretation::Raw {
            raw_analysis: "I cannot determine this.".to_string(),
        });
        assert!(filter.is_empty());
    }

    #[test]
    fn test_mistyped_fields_are_dropped_not_fatal() {
        let filter = QueryFilter::from_interpretation(&parsed(json!({
            "skills": [1, null, "Go", "  "],
            "experience": {"min": 3},
            "jobTitles": 42,
            "education": ["PhD"]
        })));
        assert_eq!(filter.skills.into_iter().collect::<Vec<_>>(), vec!["Go"]);
        assert!(filter.experience.is_none());
        assert!(filter.job_titles.is_empty());
        assert!(filter.education.is_none());
    }

    #[test]
    fn test_experience_accepts_loose_strings_and_rejects_non_positive() {
        let exp = |v: Value| QueryFilter::from_interpretation(&parsed(json!({ "experience": v }))).experience;
        assert_eq!(exp(json!("5+")), Some(5.0));
        assert_eq!(exp(json!("2 years")), Some(2.0));
        assert_eq!(exp(json!(0)), None);
        assert_eq!(exp(json!(-1)), None);
        assert_eq!(exp(json!("several")), None);
    }

    #[test]
    fn test_single_string_skill_is_accepted() {
        let filter = QueryFilter::from_interpretation(&parsed(json!({"skills": "Rust"})));
        assert!(filter.skills.contains("Rust"));
    }
}
