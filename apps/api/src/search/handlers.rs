use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, Postgres, QueryBuilder};
use tracing::{debug, info};
use uuid::Uuid;

use crate::applicants::store::contains_pattern;
use crate::errors::AppError;
use crate::search::filter::QueryFilter;
use crate::search::query_parser::{interpret_query, QueryInterpretation};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub query: String,
    pub interpreted_as: QueryInterpretation,
    pub results: Vec<SearchResult>,
    pub count: usize,
}

#[derive(Debug, FromRow)]
pub struct SearchRow {
    pub id: Uuid,
    pub status: String,
    pub applied_at: DateTime<Utc>,
    pub applicant_id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub position_id: Uuid,
    pub position_title: String,
    pub resume_url: Option<String>,
    pub ai_analysis: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: Uuid,
    pub applicant: SearchApplicant,
    pub position: SearchPosition,
    pub status: String,
    pub applied_at: DateTime<Utc>,
    pub resume_url: Option<String>,
    pub ai_analysis: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct SearchApplicant {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchPosition {
    pub id: Uuid,
    pub title: String,
}

impl From<SearchRow> for SearchResult {
    fn from(row: SearchRow) -> Self {
        let name = match row.last_name.as_deref() {
            Some(last) if !last.trim().is_empty() => format!("{} {}", row.first_name, last),
            _ => row.first_name.clone(),
        };
        SearchResult {
            id: row.id,
            applicant: SearchApplicant {
                id: row.applicant_id,
                name,
                email: row.email,
                phone: row.phone,
                location: row.location,
            },
            position: SearchPosition {
                id: row.position_id,
                title: row.position_title,
            },
            status: row.status,
            applied_at: row.applied_at,
            resume_url: row.resume_url,
            ai_analysis: row.ai_analysis,
        }
    }
}

const SEARCH_SELECT: &str = r#"
SELECT app.id, app.status, app.applied_at,
       a.id AS applicant_id, a.first_name, a.last_name, a.email, a.phone, a.location,
       p.id AS position_id, p.title AS position_title,
       (SELECT f.storage_path FROM files f
         WHERE f.application_id = app.id AND f.file_category = 'resume'
         ORDER BY f.uploaded_at DESC LIMIT 1) AS resume_url,
       (SELECT x.analysis_result FROM ai_analyses x
         WHERE x.application_id = app.id AND x.analysis_type = 'resume_analysis'
         ORDER BY x.created_at DESC LIMIT 1) AS ai_analysis
FROM applications app
JOIN applicants a ON a.id = app.applicant_id
JOIN positions p ON p.id = app.position_id
WHERE TRUE"#;

/// Builds the application search for a filter. Each present field adds one
/// AND clause; an empty filter matches every application.
pub fn build_search_query(filter: &QueryFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(SEARCH_SELECT);

    if !filter.skills.is_empty() {
        let skills: Vec<String> = filter.skills.iter().map(|s| s.to_lowercase()).collect();
        qb.push(
            " AND EXISTS (SELECT 1 FROM applicant_skills s JOIN skills k ON k.id = s.skill_id \
             WHERE s.applicant_id = a.id AND lower(k.name) = ANY(",
        );
        qb.push_bind(skills);
        qb.push("))");
    }

    if let Some(years) = filter.experience {
        qb.push(
            " AND EXISTS (SELECT 1 FROM applicant_skills s \
             WHERE s.applicant_id = a.id AND s.years_experience >= ",
        );
        qb.push_bind(years);
        qb.push(")");
    }

    if !filter.job_titles.is_empty() {
        let titles: Vec<String> = filter.job_titles.iter().map(|t| t.to_lowercase()).collect();
        qb.push(" AND lower(p.title) = ANY(");
        qb.push_bind(titles);
        qb.push(")");
    }

    if let Some(education) = &filter.education {
        qb.push(
            " AND EXISTS (SELECT 1 FROM ai_analyses x \
             WHERE x.application_id = app.id AND x.analysis_result->>'education' ILIKE ",
        );
        qb.push_bind(contains_pattern(education));
        qb.push(")");
    }

    qb.push(" ORDER BY app.updated_at DESC");
    qb
}

/// POST /api/search
pub async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    let query = req.query.trim();
    if query.is_empty() {
        return Err(AppError::Validation("Query is required".to_string()));
    }

    let interpreted_as = interpret_query(query, state.llm.as_ref())
        .await
        .map_err(|e| AppError::Llm(format!("Query interpretation failed: {e}")))?;
    let filter = QueryFilter::from_interpretation(&interpreted_as);
    if filter.is_empty() {
        debug!("Search {query:?} yielded no constraints; listing all applications");
    }

    let rows: Vec<SearchRow> = build_search_query(&filter)
        .build_query_as()
        .fetch_all(&state.db)
        .await?;

    let results: Vec<SearchResult> = rows.into_iter().map(SearchResult::from).collect();
    info!("Search {:?} matched {} applications", query, results.len());

    Ok(Json(SearchResponse {
        query: query.to_string(),
        interpreted_as,
        count: results.len(),
        results,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::query_parser::parse_interpretation;

    #[test]
    fn test_empty_filter_has_no_constraints() {
        let qb = build_search_query(&QueryFilter::default());
        let sql = qb.sql();
        assert!(sql.trim_end().ends_with("ORDER BY app.updated_at DESC"));
        assert!(!sql.contains("$1"));
    }

    #[test]
    fn test_each_field_binds_one_parameter_in_order() {
        let filter = QueryFilter::from_interpretation(&parse_interpretation(
            r#"{"skills":["React"],"experience":3,"jobTitles":["Frontend Developer"],"education":"Bachelor"}"#,
        ));
        let qb = build_search_query(&filter);
        let sql = qb.sql();
        assert!(sql.contains("lower(k.name) = ANY($1)"));
        assert!(sql.contains("s.years_experience >= $2"));
        assert!(sql.contains("lower(p.title) = ANY($3)"));
        assert!(sql.contains("->>'education' ILIKE $4)"));
        assert!(!sql.contains("$5"));
    }

    #[test]
    fn test_education_wildcards_match_literally() {
        let filter = QueryFilter::from_interpretation(&parse_interpretation(
            r#"{"education":"100%_online"}"#,
        ));
        assert_eq!(filter.education.as_deref(), Some("100%_online"));
        assert_eq!(
            contains_pattern(filter.education.as_deref().unwrap()),
            "%100\\%\\_online%"
        );
        let qb = build_search_query(&filter);
        assert!(qb.sql().contains("ILIKE $1)"));
        assert!(!qb.sql().contains("'%'"));
    }

    #[test]
    fn test_raw_interpretation_searches_everything() {
        let filter = QueryFilter::from_interpretation(&parse_interpretation("no idea"));
        assert!(!build_search_query(&filter).sql().contains("EXISTS"));
    }

    #[test]
    fn test_result_name_joins_first_and_last() {
        let row = SearchRow {
            id: Uuid::new_v4(),
            status: "new".to_string(),
            applied_at: Utc::now(),
            applicant_id: Uuid::new_v4(),
            first_name: "Grace".to_string(),
            last_name: Some("Hopper".to_string()),
            email: "grace@example.com".to_string(),
            phone: None,
            location: None,
            position_id: Uuid::new_v4(),
            position_title: "Engineer".to_string(),
            resume_url: None,
            ai_analysis: None,
        };
        let value = serde_json::to_value(SearchResult::from(row)).unwrap();
        assert_eq!(value["applicant"]["name"], "Grace Hopper");
        assert_eq!(value["position"]["title"], "Engineer");
        assert!(value["resumeUrl"].is_null());
    }
}
