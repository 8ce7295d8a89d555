//! Persistence for applicants and everything hanging off them.
//!
//! Writes take `&mut PgConnection` so callers can run them inside one
//! transaction (`&mut *tx`); reads take the pool.

use serde_json::Value;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::applicant::{ApplicantRow, ApplicantSkillRow};
use crate::models::application::{
    AnalysisRow, ApplicationRow, FileRow, PositionRow, StageRow,
};

/// Contact fields shared by create, update and webhook upsert.
#[derive(Debug, Clone, Default)]
pub struct ApplicantFields {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub linkedin_url: Option<String>,
    pub portfolio_url: Option<String>,
    pub source: Option<String>,
}

/// Per-link skill attributes. `None` leaves an existing value untouched.
#[derive(Debug, Clone, Default)]
pub struct SkillLink {
    pub years_experience: Option<f64>,
    pub proficiency_level: Option<String>,
    pub is_highlighted: Option<bool>,
    pub is_ai_detected: bool,
}

pub struct NewFile<'a> {
    pub application_id: Uuid,
    pub file_name: &'a str,
    pub file_type: &'a str,
    pub file_size: i64,
    pub storage_path: &'a str,
    pub file_category: &'a str,
}

// ─── Applicants ──────────────────────────────────────────────────────────────

pub async fn insert_applicant(
    conn: &mut PgConnection,
    fields: &ApplicantFields,
) -> sqlx::Result<ApplicantRow> {
    sqlx::query_as::<_, ApplicantRow>(
        r#"
        INSERT INTO applicants
            (first_name, last_name, email, phone, location, linkedin_url, portfolio_url, source)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(&fields.first_name)
    .bind(&fields.last_name)
    .bind(&fields.email)
    .bind(&fields.phone)
    .bind(&fields.location)
    .bind(&fields.linkedin_url)
    .bind(&fields.portfolio_url)
    .bind(&fields.source)
    .fetch_one(&mut *conn)
    .await
}

/// Inserts by email, or refreshes the fields that were supplied on the
/// existing row with that email.
pub async fn upsert_applicant_by_email(
    conn: &mut PgConnection,
    fields: &ApplicantFields,
) -> sqlx::Result<ApplicantRow> {
    sqlx::query_as::<_, ApplicantRow>(
        r#"
        INSERT INTO applicants
            (first_name, last_name, email, phone, location, linkedin_url, portfolio_url, source)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (email) DO UPDATE SET
            first_name    = EXCLUDED.first_name,
            last_name     = COALESCE(EXCLUDED.last_name, applicants.last_name),
            phone         = COALESCE(EXCLUDED.phone, applicants.phone),
            location      = COALESCE(EXCLUDED.location, applicants.location),
            linkedin_url  = COALESCE(EXCLUDED.linkedin_url, applicants.linkedin_url),
            portfolio_url = COALESCE(EXCLUDED.portfolio_url, applicants.portfolio_url),
            updated_at    = now()
        RETURNING *
        "#,
    )
    .bind(&fields.first_name)
    .bind(&fields.last_name)
    .bind(&fields.email)
    .bind(&fields.phone)
    .bind(&fields.location)
    .bind(&fields.linkedin_url)
    .bind(&fields.portfolio_url)
    .bind(&fields.source)
    .fetch_one(&mut *conn)
    .await
}

/// Applies the supplied fields. `None` when the applicant does not exist.
pub async fn update_applicant(
    conn: &mut PgConnection,
    id: Uuid,
    fields: &ApplicantFields,
) -> sqlx::Result<Option<ApplicantRow>> {
    sqlx::query_as::<_, ApplicantRow>(
        r#"
        UPDATE applicants SET
            first_name    = COALESCE($2, first_name),
            last_name     = COALESCE($3, last_name),
            email         = COALESCE($4, email),
            phone         = COALESCE($5, phone),
            location      = COALESCE($6, location),
            linkedin_url  = COALESCE($7, linkedin_url),
            portfolio_url = COALESCE($8, portfolio_url),
            source        = COALESCE($9, source),
            updated_at    = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&fields.first_name)
    .bind(&fields.last_name)
    .bind(&fields.email)
    .bind(&fields.phone)
    .bind(&fields.location)
    .bind(&fields.linkedin_url)
    .bind(&fields.portfolio_url)
    .bind(&fields.source)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn get_applicant(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<ApplicantRow>> {
    sqlx::query_as::<_, ApplicantRow>("SELECT * FROM applicants WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Returns whether a row was deleted. Applications, stages, files, analyses
/// and skill links go with it via `ON DELETE CASCADE`.
pub async fn delete_applicant(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM applicants WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Filters for the applicant list. Text filters are case-insensitive substrings;
/// `status` matches any application exactly.
#[derive(Debug, Clone, Default)]
pub struct ApplicantListFilter {
    pub position: Option<String>,
    pub skill: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
}

pub fn build_list_query(filter: &ApplicantListFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT a.* FROM applicants a WHERE TRUE");

    if let Some(position) = &filter.position {
        qb.push(
            " AND EXISTS (SELECT 1 FROM applications app JOIN positions p ON p.id = app.position_id \
             WHERE app.applicant_id = a.id AND p.title ILIKE ",
        );
        qb.push_bind(contains_pattern(position));
        qb.push(")");
    }
    if let Some(skill) = &filter.skill {
        qb.push(
            " AND EXISTS (SELECT 1 FROM applicant_skills s JOIN skills k ON k.id = s.skill_id \
             WHERE s.applicant_id = a.id AND k.name ILIKE ",
        );
        qb.push_bind(contains_pattern(skill));
        qb.push(")");
    }
    if let Some(status) = &filter.status {
        qb.push(" AND EXISTS (SELECT 1 FROM applications app WHERE app.applicant_id = a.id AND app.status = ");
        qb.push_bind(status.clone());
        qb.push(")");
    }
    if let Some(search) = &filter.search {
        let pattern = contains_pattern(search);
        qb.push(" AND (a.first_name ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR a.last_name ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR a.email ILIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }

    qb.push(" ORDER BY a.created_at DESC");
    qb
}

/// `%text%` with LIKE wildcards in the input escaped.
pub(crate) fn contains_pattern(text: &str) -> String {
    let escaped = text
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

pub async fn list_applicants(
    pool: &PgPool,
    filter: &ApplicantListFilter,
) -> sqlx::Result<Vec<ApplicantRow>> {
    build_list_query(filter).build_query_as().fetch_all(pool).await
}

// ─── Skills ──────────────────────────────────────────────────────────────────

/// Finds a skill by exact name, creating it when missing.
pub async fn find_or_create_skill(
    conn: &mut PgConnection,
    name: &str,
    category: Option<&str>,
) -> sqlx::Result<Uuid> {
    sqlx::query_scalar(
        r#"
        INSERT INTO skills (name, category) VALUES ($1, $2)
        ON CONFLICT (name) DO UPDATE SET category = COALESCE(skills.category, EXCLUDED.category)
        RETURNING id
        "#,
    )
    .bind(name.trim())
    .bind(category)
    .fetch_one(&mut *conn)
    .await
}

/// Links a skill to an applicant, or updates the existing link. An AI
/// detection only ever sets `is_ai_detected`; it never clears it.
pub async fn upsert_skill_link(
    conn: &mut PgConnection,
    applicant_id: Uuid,
    skill_id: Uuid,
    link: &SkillLink,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO applicant_skills
            (applicant_id, skill_id, years_experience, proficiency_level, is_highlighted, is_ai_detected)
        VALUES ($1, $2, $3, $4, COALESCE($5, FALSE), $6)
        ON CONFLICT (applicant_id, skill_id) DO UPDATE SET
            years_experience  = COALESCE(EXCLUDED.years_experience, applicant_skills.years_experience),
            proficiency_level = COALESCE(EXCLUDED.proficiency_level, applicant_skills.proficiency_level),
            is_highlighted    = COALESCE($5, applicant_skills.is_highlighted),
            is_ai_detected    = applicant_skills.is_ai_detected OR EXCLUDED.is_ai_detected
        "#,
    )
    .bind(applicant_id)
    .bind(skill_id)
    .bind(link.years_experience)
    .bind(&link.proficiency_level)
    .bind(link.is_highlighted)
    .bind(link.is_ai_detected)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn remove_skill_links(
    conn: &mut PgConnection,
    applicant_id: Uuid,
    skill_ids: &[Uuid],
) -> sqlx::Result<u64> {
    let result =
        sqlx::query("DELETE FROM applicant_skills WHERE applicant_id = $1 AND skill_id = ANY($2)")
            .bind(applicant_id)
            .bind(skill_ids)
            .execute(&mut *conn)
            .await?;
    Ok(result.rows_affected())
}

pub async fn skills_for_applicants(
    pool: &PgPool,
    applicant_ids: &[Uuid],
) -> sqlx::Result<Vec<ApplicantSkillRow>> {
    sqlx::query_as::<_, ApplicantSkillRow>(
        r#"
        SELECT s.applicant_id, s.skill_id, k.name, k.category, s.years_experience,
               s.proficiency_level, s.is_highlighted, s.is_ai_detected
        FROM applicant_skills s
        JOIN skills k ON k.id = s.skill_id
        WHERE s.applicant_id = ANY($1)
        ORDER BY k.name
        "#,
    )
    .bind(applicant_ids)
    .fetch_all(pool)
    .await
}

// ─── Positions & applications ────────────────────────────────────────────────

/// Finds a position by case-insensitive title, creating it when missing.
pub async fn find_or_create_position(
    conn: &mut PgConnection,
    title: &str,
    department: Option<&str>,
    description: Option<&str>,
) -> sqlx::Result<Uuid> {
    let title = title.trim();
    let existing: Option<Uuid> = sqlx::query_scalar(
        "SELECT id FROM positions WHERE lower(title) = lower($1) ORDER BY created_at LIMIT 1",
    )
    .bind(title)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(id) = existing {
        return Ok(id);
    }

    sqlx::query_scalar(
        "INSERT INTO positions (title, department, description) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(title)
    .bind(department.unwrap_or("General"))
    .bind(description.unwrap_or(""))
    .fetch_one(&mut *conn)
    .await
}

pub async fn create_application(
    conn: &mut PgConnection,
    applicant_id: Uuid,
    position_id: Uuid,
    cover_letter: Option<&str>,
    intake_form_data: Option<&Value>,
) -> sqlx::Result<Uuid> {
    sqlx::query_scalar(
        r#"
        INSERT INTO applications (applicant_id, position_id, status, cover_letter, intake_form_data)
        VALUES ($1, $2, 'new', $3, $4)
        RETURNING id
        "#,
    )
    .bind(applicant_id)
    .bind(position_id)
    .bind(cover_letter)
    .bind(intake_form_data)
    .fetch_one(&mut *conn)
    .await
}

pub async fn record_stage(
    conn: &mut PgConnection,
    application_id: Uuid,
    stage: &str,
    notes: Option<&str>,
    changed_by: &str,
) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO application_stages (application_id, stage, notes, changed_by) VALUES ($1, $2, $3, $4)",
    )
    .bind(application_id)
    .bind(stage)
    .bind(notes)
    .bind(changed_by)
    .execute(&mut *conn)
    .await?;
    sqlx::query("UPDATE applications SET updated_at = now() WHERE id = $1")
        .bind(application_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn get_application(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<ApplicationRow>> {
    sqlx::query_as::<_, ApplicationRow>("SELECT * FROM applications WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_position(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<PositionRow>> {
    sqlx::query_as::<_, PositionRow>("SELECT * FROM positions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// An application joined with its position title, for list and detail views.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationWithPosition {
    pub id: Uuid,
    #[serde(skip)]
    pub applicant_id: Uuid,
    pub position_id: Uuid,
    pub position_title: String,
    pub position_department: String,
    pub status: String,
    pub cover_letter: Option<String>,
    pub applied_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Newest application first.
pub async fn applications_for_applicants(
    pool: &PgPool,
    applicant_ids: &[Uuid],
) -> sqlx::Result<Vec<ApplicationWithPosition>> {
    sqlx::query_as::<_, ApplicationWithPosition>(
        r#"
        SELECT app.id, app.applicant_id, p.id AS position_id, p.title AS position_title,
               p.department AS position_department, app.status, app.cover_letter,
               app.applied_at, app.updated_at
        FROM applications app
        JOIN positions p ON p.id = app.position_id
        WHERE app.applicant_id = ANY($1)
        ORDER BY app.applied_at DESC
        "#,
    )
    .bind(applicant_ids)
    .fetch_all(pool)
    .await
}

// ─── Files, stages & analyses ────────────────────────────────────────────────

pub async fn insert_file(pool: &PgPool, file: &NewFile<'_>) -> sqlx::Result<FileRow> {
    sqlx::query_as::<_, FileRow>(
        r#"
        INSERT INTO files (application_id, file_name, file_type, file_size, storage_path, file_category)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(file.application_id)
    .bind(file.file_name)
    .bind(file.file_type)
    .bind(file.file_size)
    .bind(file.storage_path)
    .bind(file.file_category)
    .fetch_one(pool)
    .await
}

pub async fn files_for_applications(
    pool: &PgPool,
    application_ids: &[Uuid],
) -> sqlx::Result<Vec<FileRow>> {
    sqlx::query_as::<_, FileRow>(
        "SELECT * FROM files WHERE application_id = ANY($1) ORDER BY uploaded_at DESC",
    )
    .bind(application_ids)
    .fetch_all(pool)
    .await
}

pub async fn latest_resume_file(
    pool: &PgPool,
    application_id: Uuid,
) -> sqlx::Result<Option<FileRow>> {
    sqlx::query_as::<_, FileRow>(
        r#"
        SELECT * FROM files
        WHERE application_id = $1 AND file_category = 'resume'
        ORDER BY uploaded_at DESC
        LIMIT 1
        "#,
    )
    .bind(application_id)
    .fetch_optional(pool)
    .await
}

pub async fn stages_for_applications(
    pool: &PgPool,
    application_ids: &[Uuid],
) -> sqlx::Result<Vec<StageRow>> {
    sqlx::query_as::<_, StageRow>(
        "SELECT * FROM application_stages WHERE application_id = ANY($1) ORDER BY changed_at DESC",
    )
    .bind(application_ids)
    .fetch_all(pool)
    .await
}

/// The most recent analysis of any type per application.
pub async fn latest_analyses(
    pool: &PgPool,
    application_ids: &[Uuid],
) -> sqlx::Result<Vec<AnalysisRow>> {
    sqlx::query_as::<_, AnalysisRow>(
        r#"
        SELECT DISTINCT ON (application_id) *
        FROM ai_analyses
        WHERE application_id = ANY($1)
        ORDER BY application_id, created_at DESC
        "#,
    )
    .bind(application_ids)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unfiltered_list_is_newest_first() {
        let qb = build_list_query(&ApplicantListFilter::default());
        assert_eq!(
            qb.sql(),
            "SELECT a.* FROM applicants a WHERE TRUE ORDER BY a.created_at DESC"
        );
    }

    #[test]
    fn test_search_binds_one_pattern_per_column() {
        let qb = build_list_query(&ApplicantListFilter {
            search: Some("ada".into()),
            ..Default::default()
        });
        let sql = qb.sql();
        assert!(sql.contains("a.first_name ILIKE $1"));
        assert!(sql.contains("a.last_name ILIKE $2"));
        assert!(sql.contains("a.email ILIKE $3"));
    }

    #[test]
    fn test_all_filters_combine_with_and() {
        let qb = build_list_query(&ApplicantListFilter {
            position: Some("engineer".into()),
            skill: Some("rust".into()),
            status: Some("new".into()),
            search: None,
        });
        let sql = qb.sql();
        assert!(sql.contains("p.title ILIKE $1"));
        assert!(sql.contains("k.name ILIKE $2"));
        assert!(sql.contains("app.status = $3"));
        assert_eq!(sql.matches(" AND EXISTS").count(), 3);
    }

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern(" c++ "), "%c++%");
        assert_eq!(contains_pattern("100%_done"), "%100\\%\\_done%");
    }
}
