use std::collections::HashMap;
use std::hash::Hash;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::analysis::store::record_analysis;
use crate::analysis::{generate_applicant_summary, ApplicantSummary, APPLICANT_SUMMARY};
use crate::applicants::store::{
    self, ApplicantFields, ApplicantListFilter, ApplicationWithPosition, SkillLink,
};
use crate::errors::AppError;
use crate::models::applicant::{ApplicantRow, ApplicantSkillRow};
use crate::models::application::{AnalysisRow, FileRow, StageRow};
use crate::state::AppState;

// ─── Requests ────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub position: Option<String>,
    pub skill: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
}

impl From<ListQuery> for ApplicantListFilter {
    fn from(q: ListQuery) -> Self {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        ApplicantListFilter {
            position: present(q.position),
            skill: present(q.skill),
            status: present(q.status),
            search: present(q.search),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillInput {
    /// Existing skill id; when absent the skill is found or created by `name`.
    pub id: Option<Uuid>,
    #[serde(default)]
    pub name: String,
    pub category: Option<String>,
    pub years_experience: Option<f64>,
    pub proficiency_level: Option<String>,
    pub is_highlighted: Option<bool>,
}

impl SkillInput {
    fn link(&self) -> SkillLink {
        SkillLink {
            years_experience: self.years_experience,
            proficiency_level: self.proficiency_level.clone(),
            is_highlighted: self.is_highlighted,
            is_ai_detected: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionInput {
    pub title: String,
    pub department: Option<String>,
    pub description: Option<String>,
    pub cover_letter: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub linkedin_url: Option<String>,
    pub portfolio_url: Option<String>,
    pub source: Option<String>,
    #[serde(default)]
    pub skills: Vec<SkillInput>,
    pub position: Option<PositionInput>,
    /// Skill ids to unlink (update only).
    #[serde(default)]
    pub remove_skills: Vec<Uuid>,
}

impl ApplicantRequest {
    fn fields(&self) -> ApplicantFields {
        let clean = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };
        ApplicantFields {
            first_name: clean(&self.first_name),
            last_name: clean(&self.last_name),
            email: clean(&self.email).map(|e| e.to_lowercase()),
            phone: clean(&self.phone),
            location: clean(&self.location),
            linkedin_url: clean(&self.linkedin_url),
            portfolio_url: clean(&self.portfolio_url),
            source: clean(&self.source),
        }
    }
}

fn validate_new_applicant(fields: &ApplicantFields) -> Result<(), AppError> {
    if fields.first_name.is_none() || fields.last_name.is_none() || fields.email.is_none() {
        return Err(AppError::Validation(
            "firstName, lastName, and email are required fields".to_string(),
        ));
    }
    validate_email(fields)
}

fn validate_email(fields: &ApplicantFields) -> Result<(), AppError> {
    match fields.email.as_deref() {
        Some(email) if !crate::email::is_valid_address(email) => Err(AppError::Validation(
            format!("'{email}' is not a valid email address"),
        )),
        _ => Ok(()),
    }
}

fn validate_skills(skills: &[SkillInput]) -> Result<(), AppError> {
    for skill in skills {
        if skill.id.is_none() && skill.name.trim().is_empty() {
            return Err(AppError::Validation(
                "Each skill needs a name or an id".to_string(),
            ));
        }
        if skill.years_experience.is_some_and(|y| !y.is_finite() || y < 0.0) {
            return Err(AppError::Validation(format!(
                "yearsExperience for '{}' must be a non-negative number",
                skill.name
            )));
        }
    }
    Ok(())
}

/// Unique-violation on `applicants.email` becomes a validation error.
fn duplicate_email(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Validation("An applicant with this email already exists".to_string())
        }
        _ => AppError::Database(e),
    }
}

// ─── Responses ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantRef {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub updated_at: DateTime<Utc>,
}

impl From<ApplicantRow> for ApplicantRef {
    fn from(row: ApplicantRow) -> Self {
        ApplicantRef {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Serialize)]
pub struct ApplicantMutationResponse {
    pub success: bool,
    pub applicant: ApplicantRef,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionStatus {
    pub id: Uuid,
    pub title: String,
    pub status: String,
    pub applied_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct ApplicantListItem {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub positions: Vec<PositionStatus>,
    pub skills: Vec<ApplicantSkillRow>,
}

#[derive(Serialize)]
pub struct ApplicantListResponse {
    pub applicants: Vec<ApplicantListItem>,
    pub count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDetail {
    #[serde(flatten)]
    pub application: ApplicationWithPosition,
    pub files: Vec<FileRow>,
    pub stages: Vec<StageRow>,
    pub ai_analysis: Option<AnalysisRow>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantDetail {
    #[serde(flatten)]
    pub applicant: ApplicantRow,
    pub full_name: String,
    pub applications: Vec<ApplicationDetail>,
    pub skills: Vec<ApplicantSkillRow>,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: &'static str,
}

/// Buckets rows by a key, keeping their original order within each bucket.
fn group_by<K: Eq + Hash, T>(rows: Vec<T>, key: impl Fn(&T) -> K) -> HashMap<K, Vec<T>> {
    let mut groups: HashMap<K, Vec<T>> = HashMap::new();
    for row in rows {
        groups.entry(key(&row)).or_default().push(row);
    }
    groups
}

// ─── Handlers ────────────────────────────────────────────────────────────────

/// GET /api/applicants
pub async fn handle_list_applicants(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApplicantListResponse>, AppError> {
    let filter = ApplicantListFilter::from(query);
    let applicants = store::list_applicants(&state.db, &filter).await?;
    let ids: Vec<Uuid> = applicants.iter().map(|a| a.id).collect();

    let mut applications = group_by(
        store::applications_for_applicants(&state.db, &ids).await?,
        |a| a.applicant_id,
    );
    let mut skills = group_by(
        store::skills_for_applicants(&state.db, &ids).await?,
        |s| s.applicant_id,
    );

    let applicants: Vec<ApplicantListItem> = applicants
        .into_iter()
        .map(|a| ApplicantListItem {
            name: a.full_name(),
            positions: applications
                .remove(&a.id)
                .unwrap_or_default()
                .into_iter()
                .map(|app| PositionStatus {
                    id: app.position_id,
                    title: app.position_title,
                    status: app.status,
                    applied_at: app.applied_at,
                })
                .collect(),
            skills: skills.remove(&a.id).unwrap_or_default(),
            id: a.id,
            email: a.email,
            phone: a.phone,
            location: a.location,
        })
        .collect();

    Ok(Json(ApplicantListResponse {
        count: applicants.len(),
        applicants,
    }))
}

/// POST /api/applicants
pub async fn handle_create_applicant(
    State(state): State<AppState>,
    Json(req): Json<ApplicantRequest>,
) -> Result<Json<ApplicantMutationResponse>, AppError> {
    let fields = req.fields();
    validate_new_applicant(&fields)?;
    validate_skills(&req.skills)?;

    let mut tx = state.db.begin().await?;
    let applicant = store::insert_applicant(&mut tx, &fields)
        .await
        .map_err(duplicate_email)?;

    for skill in &req.skills {
        let skill_id = match skill.id {
            Some(id) => id,
            None => store::find_or_create_skill(&mut tx, &skill.name, skill.category.as_deref()).await?,
        };
        store::upsert_skill_link(&mut tx, applicant.id, skill_id, &skill.link()).await?;
    }

    if let Some(position) = req.position.as_ref().filter(|p| !p.title.trim().is_empty()) {
        let position_id = store::find_or_create_position(
            &mut tx,
            &position.title,
            position.department.as_deref(),
            position.description.as_deref(),
        )
        .await?;
        let application_id = store::create_application(
            &mut tx,
            applicant.id,
            position_id,
            position.cover_letter.as_deref(),
            None,
        )
        .await?;
        store::record_stage(&mut tx, application_id, "applied", Some("Created via API"), "system")
            .await?;
    }

    tx.commit().await?;
    info!("Created applicant {}", applicant.id);

    Ok(Json(ApplicantMutationResponse {
        success: true,
        applicant: applicant.into(),
    }))
}

/// GET /api/applicants/:id
pub async fn handle_get_applicant(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApplicantDetail>, AppError> {
    let applicant = store::get_applicant(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Applicant not found".to_string()))?;

    let applications = store::applications_for_applicants(&state.db, &[id]).await?;
    let application_ids: Vec<Uuid> = applications.iter().map(|a| a.id).collect();

    let mut files = group_by(
        store::files_for_applications(&state.db, &application_ids).await?,
        |f| f.application_id,
    );
    let mut stages = group_by(
        store::stages_for_applications(&state.db, &application_ids).await?,
        |s| s.application_id,
    );
    let mut analyses = group_by(
        store::latest_analyses(&state.db, &application_ids).await?,
        |a| a.application_id,
    );
    let skills = store::skills_for_applicants(&state.db, &[id]).await?;

    let applications = applications
        .into_iter()
        .map(|application| ApplicationDetail {
            files: files.remove(&application.id).unwrap_or_default(),
            stages: stages.remove(&application.id).unwrap_or_default(),
            ai_analysis: analyses
                .remove(&application.id)
                .and_then(|mut rows| rows.pop()),
            application,
        })
        .collect();

    Ok(Json(ApplicantDetail {
        full_name: applicant.full_name(),
        applicant,
        applications,
        skills,
    }))
}

/// PUT /api/applicants/:id
pub async fn handle_update_applicant(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ApplicantRequest>,
) -> Result<Json<ApplicantMutationResponse>, AppError> {
    let fields = req.fields();
    validate_email(&fields)?;
    validate_skills(&req.skills)?;

    let mut tx = state.db.begin().await?;
    let applicant = store::update_applicant(&mut tx, id, &fields)
        .await
        .map_err(duplicate_email)?
        .ok_or_else(|| AppError::NotFound("Applicant not found".to_string()))?;

    for skill in &req.skills {
        let skill_id = match skill.id {
            Some(skill_id) => skill_id,
            None => store::find_or_create_skill(&mut tx, &skill.name, skill.category.as_deref()).await?,
        };
        store::upsert_skill_link(&mut tx, id, skill_id, &skill.link()).await?;
    }
    if !req.remove_skills.is_empty() {
        store::remove_skill_links(&mut tx, id, &req.remove_skills).await?;
    }

    tx.commit().await?;
    info!("Updated applicant {id}");

    Ok(Json(ApplicantMutationResponse {
        success: true,
        applicant: applicant.into(),
    }))
}

/// DELETE /api/applicants/:id
pub async fn handle_delete_applicant(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, AppError> {
    if !store::delete_applicant(&state.db, id).await? {
        return Err(AppError::NotFound("Applicant not found".to_string()));
    }
    info!("Deleted applicant {id}");
    Ok(Json(DeleteResponse {
        success: true,
        message: "Applicant deleted successfully",
    }))
}

/// POST /api/applicants/:id/summary
///
/// The summary is stored against the applicant's latest application when
/// there is one.
pub async fn handle_generate_summary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApplicantSummary>, AppError> {
    let applicant = store::get_applicant(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Applicant not found".to_string()))?;
    let latest = store::applications_for_applicants(&state.db, &[id])
        .await?
        .into_iter()
        .next();
    let skills: Vec<String> = store::skills_for_applicants(&state.db, &[id])
        .await?
        .into_iter()
        .map(|s| s.name)
        .collect();

    let summary = generate_applicant_summary(
        &applicant,
        latest.as_ref().map(|a| a.position_title.as_str()),
        &skills,
        state.llm.as_ref(),
    )
    .await?;

    if let Some(application) = &latest {
        let result = serde_json::to_value(&summary).map_err(anyhow::Error::from)?;
        record_analysis(&state.db, application.id, APPLICANT_SUMMARY, &result, None).await?;
    }

    Ok(Json(summary))
}
