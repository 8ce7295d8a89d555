use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PositionRow {
    pub id: Uuid,
    pub title: String,
    pub department: String,
    pub description: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRow {
    pub id: Uuid,
    pub applicant_id: Uuid,
    pub position_id: Uuid,
    pub status: String,
    pub cover_letter: Option<String>,
    pub intake_form_data: Option<Value>,
    pub applied_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StageRow {
    pub id: Uuid,
    pub application_id: Uuid,
    pub stage: String,
    pub notes: Option<String>,
    pub changed_by: Option<String>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FileRow {
    pub id: Uuid,
    pub application_id: Uuid,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub storage_path: String,
    pub file_category: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRow {
    pub id: Uuid,
    pub application_id: Uuid,
    pub analysis_type: String,
    pub analysis_result: Value,
    pub confidence_score: Option<f64>,
    pub model_version: String,
    pub created_at: DateTime<Utc>,
}
