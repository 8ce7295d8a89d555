use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::applicants::store::{find_or_create_skill, upsert_skill_link, SkillLink};
use crate::llm_client::MODEL;

/// Appends an analysis row. Analyses are never updated in place.
pub async fn record_analysis(
    pool: &PgPool,
    application_id: Uuid,
    analysis_type: &str,
    result: &Value,
    confidence_score: Option<f64>,
) -> sqlx::Result<Uuid> {
    sqlx::query_scalar(
        r#"
        INSERT INTO ai_analyses (application_id, analysis_type, analysis_result, confidence_score, model_version)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(application_id)
    .bind(analysis_type)
    .bind(result)
    .bind(confidence_score)
    .bind(MODEL)
    .fetch_one(pool)
    .await
}

/// Links every detected skill to the applicant as AI-detected, in one transaction.
pub async fn link_detected_skills(
    pool: &PgPool,
    applicant_id: Uuid,
    skills: &[String],
) -> sqlx::Result<usize> {
    if skills.is_empty() {
        return Ok(0);
    }
    let mut tx = pool.begin().await?;
    let link = SkillLink {
        is_ai_detected: true,
        ..SkillLink::default()
    };
    for name in skills {
        let skill_id = find_or_create_skill(&mut tx, name, None).await?;
        upsert_skill_link(&mut tx, applicant_id, skill_id, &link).await?;
    }
    tx.commit().await?;
    Ok(skills.len())
}
