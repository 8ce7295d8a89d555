use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use redis::Client as RedisClient;
use sqlx::PgPool;

use crate::config::Config;
use crate::email::EmailClient;
use crate::llm_client::TextGenerator;
use crate::mcp::service::McpService;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Session store.
    pub redis: RedisClient,
    pub s3: S3Client,
    pub llm: Arc<dyn TextGenerator>,
    /// Task-tracker and database-gateway tool services, connected on first use.
    pub mcp: Arc<McpService>,
    pub email: EmailClient,
    /// Plain HTTP client for fetching resumes linked from intake forms.
    pub http: reqwest::Client,
    pub config: Config,
}
