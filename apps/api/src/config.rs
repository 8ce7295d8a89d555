use anyhow::{Context, Result};

/// A remote tool endpoint: URL plus the bearer token it expects.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointConfig {
    pub url: String,
    pub token: String,
}

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub gemini_api_key: String,
    /// Shared secret expected as `Authorization: Bearer <secret>` on the intake webhook.
    pub webhook_secret: String,
    pub admin_email: String,
    pub admin_password: String,
    pub tracker_mcp: Option<EndpointConfig>,
    pub gateway_mcp: Option<EndpointConfig>,
    pub sendgrid_api_key: Option<String>,
    pub sendgrid_from_email: Option<String>,
    pub mcp_timeout_secs: u64,
    pub session_ttl_secs: u64,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            webhook_secret: require_env("WEBHOOK_SECRET")?,
            admin_email: require_env("ADMIN_EMAIL")?,
            admin_password: require_env("ADMIN_PASSWORD")?,
            tracker_mcp: endpoint(optional_env("TRACKER_MCP_URL"), optional_env("TRACKER_MCP_TOKEN")),
            gateway_mcp: endpoint(optional_env("GATEWAY_MCP_URL"), optional_env("GATEWAY_MCP_TOKEN")),
            sendgrid_api_key: optional_env("SENDGRID_API_KEY"),
            sendgrid_from_email: optional_env("SENDGRID_FROM_EMAIL"),
            mcp_timeout_secs: parse_env("MCP_TIMEOUT_SECS", 30)?,
            session_ttl_secs: parse_env("SESSION_TTL_SECS", 86_400)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and blank are the same thing.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .ok()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}

/// An endpoint exists only when both halves are configured.
fn endpoint(url: Option<String>, token: Option<String>) -> Option<EndpointConfig> {
    Some(EndpointConfig {
        url: url?,
        token: token?,
    })
}
