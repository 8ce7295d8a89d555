mod analysis;
mod applicants;
mod auth;
mod config;
mod db;
mod email;
mod errors;
mod files;
mod intake;
mod llm_client;
mod mcp;
mod models;
mod routes;
mod search;
mod state;
mod storage;
mod workflow;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::email::EmailClient;
use crate::llm_client::{LlmClient, TextGenerator};
use crate::mcp::client::HttpConnector;
use crate::mcp::service::McpService;
use crate::routes::build_router;
use crate::state::AppState;

/// Generation calls can be slow on long resumes.
const LLM_TIMEOUT: Duration = Duration::from_secs(120);
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting HR Buddy API v{}", env!("CARGO_PKG_VERSION"));

    let db = create_pool(&config.database_url).await?;

    // Sessions
    let redis = redis::Client::open(config.redis_url.clone())?;
    info!("Redis client initialized");

    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    let llm_http = reqwest::Client::builder().timeout(LLM_TIMEOUT).build()?;
    let llm: Arc<dyn TextGenerator> =
        Arc::new(LlmClient::new(llm_http, config.gemini_api_key.clone()));
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

    // Tool services connect lazily on first use. Timeouts are per request.
    let connector = HttpConnector::new(
        reqwest::Client::new(),
        Duration::from_secs(config.mcp_timeout_secs),
    );
    let mcp = Arc::new(McpService::new(
        Arc::new(connector),
        config.tracker_mcp.clone(),
        config.gateway_mcp.clone(),
    ));
    if config.tracker_mcp.is_none() || config.gateway_mcp.is_none() {
        info!("MCP endpoints incomplete; tool calls will fail until both are configured");
    }

    let email = EmailClient::new(
        http.clone(),
        config.sendgrid_api_key.clone(),
        config.sendgrid_from_email.clone(),
    );

    let state = AppState {
        db,
        redis,
        s3,
        llm,
        mcp,
        email,
        http,
        config: config.clone(),
    };

    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "hrbuddy-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
