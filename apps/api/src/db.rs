use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

const MAX_CONNECTIONS: u32 = 10;
/// Requests waiting longer than this for a connection fail with a database error.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connects the pool and checks it with a round trip before serving traffic.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await
        .context("Failed to connect to DATABASE_URL")?;

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .context("PostgreSQL did not answer the startup check")?;

    info!("PostgreSQL connection pool established ({MAX_CONNECTIONS} max)");
    Ok(pool)
}
