//! PostgreSQL implementation of [`VideoStore`]

use super::{DbError, NewVideo, VideoRecord, VideoStore};
use crate::config::DatabaseConfig;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::PgPool;
use std::time::Duration;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS videos (
        id SERIAL PRIMARY KEY,
        name TEXT,
        url TEXT,
        timestamp BIGINT
    )
"#;

// `id` is SERIAL (int4) and the text columns are nullable in existing deployments.
const SELECT_COLUMNS: &str = "id::BIGINT AS id, COALESCE(name, '') AS name, \
     COALESCE(url, '') AS url, COALESCE(timestamp, 0) AS timestamp";

/// Video metadata repository over a bounded connection pool
#[derive(Clone)]
pub struct PgVideoStore {
    pool: PgPool,
}

impl PgVideoStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open the pool with the configured bounds and verify connectivity
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DbError> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.name)
            .ssl_mode(PgSslMode::Disable);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(options)
            .await
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;

        let store = Self::new(pool);
        store.ping().await?;

        tracing::info!(
            host = %config.host,
            db = %config.name,
            max_connections = config.max_connections,
            "Database pool ready"
        );

        Ok(store)
    }

    /// Round-trip a trivial query
    pub async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(())
    }

    /// Create the `videos` table if it does not exist
    pub async fn ensure_schema(&self) -> Result<(), DbError> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::SchemaError(e.to_string()))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl VideoStore for PgVideoStore {
    #[tracing::instrument(
        name = "db.insert_video",
        skip(self, video),
        fields(name = %video.name),
        err
    )]
    async fn insert(&self, video: NewVideo) -> Result<i64, DbError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO videos (name, url, timestamp) VALUES ($1, $2, $3) RETURNING id::BIGINT",
        )
        .bind(&video.name)
        .bind(&video.url)
        .bind(video.timestamp)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::QueryError(e.to_string()))?;

        Ok(id)
    }

    #[tracing::instrument(name = "db.list_videos", skip(self), err)]
    async fn list(&self) -> Result<Vec<VideoRecord>, DbError> {
        let sql = format!("SELECT {} FROM videos ORDER BY id", SELECT_COLUMNS);
        sqlx::query_as::<_, VideoRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))
    }

    #[tracing::instrument(name = "db.get_video", skip(self), err)]
    async fn get(&self, id: i64) -> Result<Option<VideoRecord>, DbError> {
        let sql = format!("SELECT {} FROM videos WHERE id = $1", SELECT_COLUMNS);
        sqlx::query_as::<_, VideoRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))
    }
}
