//! Video metadata persistence
//!
//! A single table holds one row per uploaded video:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS videos (
//!     id SERIAL PRIMARY KEY,
//!     name TEXT,
//!     url TEXT,
//!     timestamp BIGINT
//! )
//! ```
//!
//! `url` stores the [`StorageReference`](crate::storage::StorageReference),
//! never a downloadable link.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub mod postgres;

pub use postgres::PgVideoStore;

/// Database errors
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Schema error: {0}")]
    SchemaError(String),
}

/// One row of the `videos` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct VideoRecord {
    pub id: i64,
    pub name: String,
    /// Storage reference (`minio://bucket/key`)
    pub url: String,
    /// Upload time, epoch seconds
    pub timestamp: i64,
}

/// Fields supplied when inserting a row; the id is assigned by the store
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub name: String,
    pub url: String,
    pub timestamp: i64,
}

/// Metadata store operations used by the handlers
#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Insert a row and return its assigned id
    async fn insert(&self, video: NewVideo) -> Result<i64, DbError>;

    /// All rows, ordered by id
    async fn list(&self) -> Result<Vec<VideoRecord>, DbError>;

    /// One row by id, `None` when absent
    async fn get(&self, id: i64) -> Result<Option<VideoRecord>, DbError>;
}
