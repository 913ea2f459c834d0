//! Video Upload Service Library
//!
//! HTTP service that accepts video uploads, stores them in S3-compatible
//! object storage (MinIO in the reference deployment) and records their
//! metadata in PostgreSQL.
//!
//! # Features
//!
//! - **Upload**: `POST /upload` with a multipart `video` field
//! - **Retrieval**: `GET /videos` and `GET /video/{id}` return time-limited
//!   presigned download links, never raw storage locations
//! - **Correlation**: every request carries an `X-Correlation-ID` and a
//!   request-scoped logger
//! - **Operations**: health probe, Prometheus metrics and an optional crash
//!   endpoint for restart drills
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use video_upload_service::{
//!     config::Config, db::PgVideoStore, handlers::AppState, server::Server,
//!     storage::S3ObjectStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let objects = S3ObjectStore::new(&config.storage).await?;
//!     let videos = PgVideoStore::connect(&config.database).await?;
//!     let state = AppState::new(Arc::new(objects), Arc::new(videos), &config);
//!     let server = Server::bind(&config.server.address, Arc::new(state)).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod db;
#[cfg(feature = "fault-injection")]
pub mod fault;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod router;
pub mod server;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use handlers::AppState;
pub use server::Server;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
