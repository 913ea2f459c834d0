//! Object storage module
//!
//! Video bytes live in an S3-compatible bucket. The database only keeps a
//! [`StorageReference`], rendered as `minio://{bucket}/{key}`, which is enough
//! to regenerate a download link later.
//!
//! # Example
//!
//! ```
//! use video_upload_service::storage::StorageReference;
//!
//! let reference = StorageReference::new("videos", "1700000000000000000-clip.mp4");
//! let rendered = reference.to_string();
//! assert_eq!(rendered, "minio://videos/1700000000000000000-clip.mp4");
//! assert_eq!(StorageReference::parse(&rendered).unwrap(), reference);
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub mod body;
pub mod s3;

pub use body::{ObjectBody, Spool, DEFAULT_SPOOL_THRESHOLD};
pub use s3::S3ObjectStore;

/// Scheme prefix of every stored reference
pub const REFERENCE_SCHEME: &str = "minio://";

/// Content type used when the upload does not declare one
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Object storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Presign failed: {0}")]
    PresignFailed(String),

    #[error("Bucket error: {0}")]
    BucketError(String),

    #[error("Malformed storage reference: {0}")]
    MalformedReference(String),
}

/// Location of an object, as persisted in the metadata table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageReference {
    pub bucket: String,
    pub key: String,
}

impl StorageReference {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Parse `minio://{bucket}/{key}`
    ///
    /// The key may itself contain `/`. Bucket and key must both be non-empty.
    pub fn parse(s: &str) -> Result<Self, StorageError> {
        let rest = s
            .strip_prefix(REFERENCE_SCHEME)
            .ok_or_else(|| StorageError::MalformedReference(s.to_string()))?;

        match rest.split_once('/') {
            Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => {
                Ok(Self::new(bucket, key))
            }
            _ => Err(StorageError::MalformedReference(s.to_string())),
        }
    }
}

impl fmt::Display for StorageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", REFERENCE_SCHEME, self.bucket, self.key)
    }
}

/// Build the object key for an upload: `{unix-nanos}-{filename}`
pub fn object_key(uploaded_at: DateTime<Utc>, filename: &str) -> String {
    let nanos = uploaded_at
        .timestamp_nanos_opt()
        .unwrap_or_else(|| uploaded_at.timestamp().saturating_mul(1_000_000_000));
    format!("{}-{}", nanos, filename)
}

/// Result of a successful object write
#[derive(Debug, Clone)]
pub struct PutObjectOutput {
    pub etag: Option<String>,
    pub size: u64,
}

/// Object store operations used by the handlers
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `body` under `bucket`/`key`
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ObjectBody,
        content_type: &str,
    ) -> Result<PutObjectOutput, StorageError>;

    /// Time-limited GET link for `bucket`/`key`
    async fn presigned_get_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError>;

    /// Create `bucket` if it does not exist yet
    ///
    /// # Returns
    ///
    /// `true` when the bucket was created by this call.
    async fn ensure_bucket(&self, bucket: &str) -> Result<bool, StorageError>;
}
