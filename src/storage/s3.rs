//! S3-compatible object store backed by the AWS SDK
//!
//! Works against AWS S3 and MinIO alike: path-style addressing is forced and
//! the endpoint comes from [`StorageConfig::endpoint_url`].
//!
//! # Tracing
//!
//! | Operation | Span Name | Attributes |
//! |-----------|-----------|------------|
//! | PutObject | `s3.put_object` | bucket, key, bytes, etag |
//! | Presign GetObject | `s3.presign_get` | bucket, key, expires_secs |
//! | HeadBucket / CreateBucket | `s3.ensure_bucket` | bucket, created |

use super::{ObjectBody, ObjectStore, PutObjectOutput, StorageError};
use crate::config::StorageConfig;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use std::time::Duration;

/// Region AWS treats as the default location for new buckets
const DEFAULT_LOCATION: &str = "us-east-1";

/// Object store client for one S3-compatible endpoint
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    region: String,
    endpoint: String,
}

impl S3ObjectStore {
    /// Create a client from configuration
    ///
    /// Static credentials from the config take precedence. Without them the
    /// default AWS provider chain (environment, profile, instance metadata)
    /// is used.
    pub async fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let endpoint = config.endpoint_url();
        let region = Region::new(config.region.clone());

        let s3_config = match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                let credentials = Credentials::new(
                    access_key.clone(),
                    secret_key.clone(),
                    None,
                    None,
                    "video-upload-service",
                );
                aws_sdk_s3::Config::builder()
                    .behavior_version(BehaviorVersion::latest())
                    .region(region)
                    .credentials_provider(credentials)
                    .endpoint_url(&endpoint)
                    .force_path_style(true)
                    .build()
            }
            (None, None) => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
                    .endpoint_url(&endpoint)
                    .force_path_style(true)
                    .build()
            }
            _ => {
                return Err(StorageError::ConfigError(
                    "access_key and secret_key must be set together".into(),
                ))
            }
        };

        Ok(Self {
            client: Client::from_conf(s3_config),
            region: config.region.clone(),
            endpoint,
        })
    }

    /// Get the endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Get the region
    pub fn region(&self) -> &str {
        &self.region
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[tracing::instrument(
        name = "s3.put_object",
        skip(self, body),
        fields(
            s3.bucket = %bucket,
            s3.key = %key,
            upload.bytes = body.len(),
            s3.etag = tracing::field::Empty
        ),
        err
    )]
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ObjectBody,
        content_type: &str,
    ) -> Result<PutObjectOutput, StorageError> {
        let size = body.len();
        // Spooled bodies are read from disk while the request is sent.
        let stream = body
            .byte_stream()
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        let output = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .content_length(size as i64)
            .body(stream)
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(DisplayErrorContext(&e).to_string()))?;

        let etag = output.e_tag().map(str::to_string);
        if let Some(ref etag) = etag {
            tracing::Span::current().record("s3.etag", etag.as_str());
        }

        drop(body);
        Ok(PutObjectOutput { etag, size })
    }

    #[tracing::instrument(
        name = "s3.presign_get",
        skip(self),
        fields(s3.bucket = %bucket, s3.key = %key, expires_secs = expires_in.as_secs()),
        err
    )]
    async fn presigned_get_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::PresignFailed(DisplayErrorContext(&e).to_string()))?;

        Ok(request.uri().to_string())
    }

    #[tracing::instrument(
        name = "s3.ensure_bucket",
        skip(self),
        fields(s3.bucket = %bucket, created = tracing::field::Empty),
        err
    )]
    async fn ensure_bucket(&self, bucket: &str) -> Result<bool, StorageError> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => {
                tracing::Span::current().record("created", false);
                return Ok(false);
            }
            Err(e) => {
                let not_found = e
                    .as_service_error()
                    .map(|service| service.is_not_found())
                    .unwrap_or(false);
                if !not_found {
                    return Err(StorageError::BucketError(
                        DisplayErrorContext(&e).to_string(),
                    ));
                }
            }
        }

        let mut create = self.client.create_bucket().bucket(bucket);
        if self.region != DEFAULT_LOCATION {
            create = create.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        create
            .send()
            .await
            .map_err(|e| StorageError::BucketError(DisplayErrorContext(&e).to_string()))?;

        tracing::Span::current().record("created", true);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_config() -> StorageConfig {
        StorageConfig {
            endpoint: "localhost:9000".into(),
            bucket: "videos".into(),
            region: "us-east-1".into(),
            access_key: Some("minioadmin".into()),
            secret_key: Some("minioadmin".into()),
            use_ssl: false,
            presign_expiry_secs: 3600,
        }
    }

    #[tokio::test]
    async fn test_client_creation() {
        let store = S3ObjectStore::new(&storage_config()).await.unwrap();
        assert_eq!(store.endpoint(), "http://localhost:9000");
        assert_eq!(store.region(), "us-east-1");
    }

    #[tokio::test]
    async fn test_half_configured_credentials_rejected() {
        let mut config = storage_config();
        config.secret_key = None;
        assert!(matches!(
            S3ObjectStore::new(&config).await,
            Err(StorageError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_presign_is_local_and_signed() {
        let store = S3ObjectStore::new(&storage_config()).await.unwrap();
        let url = store
            .presigned_get_url("videos", "123-clip.mp4", Duration::from_secs(3600))
            .await
            .unwrap();

        assert!(url.starts_with("http://localhost:9000/videos/123-clip.mp4?"));
        assert!(url.contains("X-Amz-Signature="));
        assert!(url.contains("X-Amz-Expires=3600"));
    }

    #[tokio::test]
    async fn test_presign_rejects_excessive_expiry() {
        let store = S3ObjectStore::new(&storage_config()).await.unwrap();
        let result = store
            .presigned_get_url("videos", "clip.mp4", Duration::from_secs(8 * 24 * 3600))
            .await;
        assert!(matches!(result, Err(StorageError::PresignFailed(_))));
    }
}
