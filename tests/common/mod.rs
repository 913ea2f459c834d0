//! Common Test Infrastructure
//!
//! Provides shared utilities for API tests:
//! - In-memory object and metadata stores with failure switches
//! - A test server bound to an OS-assigned port
//! - Multipart upload helpers

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use video_upload_service::config::{Config, ConfigLoader};
use video_upload_service::db::{DbError, NewVideo, VideoRecord, VideoStore};
use video_upload_service::storage::{ObjectBody, ObjectStore, PutObjectOutput, StorageError};
use video_upload_service::{AppState, Server};

/// Bucket configured for every test server
pub const TEST_BUCKET: &str = "videos";

/// A stored object
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
    /// Whether the body arrived from a spool file
    pub spooled: bool,
}

/// Object store kept in memory
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), StoredObject>>,
    fail_puts: AtomicBool,
    fail_presign: AtomicBool,
}

impl MemoryObjectStore {
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_presign(&self, fail: bool) {
        self.fail_presign.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .map(|(_, key)| key.clone())
            .collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ObjectBody,
        content_type: &str,
    ) -> Result<PutObjectOutput, StorageError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StorageError::UploadFailed("connection refused".into()));
        }

        let size = body.len();
        let spooled = body.is_spooled();
        let data = body
            .into_bytes()
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data,
                content_type: content_type.to_string(),
                spooled,
            },
        );

        Ok(PutObjectOutput {
            etag: Some(uuid::Uuid::new_v4().to_string()),
            size,
        })
    }

    async fn presigned_get_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        if self.fail_presign.load(Ordering::SeqCst) {
            return Err(StorageError::PresignFailed("signing key unavailable".into()));
        }

        Ok(format!(
            "http://fake-storage/{}/{}?X-Amz-Expires={}&X-Amz-Signature={}",
            bucket,
            key,
            expires_in.as_secs(),
            uuid::Uuid::new_v4().simple()
        ))
    }

    async fn ensure_bucket(&self, _bucket: &str) -> Result<bool, StorageError> {
        Ok(false)
    }
}

/// Metadata store kept in memory
#[derive(Default)]
pub struct MemoryVideoStore {
    rows: Mutex<Vec<VideoRecord>>,
    fail: AtomicBool,
}

impl MemoryVideoStore {
    /// Make every operation fail
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Insert a row directly, bypassing the upload path
    pub fn seed(&self, name: &str, url: &str) -> i64 {
        let mut rows = self.rows.lock().unwrap();
        let id = rows.len() as i64 + 1;
        rows.push(VideoRecord {
            id,
            name: name.to_string(),
            url: url.to_string(),
            timestamp: 1_700_000_000,
        });
        id
    }

    pub fn rows(&self) -> Vec<VideoRecord> {
        self.rows.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), DbError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(DbError::QueryError("connection to server was lost".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl VideoStore for MemoryVideoStore {
    async fn insert(&self, video: NewVideo) -> Result<i64, DbError> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        let id = rows.len() as i64 + 1;
        rows.push(VideoRecord {
            id,
            name: video.name,
            url: video.url,
            timestamp: video.timestamp,
        });
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<VideoRecord>, DbError> {
        self.check()?;
        let mut rows = self.rows();
        rows.sort_by_key(|row| row.id);
        Ok(rows)
    }

    async fn get(&self, id: i64) -> Result<Option<VideoRecord>, DbError> {
        self.check()?;
        Ok(self.rows().into_iter().find(|row| row.id == id))
    }
}

/// Configuration pointing at nothing real; the stores are injected
pub fn test_config() -> Config {
    let vars: HashMap<&str, &str> = [
        ("MINIO_ENDPOINT", "localhost:9000"),
        ("MINIO_BUCKET", TEST_BUCKET),
        ("DB_HOST", "localhost"),
        ("DB_NAME", "videos"),
    ]
    .into_iter()
    .collect();

    ConfigLoader::from_lookup(|name| vars.get(name).map(|v| v.to_string()))
        .expect("test configuration is valid")
}

/// A running server backed by in-memory stores
pub struct TestEnv {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    pub objects: Arc<MemoryObjectStore>,
    pub videos: Arc<MemoryVideoStore>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestEnv {
    pub async fn start() -> Self {
        Self::with_state(|state| state).await
    }

    /// Start with a customized handler state
    pub async fn with_state<F>(customize: F) -> Self
    where
        F: FnOnce(AppState) -> AppState,
    {
        let objects = Arc::new(MemoryObjectStore::default());
        let videos = Arc::new(MemoryVideoStore::default());
        let state = customize(AppState::new(
            objects.clone(),
            videos.clone(),
            &test_config(),
        ));

        let server = Server::bind("127.0.0.1:0", Arc::new(state))
            .await
            .expect("Failed to bind test server");
        let addr = server.local_addr();

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _ = server
                .run_until(async move {
                    let _ = rx.await;
                })
                .await;
        });

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build client");

        Self {
            addr,
            client,
            objects,
            videos,
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("request failed")
    }

    /// Upload `data` as the `video` field
    pub async fn upload(&self, filename: &str, data: &[u8]) -> reqwest::Response {
        let part = reqwest::multipart::Part::bytes(data.to_vec())
            .file_name(filename.to_string())
            .mime_str("video/mp4")
            .unwrap();
        let form = reqwest::multipart::Form::new().part("video", part);
        self.post_form(form).await
    }

    pub async fn post_form(&self, form: reqwest::multipart::Form) -> reqwest::Response {
        self.client
            .post(self.url("/upload"))
            .multipart(form)
            .send()
            .await
            .expect("request failed")
    }

    /// Stop accepting connections and wait for the server task
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestEnv {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Header value of `X-Correlation-ID`
pub fn correlation_id(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("x-correlation-id")
        .expect("missing X-Correlation-ID")
        .to_str()
        .unwrap()
        .to_string()
}
