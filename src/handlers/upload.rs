//! `POST /upload`
//!
//! Reads the `video` file field, writes it to the object store under a
//! time-prefixed key and records a metadata row pointing at it. The field is
//! read chunk by chunk into a [`Spool`], so large uploads sit in a temporary
//! file rather than in memory. A metadata
//! failure after a successful write leaves the object orphaned; the key is
//! logged so it can be cleaned up by hand.

use super::{empty, ApiError, AppState, HttpResponse};
use crate::db::NewVideo;
use crate::metrics;
use crate::middleware::get_correlation_id;
use crate::storage::{object_key, ObjectBody, Spool, StorageReference, DEFAULT_CONTENT_TYPE};
use bytes::Bytes;
use chrono::Utc;
use http_body_util::BodyExt;
use hyper::body::Body;
use hyper::header::CONTENT_TYPE;
use hyper::{Request, StatusCode};
use multer::{Constraints, Multipart, SizeLimit};
use thiserror::Error;

/// Form field carrying the file
pub const VIDEO_FIELD: &str = "video";

const COMPONENT: &str = "upload_handler";

/// Why the `video` field could not be read
#[derive(Error, Debug)]
pub enum FormError {
    #[error("request Content-Type isn't multipart/form-data")]
    NotMultipart,

    #[error("no such file: missing form field \"video\"")]
    MissingField,

    #[error("form field \"video\" has no filename")]
    MissingFilename,

    #[error(transparent)]
    Multipart(#[from] multer::Error),

    /// Server side: the part could not be buffered
    #[error("failed to buffer upload: {0}")]
    Spool(#[from] std::io::Error),
}

/// The uploaded file
#[derive(Debug)]
pub struct UploadedVideo {
    pub filename: String,
    pub content_type: String,
    pub body: ObjectBody,
}

/// Pull the `video` file field out of a multipart request
///
/// Other fields are skipped. The field is capped at `max_bytes` and moves to
/// a temporary file once it exceeds `spool_threshold`.
pub async fn extract_video<B>(
    req: Request<B>,
    max_bytes: u64,
    spool_threshold: usize,
) -> Result<UploadedVideo, FormError>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + Send + 'static,
{
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or(FormError::NotMultipart)?;
    let boundary = multer::parse_boundary(content_type).map_err(|_| FormError::NotMultipart)?;

    let mut parts = Multipart::with_constraints(
        req.into_body().into_data_stream(),
        boundary,
        Constraints::new().size_limit(SizeLimit::new().for_field(VIDEO_FIELD, max_bytes)),
    );

    while let Some(mut field) = parts.next_field().await? {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .map(base_name)
            .filter(|name| !name.is_empty())
            .ok_or(FormError::MissingFilename)?
            .to_string();
        let content_type = field
            .content_type()
            .map(|mime| mime.to_string())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        let mut spool = Spool::new(spool_threshold);
        while let Some(chunk) = field.chunk().await? {
            spool.write(&chunk).await?;
        }

        return Ok(UploadedVideo {
            filename,
            content_type,
            body: spool.finish().await?,
        });
    }

    Err(FormError::MissingField)
}

// Clients may send a full path; only the last segment is kept.
fn base_name(filename: &str) -> &str {
    filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
}

/// Handle `POST /upload`
pub async fn upload<B>(state: &AppState, req: Request<B>) -> Result<HttpResponse, ApiError>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + Send + 'static,
{
    let correlation_id = get_correlation_id(req.extensions());

    let video = match extract_video(req, state.max_upload_bytes, state.spool_threshold).await {
        Ok(video) => video,
        Err(FormError::Spool(e)) => {
            tracing::error!(
                error = %e,
                correlation_id = %correlation_id,
                component = COMPONENT,
                "Failed to buffer uploaded file"
            );
            metrics::record_upload_failure("buffer");
            return Err(ApiError::Internal(e.to_string()));
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                correlation_id = %correlation_id,
                component = COMPONENT,
                "Failed to get file from form"
            );
            metrics::record_upload_failure("validation");
            return Err(ApiError::Validation(e.to_string()));
        }
    };

    let filename = video.filename;
    tracing::info!(
        correlation_id = %correlation_id,
        component = COMPONENT,
        filename = %filename,
        size = video.body.len(),
        spooled = video.body.is_spooled(),
        "Video upload started"
    );

    let key = object_key(Utc::now(), &filename);
    let written = state
        .objects
        .put_object(&state.bucket, &key, video.body, &video.content_type)
        .await
        .map_err(|e| {
            tracing::error!(
                error = %e,
                correlation_id = %correlation_id,
                component = COMPONENT,
                filename = %filename,
                "Object storage upload failed"
            );
            metrics::record_upload_failure("storage");
            ApiError::UpstreamStorage(e.to_string())
        })?;

    let reference = StorageReference::new(state.bucket.as_str(), key.as_str()).to_string();
    tracing::info!(
        correlation_id = %correlation_id,
        component = COMPONENT,
        filename = %filename,
        object_name = %key,
        url = %reference,
        size = written.size,
        "Video uploaded to object storage"
    );

    let timestamp = Utc::now().timestamp();
    let id = state
        .videos
        .insert(NewVideo {
            name: filename.clone(),
            url: reference,
            timestamp,
        })
        .await
        .map_err(|e| {
            tracing::error!(
                error = %e,
                correlation_id = %correlation_id,
                component = COMPONENT,
                filename = %filename,
                orphaned_object = %key,
                "Failed to store video metadata"
            );
            metrics::record_upload_failure("database");
            ApiError::Persistence(e.to_string())
        })?;

    tracing::info!(
        correlation_id = %correlation_id,
        component = COMPONENT,
        filename = %filename,
        video_id = id,
        timestamp,
        "Video metadata stored in database"
    );
    metrics::record_upload_success(written.size);

    Ok(empty(StatusCode::CREATED))
}
