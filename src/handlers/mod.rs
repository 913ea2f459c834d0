//! HTTP handlers
//!
//! [`route`] dispatches a request to the upload, listing, lookup and system
//! handlers. Handlers return `Result<HttpResponse, ApiError>`; every error is
//! rendered as `{"error": "<text>"}` with the status from [`ApiError::status`].

pub mod system;
pub mod upload;
pub mod videos;

use crate::config::Config;
use crate::db::VideoStore;
#[cfg(feature = "fault-injection")]
use crate::fault::CrashSwitch;
use crate::router::{Route, RouteParser, RouterError};
use crate::storage::ObjectStore;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Response type produced by every handler
pub type HttpResponse = Response<Full<Bytes>>;

/// Shared handler state
pub struct AppState {
    pub objects: Arc<dyn ObjectStore>,
    pub videos: Arc<dyn VideoStore>,
    /// Bucket all uploads go to
    pub bucket: String,
    /// Lifetime of generated download links
    pub presign_expiry: Duration,
    /// Upper bound for the `video` form field
    pub max_upload_bytes: u64,
    /// Size past which uploads are buffered on disk
    pub spool_threshold: usize,
    pub metrics_enabled: bool,
    #[cfg(feature = "fault-injection")]
    pub crash: CrashSwitch,
}

impl AppState {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        videos: Arc<dyn VideoStore>,
        config: &Config,
    ) -> Self {
        Self {
            objects,
            videos,
            bucket: config.storage.bucket.clone(),
            presign_expiry: config.storage.presign_expiry(),
            max_upload_bytes: config.upload.max_file_size,
            spool_threshold: config.upload.spool_threshold,
            metrics_enabled: config.metrics.enabled,
            #[cfg(feature = "fault-injection")]
            crash: CrashSwitch::fatal(config.fault_injection.crash_delay()),
        }
    }

    /// Replace the action taken by `GET /crash`
    #[cfg(feature = "fault-injection")]
    pub fn with_crash_switch(mut self, crash: CrashSwitch) -> Self {
        self.crash = crash;
        self
    }
}

/// Errors surfaced to clients
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request was malformed
    #[error("{0}")]
    Validation(String),

    /// Object store rejected the write
    #[error("{0}")]
    UpstreamStorage(String),

    /// Metadata store failed
    #[error("{0}")]
    Persistence(String),

    #[error("Video not found")]
    NotFound,

    /// Stored reference could not be parsed
    #[error("Invalid video URL")]
    MalformedReference,

    #[error("Failed to generate video URL")]
    PresignFailed,

    #[error("Not Found")]
    RouteNotFound,

    #[error("Method Not Allowed")]
    MethodNotAllowed,

    /// Detail is logged, never returned
    #[error("Internal Server Error")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound | ApiError::RouteNotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::UpstreamStorage(_)
            | ApiError::Persistence(_)
            | ApiError::MalformedReference
            | ApiError::PresignFailed
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn into_response(self) -> HttpResponse {
        #[derive(Serialize)]
        struct ErrorBody {
            error: String,
        }

        json_response(
            self.status(),
            &ErrorBody {
                error: self.to_string(),
            },
        )
    }
}

impl From<RouterError> for ApiError {
    fn from(err: RouterError) -> Self {
        match err {
            RouterError::NotFound(_) => ApiError::RouteNotFound,
            RouterError::MethodNotAllowed { .. } => ApiError::MethodNotAllowed,
        }
    }
}

/// Serialize `body` as a JSON response
pub fn json_response<T: Serialize + ?Sized>(status: StatusCode, body: &T) -> HttpResponse {
    match serde_json::to_vec(body) {
        Ok(bytes) => with_content_type(status, Bytes::from(bytes), "application/json"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize response body");
            with_content_type(
                StatusCode::INTERNAL_SERVER_ERROR,
                Bytes::from_static(br#"{"error":"Internal Server Error"}"#),
                "application/json",
            )
        }
    }
}

/// Response with a body and an explicit content type
pub fn with_content_type(
    status: StatusCode,
    body: Bytes,
    content_type: &'static str,
) -> HttpResponse {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Response with no body
pub fn empty(status: StatusCode) -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

/// Dispatch a request to its handler
pub async fn route<B>(state: Arc<AppState>, req: Request<B>) -> HttpResponse
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + Send + 'static,
{
    let route = match RouteParser::parse(req.method(), req.uri().path()) {
        Ok(route) => route,
        Err(err) => return ApiError::from(err).into_response(),
    };

    let result = match route {
        Route::Upload => upload::upload(&state, req).await,
        Route::ListVideos => videos::list_videos(&state).await,
        Route::GetVideo { id } => videos::get_video(&state, &id).await,
        Route::Health => Ok(system::health()),
        Route::Crash => system::crash(&state, req.extensions()),
        Route::Metrics => system::metrics(&state),
    };

    result.unwrap_or_else(ApiError::into_response)
}
