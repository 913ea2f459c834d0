//! `GET /videos` and `GET /video/{id}`
//!
//! Rows store a [`StorageReference`]; clients only ever see a presigned link.

use super::{json_response, ApiError, AppState, HttpResponse};
use crate::db::VideoRecord;
use crate::metrics;
use crate::storage::{StorageError, StorageReference};
use futures::future::join_all;
use hyper::StatusCode;

/// Presigned GET link for a stored reference
async fn download_url(state: &AppState, stored: &str) -> Result<String, StorageError> {
    let reference = StorageReference::parse(stored)?;
    state
        .objects
        .presigned_get_url(&reference.bucket, &reference.key, state.presign_expiry)
        .await
}

/// Swap the row's reference for a download link, keeping the reference on failure
async fn with_download_url(state: &AppState, mut record: VideoRecord) -> VideoRecord {
    match download_url(state, &record.url).await {
        Ok(url) => record.url = url,
        Err(e) => {
            tracing::warn!(
                error = %e,
                video_id = record.id,
                url = %record.url,
                "Failed to generate download URL, returning stored reference"
            );
            metrics::record_presign_failure();
        }
    }
    record
}

/// Handle `GET /videos`
pub async fn list_videos(state: &AppState) -> Result<HttpResponse, ApiError> {
    tracing::info!("Listing all videos");

    let rows = state.videos.list().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to query videos");
        ApiError::Persistence(e.to_string())
    })?;

    let videos = join_all(rows.into_iter().map(|row| with_download_url(state, row))).await;

    tracing::info!(count = videos.len(), "Videos retrieved successfully");
    Ok(json_response(StatusCode::OK, &videos))
}

/// Handle `GET /video/{id}`
pub async fn get_video(state: &AppState, raw_id: &str) -> Result<HttpResponse, ApiError> {
    tracing::info!(video_id = %raw_id, "Getting video by ID");

    // A non-numeric id cannot match any row.
    let Ok(id) = raw_id.parse::<i64>() else {
        tracing::warn!(video_id = %raw_id, "Video not found");
        return Err(ApiError::NotFound);
    };

    let mut record = match state.videos.get(id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            tracing::warn!(video_id = id, "Video not found");
            return Err(ApiError::NotFound);
        }
        Err(e) => {
            tracing::error!(error = %e, video_id = id, "Failed to query video");
            return Err(ApiError::Persistence(e.to_string()));
        }
    };

    let url = download_url(state, &record.url).await.map_err(|e| match e {
        StorageError::MalformedReference(_) => {
            tracing::error!(video_id = id, url = %record.url, "Invalid storage reference");
            ApiError::MalformedReference
        }
        other => {
            tracing::error!(error = %other, video_id = id, "Failed to generate presigned URL");
            metrics::record_presign_failure();
            ApiError::PresignFailed
        }
    })?;
    record.url = url;

    tracing::info!(
        video_id = id,
        name = %record.name,
        "Video retrieved successfully with presigned URL"
    );
    Ok(json_response(StatusCode::OK, &record))
}
