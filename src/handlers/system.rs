//! Operational endpoints: health, crash self-test, metrics

use super::{json_response, with_content_type, ApiError, AppState, HttpResponse};
use bytes::Bytes;
use hyper::http::Extensions;
use hyper::StatusCode;
use serde::Serialize;

#[derive(Serialize)]
struct HealthStatus {
    status: &'static str,
}

/// Handle `GET /health`
pub fn health() -> HttpResponse {
    tracing::info!("Health check requested");
    json_response(StatusCode::OK, &HealthStatus { status: "healthy" })
}

#[cfg(feature = "fault-injection")]
#[derive(Serialize)]
struct CrashNotice<'a> {
    message: String,
    pod: String,
    correlation_id: &'a str,
}

/// Handle `GET /crash`
///
/// Responds immediately and arms the crash switch, which terminates the
/// process once its delay has passed.
#[cfg(feature = "fault-injection")]
pub fn crash(state: &AppState, extensions: &Extensions) -> Result<HttpResponse, ApiError> {
    use crate::middleware::{get_correlation_id, get_logger};

    let correlation_id = get_correlation_id(extensions);
    let delay = state.crash.delay();

    tracing::warn!(
        delay_ms = delay.as_millis() as u64,
        "Crash endpoint called - application will terminate in {:?}",
        delay
    );

    let response = json_response(
        StatusCode::OK,
        &CrashNotice {
            message: format!(
                "Application will crash in {:?} to simulate failure",
                delay
            ),
            pod: std::env::var("HOSTNAME").unwrap_or_default(),
            correlation_id: &correlation_id,
        },
    );

    state.crash.trigger(correlation_id.clone(), get_logger(extensions));
    Ok(response)
}

/// `GET /crash` without fault injection compiled in
#[cfg(not(feature = "fault-injection"))]
pub fn crash(_state: &AppState, _extensions: &Extensions) -> Result<HttpResponse, ApiError> {
    Err(ApiError::RouteNotFound)
}

/// Handle `GET /metrics`
pub fn metrics(state: &AppState) -> Result<HttpResponse, ApiError> {
    if !state.metrics_enabled {
        return Err(ApiError::RouteNotFound);
    }

    let text = crate::metrics::render().map_err(|e| {
        tracing::error!(error = %e, "Failed to render metrics");
        ApiError::Internal(e.to_string())
    })?;

    Ok(with_content_type(
        StatusCode::OK,
        Bytes::from(text),
        "text/plain; version=0.0.4",
    ))
}
