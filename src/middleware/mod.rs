//! Request correlation middleware
//!
//! Every request gets a fresh correlation id, a request span carrying that id
//! together with method, path and client address, and an `X-Correlation-ID`
//! response header. Once the handler finishes (or panics, see [`recovery`]) a
//! single summary line is emitted: info below 400, error otherwise.
//!
//! Handlers reach the context through the request's extensions with
//! [`get_logger`] and [`get_correlation_id`], both of which always return a
//! usable value.

pub mod recovery;

use crate::handlers::HttpResponse;
use crate::logging;
use crate::metrics;
use futures::FutureExt;
use hyper::body::Body;
use hyper::header::{HeaderName, HeaderValue};
use hyper::http::Extensions;
use hyper::Request;
use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tracing::{Instrument, Level, Span};

/// Response header carrying the correlation id
pub const CORRELATION_HEADER: HeaderName = HeaderName::from_static("x-correlation-id");

/// Returned by [`get_correlation_id`] when no context is bound
pub const UNKNOWN_CORRELATION_ID: &str = "unknown";

/// Per-request correlation state, stored in the request's extensions
#[derive(Debug, Clone)]
pub struct CorrelationContext {
    correlation_id: String,
    logger: Span,
    started_at: Instant,
}

impl CorrelationContext {
    /// Create the context for an incoming request
    pub fn new<B>(req: &Request<B>, peer: Option<SocketAddr>) -> Self {
        let correlation_id = uuid::Uuid::new_v4().to_string();
        let client_ip = client_ip(req, peer);
        let process = logging::process_fields();

        // Created at ERROR so the context survives any configured level.
        let logger = tracing::span!(
            parent: None,
            Level::ERROR,
            "request",
            service = %process.service,
            host = %process.host,
            correlation_id = %correlation_id,
            method = %req.method(),
            path = %req.uri().path(),
            client_ip = %client_ip,
        );

        Self {
            correlation_id,
            logger,
            started_at: Instant::now(),
        }
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Request-scoped logger
    pub fn logger(&self) -> &Span {
        &self.logger
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Request-scoped logger if bound, the process-wide logger otherwise
pub fn get_logger(extensions: &Extensions) -> Span {
    extensions
        .get::<CorrelationContext>()
        .map(|ctx| ctx.logger.clone())
        .unwrap_or_else(|| logging::service_span().clone())
}

/// Bound correlation id, or `"unknown"`
pub fn get_correlation_id(extensions: &Extensions) -> String {
    extensions
        .get::<CorrelationContext>()
        .map(|ctx| ctx.correlation_id.clone())
        .unwrap_or_else(|| UNKNOWN_CORRELATION_ID.to_string())
}

/// Client address: first `X-Forwarded-For` hop, then `X-Real-IP`, then the peer
pub fn client_ip<B>(req: &Request<B>, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(forwarded) = header("x-forwarded-for") {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return first.to_string();
        }
    }

    if let Some(real_ip) = header("x-real-ip") {
        return real_ip.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Run `next` inside a correlation context
///
/// Binds the context, instruments the handler future with the request span,
/// recovers from panics, stamps the response header and logs the summary.
pub async fn track<B, F, Fut>(
    mut req: Request<B>,
    peer: Option<SocketAddr>,
    next: F,
) -> HttpResponse
where
    F: FnOnce(Request<B>) -> Fut,
    Fut: Future<Output = HttpResponse>,
{
    let ctx = CorrelationContext::new(&req, peer);
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    req.extensions_mut().insert(ctx.clone());

    let span = ctx.logger().clone();
    let outcome = AssertUnwindSafe(next(req))
        .catch_unwind()
        .instrument(span.clone())
        .await;

    let mut response = match outcome {
        Ok(response) => response,
        Err(panic) => span.in_scope(|| recovery::handle_panic(panic)),
    };

    if let Ok(value) = HeaderValue::from_str(ctx.correlation_id()) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }

    let duration = ctx.elapsed();
    let status = response.status().as_u16();
    let size = response.body().size_hint().exact().unwrap_or(0);
    let duration_ms = duration.as_secs_f64() * 1000.0;

    span.in_scope(|| {
        if status >= 400 {
            tracing::error!(
                status_code = status,
                duration_ms,
                size,
                "{} {} - {} ({:?})",
                method,
                path,
                status,
                duration
            );
        } else {
            tracing::info!(
                status_code = status,
                duration_ms,
                size,
                "{} {} - {} ({:?})",
                method,
                path,
                status,
                duration
            );
        }
    });

    metrics::record_request(&method, status, duration.as_secs_f64());
    response
}
