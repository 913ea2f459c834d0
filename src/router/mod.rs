//! API Router
//!
//! Maps a method and path onto one of the service's routes.

use hyper::Method;
use thiserror::Error;

/// Router errors
#[derive(Error, Debug, PartialEq)]
pub enum RouterError {
    #[error("Not Found")]
    NotFound(String),

    #[error("Method {method} not allowed for {path}")]
    MethodNotAllowed { method: String, path: String },
}

/// Service routes
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// POST /upload
    Upload,
    /// GET /videos
    ListVideos,
    /// GET /video/{id}; the raw segment, parsed by the handler
    GetVideo { id: String },
    /// GET /health
    Health,
    /// GET /crash
    Crash,
    /// GET /metrics
    Metrics,
}

/// Request parser
pub struct RouteParser;

impl RouteParser {
    /// Parse an HTTP method and path into a route
    pub fn parse(method: &Method, path: &str) -> Result<Route, RouterError> {
        let trimmed = match path.trim_end_matches('/') {
            "" => "/",
            p => p,
        };

        let (route, allowed) = match trimmed {
            "/upload" => (Route::Upload, Method::POST),
            "/videos" => (Route::ListVideos, Method::GET),
            "/health" => (Route::Health, Method::GET),
            "/crash" => (Route::Crash, Method::GET),
            "/metrics" => (Route::Metrics, Method::GET),
            other => match other.strip_prefix("/video/") {
                Some(id) if !id.is_empty() && !id.contains('/') => (
                    Route::GetVideo { id: id.to_string() },
                    Method::GET,
                ),
                _ => return Err(RouterError::NotFound(path.to_string())),
            },
        };

        if *method == allowed {
            Ok(route)
        } else {
            Err(RouterError::MethodNotAllowed {
                method: method.to_string(),
                path: path.to_string(),
            })
        }
    }
}
