//! Panic recovery for request handlers

use crate::handlers::{ApiError, HttpResponse};
use std::any::Any;

/// Log a handler panic and turn it into a 500 response
///
/// The panic detail is logged but never sent to the client.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> HttpResponse {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "no error details".to_owned()
    };

    tracing::error!(panic = %detail, "panic in web handler: {detail}");

    ApiError::Internal(detail).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::StatusCode;

    #[test]
    fn test_handle_panic_with_str() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_handle_panic_with_opaque_payload() {
        let response = handle_panic(Box::new(42u32));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
