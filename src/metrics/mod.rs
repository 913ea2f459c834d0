//! Metrics module
//!
//! Prometheus counters and histograms for requests, uploads and download-link
//! generation, rendered on `GET /metrics`.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    // Request metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "video_http_requests_total",
        "Total number of HTTP requests",
        &["method", "status"]
    ).unwrap();

    pub static ref HTTP_REQUEST_DURATION: HistogramVec = register_histogram_vec!(
        "video_http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]
    ).unwrap();

    // Upload metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "video_uploads_total",
        "Total number of uploads by outcome",
        &["status"]
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "video_upload_bytes_total",
        "Total bytes written to object storage"
    ).unwrap();

    // Download link metrics
    pub static ref PRESIGN_FAILURES_TOTAL: Counter = register_counter!(
        "video_presign_failures_total",
        "Download links that could not be generated"
    ).unwrap();
}

/// Label for a request method; anything outside the standard set is `OTHER`
pub fn method_label(method: &str) -> &'static str {
    match method {
        "GET" => "GET",
        "HEAD" => "HEAD",
        "POST" => "POST",
        "PUT" => "PUT",
        "DELETE" => "DELETE",
        "CONNECT" => "CONNECT",
        "OPTIONS" => "OPTIONS",
        "TRACE" => "TRACE",
        "PATCH" => "PATCH",
        _ => "OTHER",
    }
}

/// Record a completed HTTP request
pub fn record_request(method: &str, status: u16, duration_secs: f64) {
    let method = method_label(method);
    let status = status.to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, status.as_str()])
        .inc();
    HTTP_REQUEST_DURATION
        .with_label_values(&[method])
        .observe(duration_secs);
}

/// Record a successful upload
pub fn record_upload_success(bytes: u64) {
    UPLOADS_TOTAL.with_label_values(&["success"]).inc();
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a failed upload; `stage` is `validation`, `buffer`, `storage` or `database`
pub fn record_upload_failure(stage: &str) {
    UPLOADS_TOTAL.with_label_values(&[stage]).inc();
}

/// Record a download link that could not be generated
pub fn record_presign_failure() {
    PRESIGN_FAILURES_TOTAL.inc();
}

/// Render all registered metrics in the Prometheus text format
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_request() {
        record_request("GET", 200, 0.002);
        // Just verify it doesn't panic
    }

    #[test]
    fn test_method_label_bounds_cardinality() {
        assert_eq!(method_label("GET"), "GET");
        assert_eq!(method_label("PATCH"), "PATCH");
        assert_eq!(method_label("FOO"), "OTHER");
        assert_eq!(method_label("get"), "OTHER");
    }

    #[test]
    fn test_unknown_method_recorded_as_other() {
        record_request("BREW", 405, 0.001);
        record_request("PROPFIND", 405, 0.001);

        let text = render().unwrap();
        assert!(text.contains("method=\"OTHER\""));
        assert!(!text.contains("method=\"BREW\""));
        assert!(!text.contains("method=\"PROPFIND\""));
    }

    #[test]
    fn test_render_contains_recorded_upload() {
        record_upload_success(10);
        record_upload_failure("storage");

        let text = render().unwrap();
        assert!(text.contains("video_uploads_total"));
        assert!(text.contains("video_upload_bytes_total"));
    }
}
