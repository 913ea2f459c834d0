//! Structured process logging
//!
//! One global `tracing` subscriber per process, writing either JSON lines
//! (orchestrated deployments) or colorized console output (local development).
//! Every line carries the `service` and `host` process fields.
//!
//! # Example
//!
//! ```no_run
//! use video_upload_service::config::LoggingConfig;
//! use video_upload_service::logging::{self, Severity};
//! use video_upload_service::log;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! logging::init(&LoggingConfig::default())?;
//! log!(Severity::Info, "Bucket created", bucket = "videos");
//! # Ok(())
//! # }
//! ```

#[cfg(test)]
pub(crate) mod capture;
mod event;
mod init;

pub use event::{flush_and_exit, Severity};
pub use init::{
    init, parse_level, process_fields, resolve_format, service_span, LoggingError, ProcessFields,
};

#[doc(hidden)]
pub use tracing as __tracing;
