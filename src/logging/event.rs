//! Severity-selected events
//!
//! [`log!`](crate::log) and [`fatal!`](crate::fatal) pick the level at run
//! time and hand their fields to the `tracing` macros unchanged, so each key
//! is a field of its own in the JSON sink and keeps its type. Plain values
//! keep their native encoding (integers, floats, booleans, strings); `%value`
//! renders through `Display`, which is how errors are logged, and `?value`
//! through `Debug` for everything else.
//!
//! Events are parented to the process span and carry `service` and `host`.
//!
//! ```no_run
//! use video_upload_service::logging::Severity;
//! use video_upload_service::log;
//!
//! let bucket = "videos";
//! log!(Severity::Info, "Bucket created successfully", bucket = %bucket, ssl = false);
//! ```

use std::io::Write;

/// Log severity, including the terminal `Fatal`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
    /// Error level, tagged `severity="fatal"`
    Fatal,
}

/// Emit one event at a run-time [`Severity`]
///
/// `log!(severity, message)` or `log!(severity, message, key = value, ...)`
/// with the field syntax of the `tracing` macros, without a trailing comma
/// after the last field. `Severity::Fatal` logs but does not exit; use
/// [`fatal!`](crate::fatal) for that.
#[macro_export]
macro_rules! log {
    (@emit $severity:expr, $message:expr, [$($fields:tt)*]) => {{
        let parent = $crate::logging::service_span();
        match $severity {
            $crate::logging::Severity::Debug => $crate::logging::__tracing::debug!(
                parent: parent, $($fields)* "{}", $message
            ),
            $crate::logging::Severity::Info => $crate::logging::__tracing::info!(
                parent: parent, $($fields)* "{}", $message
            ),
            $crate::logging::Severity::Warn => $crate::logging::__tracing::warn!(
                parent: parent, $($fields)* "{}", $message
            ),
            $crate::logging::Severity::Error => $crate::logging::__tracing::error!(
                parent: parent, $($fields)* "{}", $message
            ),
            $crate::logging::Severity::Fatal => $crate::logging::__tracing::error!(
                parent: parent, severity = "fatal", $($fields)* "{}", $message
            ),
        }
    }};
    ($severity:expr, $message:expr $(,)?) => {
        $crate::log!(@emit $severity, $message, [])
    };
    ($severity:expr, $message:expr, $($fields:tt)+) => {
        $crate::log!(@emit $severity, $message, [$($fields)+ ,])
    };
}

/// Log at fatal severity, flush stdout and exit with status 1
///
/// Same arguments as [`log!`](crate::log) without the severity; the cause goes
/// in an `error = %err` field. Evaluates to `!`.
#[macro_export]
macro_rules! fatal {
    ($($args:tt)+) => {{
        $crate::log!($crate::logging::Severity::Fatal, $($args)+);
        $crate::logging::flush_and_exit()
    }};
}

/// Flush stdout and terminate the process with status 1
pub fn flush_and_exit() -> ! {
    let _ = std::io::stdout().flush();
    std::process::exit(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::capture::Capture;

    #[derive(Debug)]
    struct Opaque {
        _inner: u8,
    }

    #[test]
    fn test_fields_keep_their_types() {
        let capture = Capture::default();
        tracing::subscriber::with_default(capture.subscriber(), || {
            crate::log!(
                Severity::Info,
                "bucket ready",
                bucket = "videos",
                count = 3,
                ratio = 0.5,
                ssl = false
            );
        });

        let line = capture.find("bucket ready").expect("line emitted");
        assert_eq!(line["level"], "INFO");
        assert_eq!(line["bucket"], "videos");
        assert_eq!(line["count"], 3);
        assert!(line["count"].is_number());
        assert_eq!(line["ratio"], 0.5);
        assert_eq!(line["ssl"], false);
        assert!(line.get("fields").is_none());
    }

    #[test]
    fn test_errors_and_opaque_values() {
        let capture = Capture::default();
        let err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let opaque = Opaque { _inner: 7 };

        tracing::subscriber::with_default(capture.subscriber(), || {
            crate::log!(Severity::Warn, "odd values", error = %err, value = ?opaque);
        });

        let line = capture.find("odd values").unwrap();
        assert_eq!(line["level"], "WARN");
        assert_eq!(line["error"], "disk full");
        assert_eq!(line["value"], "Opaque { _inner: 7 }");
    }

    #[test]
    fn test_fatal_severity_is_tagged_error() {
        let capture = Capture::default();
        tracing::subscriber::with_default(capture.subscriber(), || {
            crate::log!(Severity::Fatal, "not exiting", correlation_id = "abc");
            crate::log!(Severity::Debug, "no fields");
        });

        let line = capture.find("not exiting").unwrap();
        assert_eq!(line["level"], "ERROR");
        assert_eq!(line["severity"], "fatal");
        assert_eq!(line["correlation_id"], "abc");

        let line = capture.find("no fields").unwrap();
        assert_eq!(line["level"], "DEBUG");
    }

    #[test]
    fn test_log_without_subscriber_does_not_panic() {
        crate::log!(Severity::Info, "hello", k = "v");
        crate::log!(Severity::Fatal, "not exiting");
    }
}
