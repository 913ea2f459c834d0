//! Subscriber initialization and in-place reconfiguration
//!
//! The process subscriber is a registry with two reloadable layers:
//!
//! ```text
//! Registry
//!   ├── LevelFilter (reloadable)
//!   └── Fmt layer, JSON or console (reloadable)
//! ```
//!
//! The first call to [`init`] installs it as the global default. Later calls
//! swap the level and the sink through the stored reload handles, so there is
//! always exactly one global logger.

use crate::config::{LogFormat, LoggingConfig};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing::{Span, Subscriber};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, Layer, Registry};

/// Errors that can occur while installing the subscriber
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Failed to install global subscriber: {0}")]
    InstallError(String),

    #[error("Failed to reload subscriber: {0}")]
    ReloadError(#[from] reload::Error),
}

type LevelLayer = reload::Layer<LevelFilter, Registry>;
type Inner = Layered<LevelLayer, Registry>;
type SinkLayer = Box<dyn Layer<Inner> + Send + Sync + 'static>;

struct Handles {
    level: reload::Handle<LevelFilter, Registry>,
    sink: reload::Handle<SinkLayer, Inner>,
}

static HANDLES: OnceLock<Handles> = OnceLock::new();
static SERVICE_SPAN: OnceLock<Span> = OnceLock::new();
static PROCESS_FIELDS: OnceLock<ProcessFields> = OnceLock::new();

/// Fields attached to every log line of this process
#[derive(Debug, Clone)]
pub struct ProcessFields {
    pub service: String,
    pub host: String,
}

/// Parse a level name, falling back to `info` for anything unrecognized
///
/// `fatal` and `panic` map to the error level.
pub fn parse_level(level: &str) -> LevelFilter {
    match level.trim().to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" | "warning" => LevelFilter::WARN,
        "error" | "fatal" | "panic" => LevelFilter::ERROR,
        "off" | "disabled" => LevelFilter::OFF,
        _ => LevelFilter::INFO,
    }
}

/// Decide the concrete sink for a configured format
///
/// `Auto` becomes JSON when running inside Kubernetes.
pub fn resolve_format(format: LogFormat, in_kubernetes: bool) -> LogFormat {
    match format {
        LogFormat::Auto if in_kubernetes => LogFormat::Json,
        LogFormat::Auto => LogFormat::Pretty,
        other => other,
    }
}

fn running_in_kubernetes() -> bool {
    std::env::var_os("KUBERNETES_SERVICE_HOST").is_some_and(|v| !v.is_empty())
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// JSON lines: event fields flattened next to `message`, the innermost span's
/// fields under `span`
pub(crate) fn json_layer<S, W>(writer: W) -> impl Layer<S> + Send + Sync
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .flatten_event(true)
        .with_current_span(true)
        .with_span_list(false)
        .with_target(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(writer)
}

fn build_sink(format: LogFormat) -> SinkLayer {
    match format {
        LogFormat::Json => json_layer(std::io::stdout).boxed(),
        _ => tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(false)
            .with_timer(ChronoUtc::rfc_3339())
            .with_writer(std::io::stdout)
            .boxed(),
    }
}

/// Initialize (or re-initialize) the process logger
///
/// # Returns
///
/// The effective level after fallback.
pub fn init(config: &LoggingConfig) -> Result<LevelFilter, LoggingError> {
    let level = parse_level(&config.level);
    let format = resolve_format(config.format, running_in_kubernetes());

    match HANDLES.get() {
        Some(handles) => {
            handles.level.reload(level)?;
            handles.sink.reload(build_sink(format))?;
        }
        None => {
            let (level_layer, level_handle) = reload::Layer::new(level);
            let (sink_layer, sink_handle) = reload::Layer::new(build_sink(format));

            tracing_subscriber::registry()
                .with(level_layer)
                .with(sink_layer)
                .try_init()
                .map_err(|e| LoggingError::InstallError(e.to_string()))?;

            // A concurrent first init loses the race in try_init above.
            let _ = HANDLES.set(Handles {
                level: level_handle,
                sink: sink_handle,
            });
        }
    }

    let fields = PROCESS_FIELDS.get_or_init(|| ProcessFields {
        service: config.service_name.clone(),
        host: local_hostname(),
    });
    // ERROR so the span is enabled whatever the level filter says.
    SERVICE_SPAN.get_or_init(|| {
        tracing::error_span!("service", service = %fields.service, host = %fields.host)
    });

    announce(level, format);
    Ok(level)
}

fn announce(level: LevelFilter, format: LogFormat) {
    tracing::info!(
        parent: service_span(),
        log_level = %level,
        log_format = ?format,
        "Logger initialized"
    );
}

/// Process-wide fields (`service`, `host`)
///
/// Before [`init`] has run these are the defaults.
pub fn process_fields() -> ProcessFields {
    PROCESS_FIELDS.get().cloned().unwrap_or_else(|| ProcessFields {
        service: LoggingConfig::default().service_name,
        host: local_hostname(),
    })
}

/// The process-wide logger: a span carrying the process fields
///
/// Events emitted inside it render with `service` and `host`. Before [`init`]
/// this is a disabled span and events fall through to whatever subscriber is
/// installed.
pub fn service_span() -> &'static Span {
    static NONE: OnceLock<Span> = OnceLock::new();
    SERVICE_SPAN
        .get()
        .unwrap_or_else(|| NONE.get_or_init(Span::none))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::capture::Capture;

    #[test]
    fn test_parse_level_known_values() {
        assert_eq!(parse_level("debug"), LevelFilter::DEBUG);
        assert_eq!(parse_level("WARN"), LevelFilter::WARN);
        assert_eq!(parse_level("fatal"), LevelFilter::ERROR);
    }

    #[test]
    fn test_parse_level_falls_back_to_info() {
        assert_eq!(parse_level(""), LevelFilter::INFO);
        assert_eq!(parse_level("verbose"), LevelFilter::INFO);
    }

    #[test]
    fn test_resolve_format() {
        assert_eq!(resolve_format(LogFormat::Auto, true), LogFormat::Json);
        assert_eq!(resolve_format(LogFormat::Auto, false), LogFormat::Pretty);
        assert_eq!(resolve_format(LogFormat::Json, false), LogFormat::Json);
        assert_eq!(resolve_format(LogFormat::Pretty, true), LogFormat::Pretty);
    }

    #[test]
    fn test_announcement_does_not_shadow_level() {
        let capture = Capture::default();
        tracing::subscriber::with_default(capture.subscriber(), || {
            announce(LevelFilter::DEBUG, LogFormat::Json);
        });

        let raw = capture.text();
        assert_eq!(raw.matches("\"level\":").count(), 1, "{}", raw);

        let line = capture.find("Logger initialized").unwrap();
        assert_eq!(line["level"], "INFO");
        assert_eq!(line["log_level"], "debug");
        assert_eq!(line["log_format"], "Json");
    }

    #[test]
    #[serial_test::serial]
    fn test_init_twice_reloads() {
        let mut config = LoggingConfig::default();
        // Another test may have installed a different subscriber already
        if init(&config).is_err() {
            return;
        }
        config.level = "nonsense".into();
        config.format = LogFormat::Json;
        assert_eq!(init(&config).unwrap(), LevelFilter::INFO);
    }
}
