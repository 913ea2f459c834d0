//! Fault injection
//!
//! `GET /crash` terminates the process after a short delay so orchestrators can
//! exercise their restart path. The termination action is pluggable so it can
//! be observed without exiting.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{Instrument, Span};

const CRASH_MESSAGE: &str = "Application crash triggered by /crash endpoint";

type Terminate = Arc<dyn Fn(&str) + Send + Sync>;

/// Delayed termination armed by `GET /crash`
#[derive(Clone)]
pub struct CrashSwitch {
    delay: Duration,
    terminate: Terminate,
}

impl CrashSwitch {
    /// Run `terminate` with the correlation id once `delay` has passed
    pub fn new<F>(delay: Duration, terminate: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self {
            delay,
            terminate: Arc::new(terminate),
        }
    }

    /// Log at fatal severity and exit the process
    pub fn fatal(delay: Duration) -> Self {
        Self::new(delay, |correlation_id| {
            crate::fatal!(CRASH_MESSAGE, correlation_id = %correlation_id)
        })
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Spawn the delayed termination inside `span`
    pub fn trigger(&self, correlation_id: String, span: Span) -> JoinHandle<()> {
        let delay = self.delay;
        let terminate = Arc::clone(&self.terminate);

        tokio::spawn(
            async move {
                tokio::time::sleep(delay).await;
                terminate(&correlation_id);
            }
            .instrument(span),
        )
    }
}

impl fmt::Debug for CrashSwitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrashSwitch")
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_trigger_waits_for_delay() {
        let fired: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&fired);
        let switch = CrashSwitch::new(Duration::from_millis(50), move |id| {
            *sink.lock().unwrap() = Some(id.to_string());
        });

        let handle = switch.trigger("abc".into(), Span::none());
        assert!(fired.lock().unwrap().is_none());

        handle.await.unwrap();
        assert_eq!(fired.lock().unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn test_fatal_switch_keeps_delay() {
        let switch = CrashSwitch::fatal(Duration::from_secs(2));
        assert_eq!(switch.delay(), Duration::from_secs(2));
    }
}
