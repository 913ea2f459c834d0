//! JSON log capture for tests
//!
//! Same sink as production JSON output, written into a shared buffer.

use super::init::json_layer;
use serde_json::Value;
use std::io;
use std::sync::{Arc, Mutex};
use tracing::Subscriber;
use tracing_subscriber::layer::SubscriberExt;

#[derive(Clone, Default)]
pub(crate) struct Capture(Arc<Mutex<Vec<u8>>>);

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Capture {
    /// Subscriber writing every event, at any level, into this buffer
    pub(crate) fn subscriber(&self) -> impl Subscriber + Send + Sync + 'static {
        let writer = self.clone();
        tracing_subscriber::registry().with(json_layer(move || writer.clone()))
    }

    pub(crate) fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    pub(crate) fn lines(&self) -> Vec<Value> {
        self.text()
            .lines()
            .map(|line| serde_json::from_str(line).expect("JSON log line"))
            .collect()
    }

    /// First line whose message is `message`
    pub(crate) fn find(&self, message: &str) -> Option<Value> {
        self.lines().into_iter().find(|line| line["message"] == message)
    }

    /// First line whose message starts with `prefix`
    pub(crate) fn find_prefix(&self, prefix: &str) -> Option<Value> {
        self.lines().into_iter().find(|line| {
            line["message"]
                .as_str()
                .is_some_and(|message| message.starts_with(prefix))
        })
    }
}
