//! Log sink capability
//!
//! The connector writes a handful of plain lifecycle lines to a sink. An
//! application that does not care passes nothing and gets [`NoopSink`].

use std::fmt;
use tracing::info;

/// Receives one line of text per logged lifecycle transition
pub trait LogSink: Send + Sync {
    fn log(&self, message: &str);
}

/// Discards every line
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl LogSink for NoopSink {
    fn log(&self, _message: &str) {}
}

/// Forwards lines to `tracing` at INFO level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, message: &str) {
        info!(target: "docbridge_db::connector", "{}", message);
    }
}

impl<F> LogSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn log(&self, message: &str) {
        self(message)
    }
}

impl fmt::Debug for dyn LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LogSink")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_closure_sink_receives_lines() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let captured = lines.clone();
        let sink = move |message: &str| captured.lock().unwrap().push(message.to_string());

        sink.log("Connection to database ready");
        LogSink::log(&NoopSink, "dropped");

        assert_eq!(
            *lines.lock().unwrap(),
            vec!["Connection to database ready".to_string()]
        );
    }
}
