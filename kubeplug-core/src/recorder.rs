//! Recorder that forwards controller log lines to `tracing`

use kubeplug_api::{LogLevel, Recorder};

/// Emits each controller log line as a `tracing` event with a `controller` field
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRecorder;

impl Recorder for TracingRecorder {
    fn record(&self, controller: &str, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(controller = %controller, "{}", message),
            LogLevel::Info => tracing::info!(controller = %controller, "{}", message),
            LogLevel::Warn => tracing::warn!(controller = %controller, "{}", message),
            LogLevel::Error => tracing::error!(controller = %controller, "{}", message),
        }
    }
}
