//! ReconcileContext - a controller's view of the host during one reconcile

use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

/// Severity of a controller log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

// ─── Recorder Trait ──────────────────────────────────────────────────

/// Sink for controller log output.
///
/// A controller compiled as a separate dynamic library carries its own copy of
/// any logging globals, so a subscriber installed by the host never sees them.
/// Controllers log through the context instead, and the host decides where the
/// lines go.
pub trait Recorder: Send + Sync {
    fn record(&self, controller: &str, level: LogLevel, message: &str);
}

/// Recorder that keeps every line in memory. Intended for tests.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    lines: Mutex<Vec<RecordedLine>>,
}

/// One captured log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedLine {
    pub controller: String,
    pub level: LogLevel,
    pub message: String,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// All lines recorded so far
    pub fn lines(&self) -> Vec<RecordedLine> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Recorder for MemoryRecorder {
    fn record(&self, controller: &str, level: LogLevel, message: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedLine {
                controller: controller.to_string(),
                level,
                message: message.to_string(),
            });
    }
}

/// Recorder that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRecorder;

impl Recorder for NullRecorder {
    fn record(&self, _controller: &str, _level: LogLevel, _message: &str) {}
}

// ─── ReconcileContext ────────────────────────────────────────────────

/// Passed to [`Controller::reconcile`](crate::Controller::reconcile).
///
/// Provides:
/// - The registered controller name
/// - The attempt number (0 on the first try, counts consecutive failures)
/// - A cancellation token that fires when the host shuts down
/// - Logging routed through the host's [`Recorder`]
#[derive(Clone)]
pub struct ReconcileContext {
    controller: String,
    attempt: u32,
    cancellation: CancellationToken,
    recorder: Arc<dyn Recorder>,
}

impl ReconcileContext {
    /// Create a context for `controller` logging to `recorder`
    pub fn new(controller: impl Into<String>, recorder: Arc<dyn Recorder>) -> Self {
        Self {
            controller: controller.into(),
            attempt: 0,
            cancellation: CancellationToken::new(),
            recorder,
        }
    }

    /// Builder: set the retry attempt number
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    /// Builder: set the cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn controller(&self) -> &str {
        &self.controller
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Whether the host has asked in-flight work to stop
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    // ─── Logging ─────────────────────────────────────────────────────

    pub fn log_info(&self, message: &str) {
        self.recorder.record(&self.controller, LogLevel::Info, message);
    }

    pub fn log_warn(&self, message: &str) {
        self.recorder.record(&self.controller, LogLevel::Warn, message);
    }

    pub fn log_error(&self, message: &str) {
        self.recorder.record(&self.controller, LogLevel::Error, message);
    }

    pub fn log_debug(&self, message: &str) {
        self.recorder.record(&self.controller, LogLevel::Debug, message);
    }
}

impl std::fmt::Debug for ReconcileContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcileContext")
            .field("controller", &self.controller)
            .field("attempt", &self.attempt)
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish()
    }
}
