use pitch_core::expressions::ExpressionError;

use crate::context::Phase;
use crate::executor::http::HttpError;
use crate::plugins::PluginError;

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("unknown plugin(s): {}", .0.join(", "))]
    UnknownPlugin(Vec<String>),
    #[error("invalid plugin phase: {0}")]
    InvalidPluginPhase(String),
    #[error("expression error: {0}")]
    Expression(#[from] ExpressionError),
    #[error("plugin '{name}' ({phase}) failed: {source}")]
    Plugin {
        name: String,
        phase: Phase,
        #[source]
        source: PluginError,
    },
    /// A plugin asked to abort the whole run.
    #[error("execution stopped: {0}")]
    Stopped(String),
    #[error("{keyword} produced more than {limit} items")]
    LoopTooLarge { keyword: &'static str, limit: usize },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("transport unavailable: {0}")]
    Transport(#[from] HttpError),
    #[error("step not found: {0}")]
    StepNotFound(usize),
    #[error("run cancelled")]
    Cancelled,
    #[error("task join error: {0}")]
    Task(String),
}

impl ExecutionError {
    /// Errors that are detected before any request is sent.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ExecutionError::UnknownPlugin(_) | ExecutionError::InvalidPluginPhase(_))
    }
}

/// Counters of one finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub steps_started: usize,
    /// Iterations whose `when` was false.
    pub iterations_skipped: usize,
    pub requests_sent: usize,
    pub transport_failures: usize,
}

impl RunSummary {
    pub fn record_step(&mut self) {
        self.steps_started += 1;
    }

    pub fn record_skip(&mut self) {
        self.iterations_skipped += 1;
    }

    pub fn record_request(&mut self, delivered: bool) {
        self.requests_sent += 1;
        if !delivered {
            self.transport_failures += 1;
        }
    }
}
