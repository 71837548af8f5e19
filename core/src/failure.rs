//! Failure records and the optional logging collaborators.

use cofacade_engine::panic::panic_message;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;

/// A failure raised by caller-supplied work. Transient: it is rendered,
/// handed to the logger and dropped.
#[derive(Debug, Error)]
pub enum WorkFailure {
    /// Work returned an error. Displays with its full cause chain.
    #[error("{0:#}")]
    Error(anyhow::Error),
    #[error("panicked: {0}")]
    Panic(String),
}

impl WorkFailure {
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        Self::Panic(panic_message(payload))
    }
}

/// Destination for failure reports.
pub trait Logger: Send + Sync {
    fn warning(&self, message: &str);
}

/// Renders a failure before it is logged.
pub trait FailureFormatter: Send + Sync {
    fn format(&self, failure: &WorkFailure) -> String;
}

/// Logs through `tracing` at WARN.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn warning(&self, message: &str) {
        tracing::warn!(target: "cofacade::coroutine", "{message}");
    }
}

/// One line for the failure, then one `Caused by:` line per source.
#[derive(Debug, Default, Clone, Copy)]
pub struct CauseChainFormatter;

impl FailureFormatter for CauseChainFormatter {
    fn format(&self, failure: &WorkFailure) -> String {
        match failure {
            WorkFailure::Error(err) => {
                let mut out = err.to_string();
                for cause in err.chain().skip(1) {
                    out.push_str(&format!("\nCaused by: {cause}"));
                }
                out
            }
            WorkFailure::Panic(message) => format!("panicked: {message}"),
        }
    }
}

/// Routes work failures to an optional logger, optionally through a
/// formatter. Without a logger every failure is discarded silently.
///
/// Reporting never unwinds: a panicking formatter falls back to the raw
/// failure text and a panicking logger is ignored.
#[derive(Clone, Default)]
pub struct FailureReporter {
    logger: Option<Arc<dyn Logger>>,
    formatter: Option<Arc<dyn FailureFormatter>>,
}

impl FailureReporter {
    pub fn new(
        logger: Option<Arc<dyn Logger>>,
        formatter: Option<Arc<dyn FailureFormatter>>,
    ) -> Self {
        Self { logger, formatter }
    }

    /// Reporter that drops every failure.
    pub fn silent() -> Self {
        Self::default()
    }

    /// [`TracingLogger`] with [`CauseChainFormatter`].
    pub fn tracing() -> Self {
        Self::new(
            Some(Arc::new(TracingLogger)),
            Some(Arc::new(CauseChainFormatter)),
        )
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_formatter(mut self, formatter: Arc<dyn FailureFormatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    pub fn has_logger(&self) -> bool {
        self.logger.is_some()
    }

    pub fn report(&self, failure: &WorkFailure) {
        let Some(logger) = &self.logger else {
            return;
        };

        let message = match &self.formatter {
            Some(formatter) => {
                std::panic::catch_unwind(AssertUnwindSafe(|| formatter.format(failure)))
                    .unwrap_or_else(|_| failure.to_string())
            }
            None => failure.to_string(),
        };

        if std::panic::catch_unwind(AssertUnwindSafe(|| logger.warning(&message))).is_err() {
            tracing::debug!(target: "cofacade::coroutine", "failure logger panicked");
        }
    }
}

impl fmt::Debug for FailureReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureReporter")
            .field("logger", &self.logger.is_some())
            .field("formatter", &self.formatter.is_some())
            .finish()
    }
}
