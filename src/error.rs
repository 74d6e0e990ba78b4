//! Error types used by the dispatcher and by runners.
//!
//! This module defines two main error enums:
//!
//! - [`DispatchError`]: errors raised by the dispatcher or a runner actor.
//! - [`RunnerError`]: errors raised by individual runner operations.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.
//! A [`DispatchError`] is what ends up inside an [`ErrorEnvelope`](crate::ErrorEnvelope)
//! delivered to the waiting caller.

use std::time::Duration;
use thiserror::Error;

use crate::runners::RunnerId;

/// # Errors produced by the dispatcher.
///
/// These represent failures of the dispatching machinery itself (registration,
/// mailbox delivery, shutdown) as well as runner failures escalated by an actor.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DispatchError {
    /// A registration for this runner id already exists.
    #[error("actor with runner id {runner_id} already exists")]
    AlreadyRegistered {
        /// The colliding runner id.
        runner_id: RunnerId,
    },

    /// The runner reported an empty id.
    #[error("runner id must not be empty")]
    InvalidRunnerId,

    /// The dispatcher is shutting down and no longer accepts runners.
    #[error("dispatcher is shutting down; runner {runner_id} rejected")]
    ShuttingDown {
        /// The rejected runner id.
        runner_id: RunnerId,
    },

    /// The actor mailbox is closed (the actor is gone).
    #[error("mailbox of runner {runner_id} is closed")]
    MailboxClosed {
        /// Runner whose actor could not be reached.
        runner_id: RunnerId,
    },

    /// A runner operation failed inside its actor.
    #[error("runner {runner_id} failed during {op}: {source}")]
    Runner {
        /// Runner that failed.
        runner_id: RunnerId,
        /// Operation name (`start`, `refresh`, `kill`, `close`).
        op: &'static str,
        /// The underlying runner error.
        #[source]
        source: RunnerError,
    },

    /// The actor panicked while processing a message (outside a runner operation).
    #[error("actor of runner {runner_id} panicked: {info}")]
    ActorPanicked {
        /// Runner whose actor panicked.
        runner_id: RunnerId,
        /// Panic payload rendered as text.
        info: String,
    },

    /// The runner panicked while reporting its id or refresh interval.
    #[error("runner panicked during setup: {info}")]
    RunnerSetupPanicked {
        /// Panic payload rendered as text.
        info: String,
    },

    /// Shutdown grace period was exceeded; some actors had not terminated yet.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Runner ids whose actors did not terminate in time.
        stuck: Vec<String>,
    },
}

impl DispatchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use runvisor::DispatchError;
    ///
    /// let err = DispatchError::AlreadyRegistered { runner_id: "r-1".into() };
    /// assert_eq!(err.as_label(), "dispatch_already_registered");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::AlreadyRegistered { .. } => "dispatch_already_registered",
            DispatchError::InvalidRunnerId => "dispatch_invalid_runner_id",
            DispatchError::ShuttingDown { .. } => "dispatch_shutting_down",
            DispatchError::MailboxClosed { .. } => "dispatch_mailbox_closed",
            DispatchError::Runner { .. } => "dispatch_runner_failed",
            DispatchError::ActorPanicked { .. } => "dispatch_actor_panicked",
            DispatchError::RunnerSetupPanicked { .. } => "dispatch_runner_setup_panicked",
            DispatchError::GraceExceeded { .. } => "dispatch_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            DispatchError::AlreadyRegistered { runner_id } => {
                format!("runner {runner_id} is already registered")
            }
            DispatchError::InvalidRunnerId => "empty runner id".to_string(),
            DispatchError::ShuttingDown { runner_id } => {
                format!("runner {runner_id} rejected: shutting down")
            }
            DispatchError::MailboxClosed { runner_id } => {
                format!("runner {runner_id} unreachable: mailbox closed")
            }
            DispatchError::Runner {
                runner_id,
                op,
                source,
            } => format!("runner {runner_id} {op}: {}", source.as_message()),
            DispatchError::ActorPanicked { runner_id, info } => {
                format!("runner {runner_id} actor panic: {info}")
            }
            DispatchError::RunnerSetupPanicked { info } => {
                format!("runner setup panic: {info}")
            }
            DispatchError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck runners={stuck:?}")
            }
        }
    }

    /// Returns the runner id this error refers to, if any.
    pub fn runner_id(&self) -> Option<&RunnerId> {
        match self {
            DispatchError::AlreadyRegistered { runner_id }
            | DispatchError::ShuttingDown { runner_id }
            | DispatchError::MailboxClosed { runner_id }
            | DispatchError::Runner { runner_id, .. }
            | DispatchError::ActorPanicked { runner_id, .. } => Some(runner_id),
            DispatchError::InvalidRunnerId
            | DispatchError::RunnerSetupPanicked { .. }
            | DispatchError::GraceExceeded { .. } => None,
        }
    }
}

/// # Errors produced by runner operations.
///
/// Returned by [`Runner`](crate::Runner) implementations from `start`,
/// `run_refresh`, `kill` and `close`.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RunnerError {
    /// The operation failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// I/O failure talking to the underlying process or connection.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The operation panicked; the panic was caught by the actor.
    #[error("{op} panicked: {info}")]
    Panicked {
        /// Operation name.
        op: &'static str,
        /// Panic payload rendered as text.
        info: String,
    },

    /// The operation requires a started runner.
    #[error("runner not started")]
    NotStarted,
}

impl RunnerError {
    /// Convenience constructor for [`RunnerError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        RunnerError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use runvisor::RunnerError;
    ///
    /// let err = RunnerError::fail("connection refused");
    /// assert_eq!(err.as_label(), "runner_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RunnerError::Fail { .. } => "runner_failed",
            RunnerError::Io(_) => "runner_io",
            RunnerError::Panicked { .. } => "runner_panicked",
            RunnerError::NotStarted => "runner_not_started",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RunnerError::Fail { error } => format!("error: {error}"),
            RunnerError::Io(e) => format!("io: {e}"),
            RunnerError::Panicked { op, info } => format!("panic in {op}: {info}"),
            RunnerError::NotStarted => "not started".to_string(),
        }
    }
}

/// Renders a caught panic payload as text.
pub(crate) fn panic_info(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runner_error_wraps_with_operation() {
        let err = DispatchError::Runner {
            runner_id: "r-7".into(),
            op: "refresh",
            source: RunnerError::fail("boom"),
        };
        assert_eq!(err.as_label(), "dispatch_runner_failed");
        assert_eq!(err.as_message(), "runner r-7 refresh: error: boom");
        assert_eq!(err.runner_id().map(|id| id.as_str()), Some("r-7"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn grace_exceeded_has_no_runner() {
        let err = DispatchError::GraceExceeded {
            grace: Duration::from_secs(1),
            stuck: vec!["a".into()],
        };
        assert!(err.runner_id().is_none());
        assert_eq!(err.as_label(), "dispatch_grace_exceeded");
    }

    #[test]
    fn io_errors_convert() {
        let err: RunnerError = std::io::Error::other("pipe closed").into();
        assert_eq!(err.as_label(), "runner_io");
        assert!(err.as_message().contains("pipe closed"));
    }

    #[test]
    fn panic_payloads_render() {
        assert_eq!(panic_info(Box::new("static")), "static");
        assert_eq!(panic_info(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_info(Box::new(42u8)), "unknown panic");
    }
}
