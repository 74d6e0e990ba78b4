//! # Update: one poll's worth of progress.
//!
//! An [`Update`] is produced by a runner on each refresh poll (or by the dispatcher
//! when escalating an error) and delivered to the waiting caller. An update whose
//! [`exit_status`](Update::exit_status) is set is **terminal**: it is the last
//! update the caller receives for that runner.
//!
//! ## Encoded errors
//! [`Update::encode_exception`] wraps a [`DispatchError`] into an [`ErrorEnvelope`]:
//! ```text
//! encode_exception("Runner error", err, fatal)
//!   ├─ output:      [Debug] "Runner error: <label> - <message>"
//!   ├─ error:       ErrorEnvelope { label, error, fatal }
//!   └─ exit_status: fatal → Some(ExitStatus::Exception), else None
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::DispatchError;
use crate::updates::output::{ContinuousOutput, OutputKind};

/// Terminal status of a runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitStatus {
    /// The command exited with this code.
    Code(i32),
    /// The runner was torn down by a fatal error.
    Exception,
}

impl ExitStatus {
    /// True for `Code(0)`.
    pub fn is_success(&self) -> bool {
        matches!(self, ExitStatus::Code(0))
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Code(code) => write!(f, "{code}"),
            ExitStatus::Exception => f.write_str("EXCEPTION"),
        }
    }
}

/// An escalated error, delivered to the caller inside an [`Update`].
#[derive(Debug, Clone)]
pub struct ErrorEnvelope {
    /// Short context label (the dispatcher uses `"Runner error"`).
    pub label: String,
    /// The original error.
    pub error: Arc<DispatchError>,
    /// Whether the runner was torn down because of it.
    pub fatal: bool,
}

/// Progress or terminal message produced by polling a runner.
#[derive(Debug, Clone, Default)]
pub struct Update {
    output: ContinuousOutput,
    exit_status: Option<ExitStatus>,
    error: Option<ErrorEnvelope>,
}

impl Update {
    /// Creates an update from accumulated output and an optional exit status.
    pub fn new(output: ContinuousOutput, exit_status: Option<ExitStatus>) -> Self {
        Self {
            output,
            exit_status,
            error: None,
        }
    }

    /// Creates a terminal update carrying only an exit status.
    pub fn exited(status: ExitStatus) -> Self {
        Self::new(ContinuousOutput::new(), Some(status))
    }

    /// Creates a non-terminal update with a single chunk of output.
    pub fn output(text: impl Into<String>, kind: OutputKind) -> Self {
        let mut output = ContinuousOutput::new();
        output.add_output(text, kind);
        Self::new(output, None)
    }

    /// Encodes an error as an update.
    ///
    /// Fatal errors carry [`ExitStatus::Exception`] and are therefore terminal.
    pub fn encode_exception(label: &str, error: Arc<DispatchError>, fatal: bool) -> Self {
        let mut output = ContinuousOutput::new();
        output.add_output(
            format!("{label}: {} - {error}", error.as_label()),
            OutputKind::Debug,
        );
        Self {
            output,
            exit_status: fatal.then_some(ExitStatus::Exception),
            error: Some(ErrorEnvelope {
                label: label.to_string(),
                error,
                fatal,
            }),
        }
    }

    /// Output carried by this update.
    pub fn continuous_output(&self) -> &ContinuousOutput {
        &self.output
    }

    /// Exit status, set only on terminal updates.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    /// The escalated error, if this update encodes one.
    pub fn error(&self) -> Option<&ErrorEnvelope> {
        self.error.as_ref()
    }

    /// True if this update ends the runner's stream of updates.
    pub fn is_terminal(&self) -> bool {
        self.exit_status.is_some()
    }

    /// True if this update encodes a fatal error.
    pub fn is_fatal_error(&self) -> bool {
        self.error.as_ref().is_some_and(|e| e.fatal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_errors_are_terminal() {
        let err = Arc::new(DispatchError::AlreadyRegistered {
            runner_id: "r-1".into(),
        });
        let update = Update::encode_exception("Runner error", err, true);

        assert!(update.is_terminal());
        assert!(update.is_fatal_error());
        assert_eq!(update.exit_status(), Some(ExitStatus::Exception));
        let envelope = update.error().expect("envelope");
        assert_eq!(envelope.label, "Runner error");
        assert_eq!(envelope.error.as_label(), "dispatch_already_registered");
        assert_eq!(
            update.continuous_output().text_of(OutputKind::Debug),
            "Runner error: dispatch_already_registered - actor with runner id r-1 already exists"
        );
    }

    #[test]
    fn non_fatal_errors_keep_the_runner_alive() {
        let err = Arc::new(DispatchError::MailboxClosed {
            runner_id: "r-2".into(),
        });
        let update = Update::encode_exception("Runner error", err, false);
        assert!(!update.is_terminal());
        assert!(!update.is_fatal_error());
        assert!(update.error().is_some());
    }

    #[test]
    fn exit_status_display() {
        assert_eq!(ExitStatus::Code(3).to_string(), "3");
        assert_eq!(ExitStatus::Exception.to_string(), "EXCEPTION");
        assert!(ExitStatus::Code(0).is_success());
        assert!(!ExitStatus::Exception.is_success());
    }
}
