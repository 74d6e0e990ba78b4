//! # UpdateBuffer: accumulate output between refresh polls.
//!
//! Concrete runners record output as it arrives and hand the accumulated state to
//! the actor from [`Runner::run_refresh`](crate::Runner::run_refresh):
//!
//! ```text
//! publish_data / publish_exception / publish_exit_status
//!         │
//!         ▼
//!   UpdateBuffer ──take_update()──► Some(Update)   (something recorded)
//!                                └► None           (nothing since last poll)
//! ```

use crate::updates::{ContinuousOutput, ExitStatus, OutputKind, Update};

/// Accumulates output and an exit status until the next poll.
#[derive(Debug, Default)]
pub struct UpdateBuffer {
    output: ContinuousOutput,
    exit_status: Option<ExitStatus>,
}

impl UpdateBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a chunk of output.
    pub fn publish_data(&mut self, text: impl Into<String>, kind: OutputKind) {
        self.output.add_output(text, kind);
    }

    /// Records an error as a debug chunk; a fatal one also sets
    /// [`ExitStatus::Exception`].
    pub fn publish_exception(&mut self, context: &str, error: &dyn std::error::Error, fatal: bool) {
        self.output.add_exception(context, error);
        if fatal {
            self.exit_status = Some(ExitStatus::Exception);
        }
    }

    /// Records the terminal exit status. The first status recorded wins.
    pub fn publish_exit_status(&mut self, status: ExitStatus) {
        self.exit_status.get_or_insert(status);
    }

    /// True if an exit status has been recorded.
    pub fn has_exit_status(&self) -> bool {
        self.exit_status.is_some()
    }

    /// Takes everything recorded since the last call.
    ///
    /// Returns `None` when neither output nor an exit status was recorded.
    pub fn take_update(&mut self) -> Option<Update> {
        if self.output.is_empty() && self.exit_status.is_none() {
            return None;
        }
        let output = std::mem::take(&mut self.output);
        Some(Update::new(output, self.exit_status.take()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_yields_nothing() {
        let mut buf = UpdateBuffer::new();
        assert!(buf.take_update().is_none());
    }

    #[test]
    fn take_drains_output() {
        let mut buf = UpdateBuffer::new();
        buf.publish_data("hello", OutputKind::Stdout);
        let update = buf.take_update().expect("update");
        assert_eq!(update.continuous_output().text_of(OutputKind::Stdout), "hello");
        assert!(!update.is_terminal());
        assert!(buf.take_update().is_none());
    }

    #[test]
    fn first_exit_status_wins() {
        let mut buf = UpdateBuffer::new();
        buf.publish_exit_status(ExitStatus::Code(2));
        buf.publish_exit_status(ExitStatus::Code(0));
        let update = buf.take_update().expect("update");
        assert_eq!(update.exit_status(), Some(ExitStatus::Code(2)));
    }

    #[test]
    fn fatal_exception_is_terminal() {
        let mut buf = UpdateBuffer::new();
        let err = std::io::Error::other("broken pipe");
        buf.publish_exception("reading output", &err, true);
        assert!(buf.has_exit_status());
        let update = buf.take_update().expect("update");
        assert_eq!(update.exit_status(), Some(ExitStatus::Exception));
        assert_eq!(
            update.continuous_output().text_of(OutputKind::Debug),
            "reading output: broken pipe"
        );
    }
}
