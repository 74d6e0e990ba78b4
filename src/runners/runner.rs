//! # Runner abstraction.
//!
//! A [`Runner`] is the concrete unit the dispatcher drives: it is started once,
//! polled with [`run_refresh`](Runner::run_refresh) until it reports an exit status,
//! optionally killed, and finally closed. All operations run inside the runner's
//! own actor, one at a time, so implementations need no internal locking.
//!
//! ```text
//! attach_span ─► start ─► run_refresh ─► run_refresh ─► ... ─► close
//!                             ▲ kill (any time, advisory)
//! ```

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::Span;

use crate::error::RunnerError;
use crate::updates::Update;

/// Identifier of a runner; unique among active registrations.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunnerId(Arc<str>);

impl RunnerId {
    /// Wraps an existing identifier.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Generates a random (UUID v4) identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string().into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the empty identifier (never accepted by the dispatcher).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RunnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for RunnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl From<&str> for RunnerId {
    fn from(s: &str) -> Self {
        Self(s.into())
    }
}

impl From<String> for RunnerId {
    fn from(s: String) -> Self {
        Self(s.into())
    }
}

impl From<RunnerId> for Arc<str> {
    fn from(id: RunnerId) -> Self {
        id.0
    }
}

impl From<&RunnerId> for Arc<str> {
    fn from(id: &RunnerId) -> Self {
        Arc::clone(&id.0)
    }
}

impl Borrow<str> for RunnerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RunnerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// # Asynchronously polled executable unit.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use runvisor::{ExitStatus, Runner, RunnerError, RunnerId, Update};
///
/// struct Countdown { id: RunnerId, left: u32 }
///
/// #[async_trait]
/// impl Runner for Countdown {
///     fn id(&self) -> &RunnerId { &self.id }
///
///     async fn start(&mut self) -> Result<(), RunnerError> { Ok(()) }
///
///     async fn run_refresh(&mut self) -> Result<Option<Update>, RunnerError> {
///         if self.left == 0 {
///             return Ok(Some(Update::exited(ExitStatus::Code(0))));
///         }
///         self.left -= 1;
///         Ok(None)
///     }
///
///     async fn kill(&mut self) -> Result<(), RunnerError> {
///         self.left = 0;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Runner: Send + 'static {
    /// Returns the runner's identifier.
    fn id(&self) -> &RunnerId;

    /// Receives the tracing span the dispatcher runs this runner under.
    ///
    /// Called once, before [`start`](Runner::start).
    fn attach_span(&mut self, span: Span) {
        let _ = span;
    }

    /// Overrides the dispatcher's default refresh interval for this runner.
    fn refresh_interval(&self) -> Option<Duration> {
        None
    }

    /// Starts the underlying execution.
    async fn start(&mut self) -> Result<(), RunnerError>;

    /// Polls for progress; returns `None` when nothing happened since the last poll.
    ///
    /// Returning an update with an exit status ends the polling.
    async fn run_refresh(&mut self) -> Result<Option<Update>, RunnerError>;

    /// Asks the underlying execution to stop.
    ///
    /// The exit is still reported through [`run_refresh`](Runner::run_refresh).
    async fn kill(&mut self) -> Result<(), RunnerError>;

    /// Releases resources; called exactly once when the runner is torn down.
    async fn close(&mut self) -> Result<(), RunnerError> {
        Ok(())
    }
}

/// Owned runner handed to the dispatcher.
pub type RunnerBox = Box<dyn Runner>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn ids_look_up_by_str() {
        let mut map = HashMap::new();
        map.insert(RunnerId::from("abc"), 1);
        assert_eq!(map.get("abc"), Some(&1));
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = RunnerId::generate();
        let b = RunnerId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
        assert!(!a.is_empty());
    }

    #[test]
    fn debug_is_quoted_display_is_plain() {
        let id = RunnerId::from("r-1");
        assert_eq!(format!("{id}"), "r-1");
        assert_eq!(format!("{id:?}"), "\"r-1\"");
    }
}
