//! # Lifecycle events emitted by the dispatcher and runner actors.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Registration events**: runner registered/rejected, termination requested
//! - **Actor events**: start, refresh planning, delivered updates, kill, termination
//! - **Escalation events**: errors routed to the waiting caller
//! - **Runtime events**: subscriber overflow/panic, shutdown
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use runvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ErrorEscalated)
//!     .with_runner("r-1")
//!     .with_reason("boom")
//!     .with_fatal(true);
//!
//! assert_eq!(ev.kind, EventKind::ErrorEscalated);
//! assert_eq!(ev.runner.as_deref(), Some("r-1"));
//! assert_eq!(ev.fatal, Some(true));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::updates::ExitStatus;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `runner`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `runner`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Registration events ===
    /// A runner was registered and its actor spawned.
    ///
    /// Sets:
    /// - `runner`: runner id
    RunnerRegistered,

    /// A start request was rejected (duplicate id, invalid id, shutting down).
    ///
    /// Sets:
    /// - `runner`: runner id (may be empty)
    /// - `reason`: error label
    RunnerRejected,

    /// The registration was removed and the actor told to terminate.
    ///
    /// Sets:
    /// - `runner`: runner id
    RunnerFinishing,

    // === Actor events ===
    /// The actor is starting its runner.
    ///
    /// Sets:
    /// - `runner`: runner id
    RunnerStarting,

    /// The next refresh poll was armed.
    ///
    /// Sets:
    /// - `runner`: runner id
    /// - `delay_ms`: delay until the poll (ms)
    RefreshPlanned,

    /// An update produced by the runner was forwarded to the caller.
    ///
    /// Sets:
    /// - `runner`: runner id
    /// - `exit_status`: set when the update is terminal
    UpdateDelivered,

    /// A kill request reached the actor.
    ///
    /// Sets:
    /// - `runner`: runner id
    KillRequested,

    /// The actor closed its runner and stopped.
    ///
    /// Sets:
    /// - `runner`: runner id
    /// - `reason`: close error, if closing failed
    RunnerTerminated,

    // === Escalation events ===
    /// An error was escalated to the waiting caller.
    ///
    /// Sets:
    /// - `runner`: runner id
    /// - `reason`: error message
    /// - `fatal`: whether the registration is torn down
    ErrorEscalated,

    // === Shutdown events ===
    /// Dispatcher shutdown requested.
    ShutdownRequested,

    /// All actors terminated within the configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some actors did not terminate in time.
    GraceExceeded,
}

/// Lifecycle event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Runner id (or subscriber name for subscriber events).
    pub runner: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Delay before the next refresh in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Whether an escalated error is fatal.
    pub fatal: Option<bool>,
    /// Exit status of a terminal update.
    pub exit_status: Option<ExitStatus>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            runner: None,
            reason: None,
            delay_ms: None,
            fatal: None,
            exit_status: None,
        }
    }

    /// Attaches a runner id.
    #[inline]
    pub fn with_runner(mut self, runner: impl Into<Arc<str>>) -> Self {
        self.runner = Some(runner.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a refresh delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Marks an escalation as fatal or not.
    #[inline]
    pub fn with_fatal(mut self, fatal: bool) -> Self {
        self.fatal = Some(fatal);
        self
    }

    /// Attaches an exit status (only when present).
    #[inline]
    pub fn with_exit_status(mut self, status: Option<ExitStatus>) -> Self {
        self.exit_status = status;
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_runner(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_runner(subscriber)
            .with_reason(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::new(EventKind::RunnerStarting);
        let b = Event::new(EventKind::RunnerStarting);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn delay_is_saturated_to_u32() {
        let ev = Event::new(EventKind::RefreshPlanned).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));

        let ev = Event::new(EventKind::RefreshPlanned).with_delay(Duration::from_millis(250));
        assert_eq!(ev.delay_ms, Some(250));
    }

    #[test]
    fn overflow_event_names_subscriber() {
        let ev = Event::subscriber_overflow("audit", "full");
        assert_eq!(ev.kind, EventKind::SubscriberOverflow);
        assert_eq!(ev.runner.as_deref(), Some("audit"));
        assert_eq!(ev.reason.as_deref(), Some("subscriber=audit reason=full"));
    }
}
