//! # LogWriter: lifecycle events rendered through `tracing`
//!
//! A minimal subscriber that writes incoming [`Event`]s as structured `tracing` records.
//! Escalations are logged at `warn`/`error`, everything else at `debug`/`info`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO  runvisor: registered runner="r-1"
//! DEBUG runvisor: refresh planned runner="r-1" delay_ms=1000
//! INFO  runvisor: update delivered runner="r-1" exit_status=Some(Code(0))
//! ERROR runvisor: error escalated runner="r-1" fatal=true reason="..."
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let runner = e.runner.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::RunnerRegistered => info!(runner, "registered"),
            EventKind::RunnerRejected => warn!(runner, reason, "start rejected"),
            EventKind::RunnerFinishing => debug!(runner, "finishing"),
            EventKind::RunnerStarting => debug!(runner, "starting"),
            EventKind::RefreshPlanned => {
                debug!(runner, delay_ms = ?e.delay_ms, "refresh planned")
            }
            EventKind::UpdateDelivered => match e.exit_status {
                Some(status) => info!(runner, exit_status = %status, "terminal update delivered"),
                None => debug!(runner, "update delivered"),
            },
            EventKind::KillRequested => info!(runner, "kill requested"),
            EventKind::RunnerTerminated => info!(runner, reason, "terminated"),
            EventKind::ErrorEscalated => {
                if e.fatal == Some(true) {
                    error!(runner, reason, "fatal error escalated");
                } else {
                    warn!(runner, reason, "error escalated");
                }
            }
            EventKind::SubscriberOverflow => warn!(subscriber = runner, reason, "subscriber overflow"),
            EventKind::SubscriberPanicked => error!(subscriber = runner, reason, "subscriber panicked"),
            EventKind::ShutdownRequested => info!("shutdown requested"),
            EventKind::AllStoppedWithin => info!("all runners stopped within grace"),
            EventKind::GraceExceeded => warn!(reason, "grace exceeded"),
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
