//! # RunnerActor: one runner, one mailbox, one refresh deadline.
//!
//! Owns a single [`Runner`] and serializes every operation on it. Requests
//! arrive through an unbounded mailbox; refresh polls are driven by a single
//! deadline kept inside the actor, so there is never more than one pending poll.
//!
//! ## Architecture
//! ```text
//! Dispatcher ──tell──► mailbox ──┐
//!                                ├─► select! ─► handle(msg)
//! next_refresh (sleep_until) ────┘      │
//!                                       ├─► Start     → start + refresh + plan
//!                                       ├─► Refresh   → run_refresh → deliver → plan
//!                                       ├─► Kill      → kill (errors non-fatal)
//!                                       └─► Terminate → close runner → stop
//! ```
//!
//! ## Rules
//! - Operations on the runner never overlap
//! - At most one refresh is armed (`next_refresh` is the only timer)
//! - After `finishing` latches, no refresh runs and none is armed
//! - Runner failures during start/refresh are escalated as fatal, kill failures as non-fatal
//! - A panic inside a runner operation is caught and treated as that operation's error
//! - The runner is closed exactly once, when the actor stops

use std::future::Future;
use std::ops::ControlFlow;
use std::panic::AssertUnwindSafe;
use std::sync::Weak;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};
use tracing::{debug, warn};

use crate::core::dispatcher::Shared;
use crate::error::{DispatchError, RunnerError, panic_info};
use crate::events::{Bus, Event, EventKind};
use crate::runners::{RunnerBox, RunnerId};
use crate::updates::Update;

/// Requests handled by a [`RunnerActor`].
pub(crate) enum Message {
    Start,
    Refresh,
    Kill,
    /// Close the runner and stop; `done` fires once the runner is closed.
    Terminate(oneshot::Sender<()>),
}

/// Sending side of an actor mailbox.
#[derive(Clone)]
pub(crate) struct ActorHandle {
    tx: mpsc::UnboundedSender<Message>,
}

impl ActorHandle {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueues a message without waiting for it to be handled.
    pub(crate) fn tell(&self, runner_id: &RunnerId, msg: Message) -> Result<(), DispatchError> {
        self.tx
            .send(msg)
            .map_err(|_| DispatchError::MailboxClosed {
                runner_id: runner_id.clone(),
            })
    }
}

/// Completion handle returned when a runner is finished.
///
/// Resolves once the actor has closed its runner (or is gone).
#[derive(Debug)]
pub struct Termination {
    rx: oneshot::Receiver<()>,
    done: bool,
}

impl Termination {
    pub(crate) fn new(rx: oneshot::Receiver<()>) -> Self {
        Self { rx, done: false }
    }

    /// Waits until the runner is closed.
    pub async fn wait(self) {
        if self.done {
            return;
        }
        // a dropped sender means the actor is already gone
        let _ = self.rx.await;
    }

    /// Returns `true` if the runner is already closed.
    ///
    /// Once it has returned `true` it keeps doing so, and [`wait`](Self::wait)
    /// returns immediately.
    pub fn is_complete(&mut self) -> bool {
        if !self.done {
            self.done = !matches!(self.rx.try_recv(), Err(oneshot::error::TryRecvError::Empty));
        }
        self.done
    }
}

/// Configuration parameters for a runner actor.
#[derive(Clone, Debug)]
pub(crate) struct RunnerActorParams {
    /// Delay between the end of one refresh poll and the next.
    pub refresh_interval: Duration,
}

/// Drives one [`Runner`](crate::Runner) on behalf of the dispatcher.
pub(crate) struct RunnerActor {
    id: RunnerId,
    runner: RunnerBox,
    /// Ties this actor to its registration; a later one under the same id differs.
    serial: u64,
    dispatcher: Weak<Shared>,
    bus: Bus,
    params: RunnerActorParams,
    mailbox: mpsc::UnboundedReceiver<Message>,
    finishing: bool,
    next_refresh: Option<Instant>,
}

impl RunnerActor {
    pub(crate) fn new(
        id: RunnerId,
        runner: RunnerBox,
        serial: u64,
        dispatcher: Weak<Shared>,
        bus: Bus,
        params: RunnerActorParams,
        mailbox: mpsc::UnboundedReceiver<Message>,
    ) -> Self {
        Self {
            id,
            runner,
            serial,
            dispatcher,
            bus,
            params,
            mailbox,
            finishing: false,
            next_refresh: None,
        }
    }

    /// Runs until told to terminate or until the dispatcher is dropped.
    pub(crate) async fn run(mut self) {
        loop {
            let msg = tokio::select! {
                biased;
                msg = self.mailbox.recv() => msg,
                _ = refresh_due(self.next_refresh) => {
                    self.next_refresh = None;
                    Some(Message::Refresh)
                }
            };

            let Some(msg) = msg else {
                debug!("mailbox closed; closing runner");
                self.close_runner().await;
                break;
            };

            let outcome = AssertUnwindSafe(self.handle(msg)).catch_unwind().await;
            match outcome {
                Ok(ControlFlow::Break(())) => break,
                Ok(ControlFlow::Continue(())) => {}
                Err(panic) => {
                    let err = DispatchError::ActorPanicked {
                        runner_id: self.id.clone(),
                        info: panic_info(panic),
                    };
                    self.escalate(err, true);
                }
            }
        }
        debug!("actor stopped");
    }

    async fn handle(&mut self, msg: Message) -> ControlFlow<()> {
        match msg {
            Message::Start => self.start_runner().await,
            Message::Refresh => self.refresh_runner().await,
            Message::Kill => self.kill_runner().await,
            Message::Terminate(done) => {
                self.terminate(done).await;
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn start_runner(&mut self) {
        debug!("starting runner");
        self.bus
            .publish(Event::new(EventKind::RunnerStarting).with_runner(&self.id));

        match guard("start", self.runner.start()).await {
            Ok(()) => self.refresh_runner().await,
            Err(e) => self.escalate_runner("start", e, true),
        }
        self.plan_next_refresh();
    }

    async fn refresh_runner(&mut self) {
        if !self.finishing {
            match guard("refresh", self.runner.run_refresh()).await {
                Ok(Some(update)) => self.deliver(update),
                Ok(None) => {}
                Err(e) => self.escalate_runner("refresh", e, true),
            }
        }
        self.next_refresh = None;
        self.plan_next_refresh();
    }

    async fn kill_runner(&mut self) {
        debug!("killing runner");
        self.bus
            .publish(Event::new(EventKind::KillRequested).with_runner(&self.id));

        if let Err(e) = guard("kill", self.runner.kill()).await {
            self.escalate_runner("kill", e, false);
        }
    }

    async fn terminate(&mut self, done: oneshot::Sender<()>) {
        self.finishing = true;
        self.next_refresh = None;
        self.close_runner().await;
        let _ = done.send(());
    }

    async fn close_runner(&mut self) {
        let ev = Event::new(EventKind::RunnerTerminated).with_runner(&self.id);
        match guard("close", self.runner.close()).await {
            Ok(()) => self.bus.publish(ev),
            Err(e) => {
                warn!(error = %e, "closing runner failed");
                self.bus.publish(ev.with_reason(e.as_message()));
            }
        }
    }

    /// Forwards an update to the caller; a terminal update finishes the runner.
    fn deliver(&mut self, update: Update) {
        let exit_status = update.exit_status();
        if exit_status.is_some() {
            self.finishing = true;
            self.next_refresh = None;
        }
        let Some(dispatcher) = self.dispatcher.upgrade() else {
            warn!("dispatcher gone; update dropped");
            return;
        };
        if dispatcher.deliver_from(self.id.as_str(), self.serial, update) {
            if let Some(status) = exit_status {
                debug!(%status, "terminal update delivered");
            }
        }
    }

    fn plan_next_refresh(&mut self) {
        if self.finishing || self.next_refresh.is_some() {
            return;
        }
        let delay = self.params.refresh_interval;
        self.next_refresh = Some(Instant::now() + delay);
        self.bus.publish(
            Event::new(EventKind::RefreshPlanned)
                .with_runner(&self.id)
                .with_delay(delay),
        );
    }

    fn escalate_runner(&mut self, op: &'static str, source: RunnerError, fatal: bool) {
        let err = DispatchError::Runner {
            runner_id: self.id.clone(),
            op,
            source,
        };
        self.escalate(err, fatal);
    }

    /// Routes an error to the dispatcher; a fatal one stops further refreshes first.
    fn escalate(&mut self, err: DispatchError, fatal: bool) {
        if fatal {
            self.finishing = true;
            self.next_refresh = None;
        }
        match self.dispatcher.upgrade() {
            Some(dispatcher) => dispatcher.escalate_from(self.id.as_str(), self.serial, err, fatal),
            None => warn!(error = %err, fatal, "dispatcher gone; error dropped"),
        }
    }
}

/// Runs one runner operation, turning a panic into [`RunnerError::Panicked`].
async fn guard<T, F>(op: &'static str, fut: F) -> Result<T, RunnerError>
where
    F: Future<Output = Result<T, RunnerError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(res) => res,
        Err(panic) => Err(RunnerError::Panicked {
            op,
            info: panic_info(panic),
        }),
    }
}

async fn refresh_due(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
