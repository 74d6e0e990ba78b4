//! # Dispatcher: runner registry, escalation point and shutdown coordinator.
//!
//! The [`Dispatcher`] accepts `(action, runner)` pairs, spawns one
//! [`RunnerActor`] per runner and routes every update or failure of that runner
//! back to the caller's [`SuspendedAction`](crate::SuspendedAction).
//!
//! ## High-level architecture
//! ```text
//! start(action, runner)
//!   └─► id / span / interval       (a panic here → RunnerSetupPanicked)
//!   └─► registry.admit(id)         (duplicate / empty id / shutting down → fatal envelope)
//!   └─► spawn RunnerActor(serial)  (tracked by TaskTracker)
//!   └─► registry.insert(id, {mailbox, action, serial})
//!   └─► tell(Start)
//!
//! RunnerActor ──► deliver_from(id, serial, update)  (terminal update → finish(id))
//!             ──► escalate_from(id, serial, err, fatal)
//!                   ├─► action.append(ErrorEnvelope update)
//!                   └─► fatal → finish(id)
//!   (both drop their input once the registration is no longer the actor's)
//!
//! finish(id)
//!   └─► registry.remove(id) ─► tell(Terminate) ─► actor closes runner ─► Termination
//!
//! shutdown()
//!   └─► stop accepting ─► ShuttingDown envelope + finish(all) ─► wait(cfg.grace)
//!                                          ├─ Ok      → AllStoppedWithin
//!                                          └─ Timeout → GraceExceeded { stuck }
//! ```
//!
//! ## Rules
//! - At most one active registration per runner id
//! - Every registry mutation and every delivery to an action happens under one lock
//! - Nothing reaches an action after its terminal update
//! - A fatal escalation always removes the registration
//! - `finish` on an unknown id is a no-op
//! - All operations are non-blocking except [`Dispatcher::shutdown`]

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::{broadcast, oneshot};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::{DispatcherConfig, clamp_refresh_interval};
use crate::core::actor::{ActorHandle, Message, RunnerActor, RunnerActorParams, Termination};
use crate::core::builder::DispatcherBuilder;
use crate::core::registry::{Registration, Registry};
use crate::error::{DispatchError, panic_info};
use crate::events::{Bus, Event, EventKind};
use crate::runners::{ActionRef, RunnerBox, RunnerId};
use crate::updates::Update;

/// Label of the debug chunk carried by escalated error updates.
pub(crate) const ERROR_LABEL: &str = "Runner error";

/// State shared by the dispatcher handle and (weakly) by every actor.
pub(crate) struct Shared {
    cfg: DispatcherConfig,
    registry: Mutex<Registry>,
    bus: Bus,
    tracker: TaskTracker,
    runtime: Handle,
    /// Stops the subscriber listener.
    listener: CancellationToken,
}

impl Shared {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(
        self: &Arc<Self>,
        action: &ActionRef,
        mut runner: RunnerBox,
    ) -> Result<RunnerId, DispatchError> {
        // id, span and interval come from user code; run it outside the lock
        let prepared = std::panic::catch_unwind(AssertUnwindSafe(|| {
            let id = runner.id().clone();
            let span = info_span!("runner", id = %id);
            runner.attach_span(span.clone());
            let interval = runner.refresh_interval().map(clamp_refresh_interval);
            (id, span, interval)
        }));
        let (id, span, interval) = prepared.map_err(|panic| DispatchError::RunnerSetupPanicked {
            info: panic_info(panic),
        })?;
        let refresh_interval = interval.unwrap_or_else(|| self.cfg.refresh_interval_clamped());

        let mut registry = self.registry();
        registry.admit(&id)?;
        let serial = registry.allocate_serial();

        let (handle, mailbox) = ActorHandle::channel();
        let actor = RunnerActor::new(
            id.clone(),
            runner,
            serial,
            Arc::downgrade(self),
            self.bus.clone(),
            RunnerActorParams { refresh_interval },
            mailbox,
        );
        // the actor does nothing until Start, which is sent after the insert
        self.tracker.spawn_on(actor.run().instrument(span), &self.runtime);

        let registration = Registration {
            actor: handle.clone(),
            action: Arc::clone(action),
            serial,
        };
        registry.insert(id.clone(), registration)?;
        if let Err(e) = handle.tell(&id, Message::Start) {
            registry.remove(id.as_str());
            return Err(e);
        }
        let active = registry.len();
        drop(registry);

        debug!(runner = %id, serial, active, "runner registered");
        self.bus
            .publish(Event::new(EventKind::RunnerRegistered).with_runner(&id));
        Ok(id)
    }

    pub(crate) fn finish(&self, id: &str) -> Option<Termination> {
        let mut registry = self.registry();
        self.finish_locked(&mut registry, id)
    }

    fn finish_locked(&self, registry: &mut Registry, id: &str) -> Option<Termination> {
        let reg = registry.remove(id)?;
        debug!(runner = id, left = registry.len(), "closing session for runner");

        let (done, rx) = oneshot::channel();
        if reg.actor.tell(&RunnerId::from(id), Message::Terminate(done)).is_err() {
            // actor already stopped; the dropped sender completes the Termination
            debug!(runner = id, "actor already gone");
        }
        self.bus
            .publish(Event::new(EventKind::RunnerFinishing).with_runner(id));
        Some(Termination::new(rx))
    }

    /// Forwards an update from actor `serial`; a terminal one finishes the runner.
    ///
    /// Returns `false` (and drops the update) once the registration is no
    /// longer this actor's, so nothing follows a terminal update.
    pub(crate) fn deliver_from(&self, id: &str, serial: u64, update: Update) -> bool {
        let mut registry = self.registry();
        let Some(reg) = registry.owned_by(id, serial) else {
            debug!(runner = id, serial, "registration gone; update dropped");
            return false;
        };
        let exit_status = update.exit_status();
        deliver(id, &reg.action, update);
        self.bus.publish(
            Event::new(EventKind::UpdateDelivered)
                .with_runner(id)
                .with_exit_status(exit_status),
        );
        if exit_status.is_some() {
            self.finish_locked(&mut registry, id);
        }
        true
    }

    /// Escalates an error raised by actor `serial`, unless its registration is gone.
    pub(crate) fn escalate_from(&self, id: &str, serial: u64, err: DispatchError, fatal: bool) {
        let mut registry = self.registry();
        if registry.owned_by(id, serial).is_none() {
            warn!(runner = id, serial, fatal, error = %err, "registration gone; error dropped");
            return;
        }
        self.handle_locked(&mut registry, id, err, fatal);
    }

    pub(crate) fn handle_command_exception(&self, id: &str, err: DispatchError, fatal: bool) {
        let mut registry = self.registry();
        self.handle_locked(&mut registry, id, err, fatal);
    }

    fn handle_locked(&self, registry: &mut Registry, id: &str, err: DispatchError, fatal: bool) {
        error!(
            runner = id,
            fatal,
            label = err.as_label(),
            error = %err,
            "error while dispatching request to runner"
        );
        self.bus.publish(
            Event::new(EventKind::ErrorEscalated)
                .with_runner(id)
                .with_reason(err.as_message())
                .with_fatal(fatal),
        );

        let err = Arc::new(err);
        match registry.get(id) {
            Some(reg) => {
                let update = Update::encode_exception(ERROR_LABEL, err, fatal);
                deliver(id, &reg.action, update);
            }
            None => debug!(runner = id, "no registration; error not delivered"),
        }
        if fatal {
            self.finish_locked(registry, id);
        }
    }

    /// Tells the caller its runner is being shut down, then finishes it.
    fn abort_locked(&self, registry: &mut Registry, id: &RunnerId) -> Option<Termination> {
        let reg = registry.get(id.as_str())?;
        let err = Arc::new(DispatchError::ShuttingDown {
            runner_id: id.clone(),
        });
        deliver(
            id.as_str(),
            &reg.action,
            Update::encode_exception(ERROR_LABEL, err, true),
        );
        self.finish_locked(registry, id.as_str())
    }

    fn kill(&self, id: &str) {
        let mut registry = self.registry();
        let Some(reg) = registry.get(id) else {
            debug!(runner = id, "kill requested for unknown runner");
            return;
        };
        let sent = reg.actor.tell(&RunnerId::from(id), Message::Kill);
        if let Err(e) = sent {
            self.handle_locked(&mut registry, id, e, false);
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.listener.cancel();
    }
}

/// Appends to a caller's action; a panicking action is logged and ignored.
fn deliver(id: &str, action: &ActionRef, update: Update) {
    if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(|| action.append(update))) {
        warn!(runner = id, info = %panic_info(panic), "suspended action panicked");
    }
}

/// Coordinates runner actors and routes their updates to waiting callers.
///
/// Cheap to clone; every clone refers to the same registry. Dropping the last
/// clone closes every actor mailbox, so actors close their runners and stop.
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use runvisor::{ChannelAction, CommandRunner, Dispatcher, DispatcherConfig};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let dispatcher = Dispatcher::new(DispatcherConfig::default());
///
///     let (action, mut updates) = ChannelAction::channel();
///     let runner = CommandRunner::new("echo hi").with_refresh_interval(Duration::from_millis(20));
///     let id = dispatcher.start(action, Box::new(runner)).expect("registered");
///     assert!(dispatcher.is_active(id.as_str()));
///
///     while let Some(update) = updates.recv().await {
///         if update.is_terminal() {
///             break;
///         }
///     }
///     dispatcher.shutdown().await?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
}

impl Dispatcher {
    /// Creates a dispatcher on the current Tokio runtime without subscribers.
    ///
    /// # Panics
    /// Panics if called outside of a Tokio runtime; use
    /// [`DispatcherBuilder::with_runtime`] to build from elsewhere.
    pub fn new(cfg: DispatcherConfig) -> Self {
        Self::builder(cfg).build()
    }

    /// Returns a builder for configuring subscribers and the runtime.
    pub fn builder(cfg: DispatcherConfig) -> DispatcherBuilder {
        DispatcherBuilder::new(cfg)
    }

    pub(crate) fn from_parts(
        cfg: DispatcherConfig,
        bus: Bus,
        runtime: Handle,
        listener: CancellationToken,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                cfg,
                registry: Mutex::new(Registry::new()),
                bus,
                tracker: TaskTracker::new(),
                runtime,
                listener,
            }),
        }
    }

    /// Registers `runner` on behalf of `action` and tells its actor to start.
    ///
    /// Returns the runner id, or `None` if the runner could not be registered.
    /// In that case `action` has already received a fatal error update and any
    /// existing registration with the same id is left untouched.
    pub fn start(&self, action: ActionRef, runner: RunnerBox) -> Option<RunnerId> {
        match self.shared.register(&action, runner) {
            Ok(id) => Some(id),
            Err(err) => {
                let runner_id = err
                    .runner_id()
                    .map(RunnerId::as_str)
                    .unwrap_or_default()
                    .to_owned();
                error!(runner = %runner_id, error = %err, "runner rejected");
                self.shared.bus.publish(
                    Event::new(EventKind::RunnerRejected)
                        .with_runner(runner_id.as_str())
                        .with_reason(err.as_label()),
                );
                let update = Update::encode_exception(ERROR_LABEL, Arc::new(err), true);
                deliver(&runner_id, &action, update);
                None
            }
        }
    }

    /// Like [`start`](Self::start), but reports a rejection to the caller only.
    ///
    /// `action` receives nothing when registration fails.
    pub fn try_start(
        &self,
        action: ActionRef,
        runner: RunnerBox,
    ) -> Result<RunnerId, DispatchError> {
        self.shared.register(&action, runner)
    }

    /// Asks the runner to kill its work. Unknown ids are ignored.
    ///
    /// The runner's final exit status still arrives through a refresh poll.
    pub fn kill(&self, id: &str) {
        self.shared.kill(id);
    }

    /// Removes the registration and tells the actor to close its runner.
    ///
    /// Returns `None` if `id` is not registered (already finished or unknown).
    pub fn finish(&self, id: &str) -> Option<Termination> {
        self.shared.finish(id)
    }

    /// Reports `err` for runner `id` to its waiting caller.
    ///
    /// A fatal error also finishes the runner.
    pub fn handle_command_exception(&self, id: &str, err: DispatchError, fatal: bool) {
        self.shared.handle_command_exception(id, err, fatal);
    }

    /// Returns `true` if `id` has an active registration.
    pub fn is_active(&self, id: &str) -> bool {
        self.shared.registry().contains(id)
    }

    /// Returns sorted ids of active runners.
    pub fn list(&self) -> Vec<String> {
        self.shared
            .registry()
            .ids()
            .into_iter()
            .map(|id| id.to_string())
            .collect()
    }

    /// Number of active runners.
    pub fn len(&self) -> usize {
        self.shared.registry().len()
    }

    /// `true` if no runner is active.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The configuration this dispatcher was built with.
    pub fn config(&self) -> &DispatcherConfig {
        &self.shared.cfg
    }

    /// The event bus carrying lifecycle events.
    pub fn bus(&self) -> &Bus {
        &self.shared.bus
    }

    /// Subscribes to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.bus.subscribe()
    }

    /// Stops accepting runners, finishes every active one and waits up to
    /// [`DispatcherConfig::grace`] for their actors to stop.
    ///
    /// # Errors
    /// Returns [`DispatchError::GraceExceeded`] listing runners whose actors
    /// had not closed their runner when the grace period ran out.
    pub async fn shutdown(&self) -> Result<(), DispatchError> {
        info!("dispatcher shutdown requested");
        self.shared
            .bus
            .publish(Event::new(EventKind::ShutdownRequested));

        let mut pending: Vec<(RunnerId, Termination)> = {
            let mut registry = self.shared.registry();
            registry.close();
            registry
                .ids()
                .into_iter()
                .filter_map(|id| {
                    let termination = self.shared.abort_locked(&mut registry, &id)?;
                    Some((id, termination))
                })
                .collect()
        };

        let grace = self.shared.cfg.grace;
        self.shared.tracker.close();
        match tokio::time::timeout(grace, self.shared.tracker.wait()).await {
            Ok(()) => {
                info!("all runners stopped within grace");
                self.shared
                    .bus
                    .publish(Event::new(EventKind::AllStoppedWithin));
                self.shared.listener.cancel();
                Ok(())
            }
            Err(_) => {
                let stuck: Vec<String> = pending
                    .iter_mut()
                    .filter_map(|(id, termination)| {
                        (!termination.is_complete()).then(|| id.to_string())
                    })
                    .collect();
                warn!(?grace, ?stuck, "shutdown grace exceeded");
                self.shared.bus.publish(
                    Event::new(EventKind::GraceExceeded).with_reason(format!("stuck={stuck:?}")),
                );
                self.shared.listener.cancel();
                Err(DispatchError::GraceExceeded { grace, stuck })
            }
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("cfg", &self.shared.cfg)
            .field("active", &self.len())
            .finish()
    }
}
