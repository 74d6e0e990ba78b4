use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::DispatcherConfig;
use crate::core::dispatcher::Dispatcher;
use crate::events::Bus;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder for constructing a [`Dispatcher`] with optional features.
pub struct DispatcherBuilder {
    cfg: DispatcherConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    runtime: Option<Handle>,
}

impl DispatcherBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: DispatcherConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            runtime: None,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive lifecycle events (registrations, deliveries,
    /// escalations) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Runs actors and subscriber workers on `runtime`.
    ///
    /// Required when the dispatcher is built (or used) from a thread that is not
    /// inside a Tokio runtime.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Builds the dispatcher.
    ///
    /// Initializes the event bus and, if any subscribers were given, spawns the
    /// listener that fans bus events out to them.
    ///
    /// # Panics
    /// Panics if no runtime was set and this is called outside a Tokio runtime.
    pub fn build(self) -> Dispatcher {
        let runtime = self.runtime.unwrap_or_else(Handle::current);
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let listener = CancellationToken::new();

        if !self.subscribers.is_empty() {
            let subs = SubscriberSet::new(self.subscribers, bus.clone(), &runtime);
            subscriber_listener(&bus, subs, &runtime, listener.clone());
        }
        Dispatcher::from_parts(self.cfg, bus, runtime, listener)
    }
}

/// Forwards bus events to the subscriber set until `stop` is cancelled.
///
/// The set keeps a bus sender of its own, so the bus never closes while the
/// listener runs. Events already queued when `stop` fires are still forwarded;
/// dropping the set then ends its workers.
fn subscriber_listener(bus: &Bus, set: SubscriberSet, runtime: &Handle, stop: CancellationToken) {
    let mut rx = bus.subscribe();
    runtime.spawn(async move {
        loop {
            tokio::select! {
                biased;
                res = rx.recv() => match res {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "subscriber listener lagged behind the bus");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = stop.cancelled() => {
                    while let Ok(ev) = rx.try_recv() {
                        set.emit(&ev);
                    }
                    break;
                }
            }
        }
        debug!("subscriber listener stopped");
    });
}
