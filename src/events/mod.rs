//! Lifecycle events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by the dispatcher, runner actors and
//! subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Dispatcher` (registration, escalation, shutdown),
//!   `RunnerActor` (start, refresh planning, delivered updates, termination),
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the dispatcher's subscriber listener (fans out to
//!   `SubscriberSet`) and anything holding a [`Bus::subscribe`] receiver.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
