//! Runtime core: registry, actors and the dispatcher.
//!
//! The only public API from this module is [`Dispatcher`] (plus its builder and
//! the [`Termination`] handle).
//!
//! Internal modules:
//! - [`registry`]: runner id → actor mailbox and waiting action;
//! - [`actor`]: drives one runner, owns its refresh deadline;
//! - [`dispatcher`]: registration, escalation, finish and shutdown;
//! - [`builder`]: wires the bus, subscribers and runtime handle.

mod actor;
mod builder;
mod dispatcher;
mod registry;

pub use actor::Termination;
pub use builder::DispatcherBuilder;
pub use dispatcher::Dispatcher;
