//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`] fan-out
//! used by the dispatcher to deliver lifecycle events broadcast on the
//! [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//!   RunnerActor / Dispatcher ── publish(Event) ──► Bus ──► subscriber listener
//!                                                              │
//!                                                              ▼
//!                                                        SubscriberSet
//!                                                   ┌──────────┼──────────┐
//!                                                   ▼          ▼          ▼
//!                                               LogWriter   Metrics    Custom
//! ```

mod subscriber;
mod subscriber_set;

#[cfg(feature = "logging")]
mod log;

pub use subscriber::Subscribe;
pub use subscriber_set::SubscriberSet;

#[cfg(feature = "logging")]
pub use log::LogWriter;
