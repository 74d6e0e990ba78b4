//! # runvisor
//!
//! **Runvisor** dispatches long-running commands ("runners") on behalf of
//! callers that wait for their results.
//!
//! Each runner gets its own actor that starts it, polls it for output on a
//! fixed cadence, forwards every update to the waiting caller (a
//! [`SuspendedAction`]) and finishes it once a terminal update (one carrying an
//! exit status) has been delivered. Failures never crash the dispatcher: they are
//! converted into updates carrying an [`ErrorEnvelope`] and delivered to the
//! caller, and fatal ones tear the runner down.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   caller A                caller B                caller C
//!  (action, runner)        (action, runner)        (action, runner)
//!        │                       │                       │
//!        ▼                       ▼                       ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Dispatcher                                                       │
//! │  - Registry (runner id → actor mailbox + waiting action)          │
//! │  - Bus (broadcast lifecycle events)                               │
//! │  - TaskTracker (every spawned actor, awaited on shutdown)         │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!  │ RunnerActor  │   │ RunnerActor  │   │ RunnerActor  │
//!  │ (mailbox +   │   │ (mailbox +   │   │ (mailbox +   │
//!  │  deadline)   │   │  deadline)   │   │  deadline)   │
//!  └┬─────────────┘   └┬─────────────┘   └┬─────────────┘
//!   │ start/refresh    │                  │
//!   │ kill/close       │                  │
//!   ▼                  ▼                  ▼
//!  Runner             Runner             Runner
//!   │                  │                  │
//!   └── Update ────────┴──── Update ──────┴──► action.append(update)
//! ```
//!
//! ### Lifecycle of one runner
//! ```text
//! start ──► Start ──► runner.start() ──► refresh ──► plan(refresh_interval)
//!                                           ▲                │
//!                                           └──── deadline ◄─┘
//!
//! refresh: update? ──► action.append ──► exit status? ──► finish(id)
//! error:   start/refresh ──► fatal envelope ──► finish(id)
//!          kill          ──► non-fatal envelope (runner keeps running)
//! finish:  registry.remove ──► Terminate ──► runner.close() ──► actor stops
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                          |
//! |-------------------|---------------------------------------------------------------|---------------------------------------------|
//! | **Dispatching**   | Register runners, kill and finish them, shut down gracefully. | [`Dispatcher`], [`Termination`]             |
//! | **Runners**       | Pluggable units of work polled for updates.                   | [`Runner`], [`RunnerId`], [`CommandRunner`] |
//! | **Callers**       | Sinks receiving updates and error envelopes.                  | [`SuspendedAction`], [`ChannelAction`]      |
//! | **Updates**       | Output chunks, exit status, escalated errors.                 | [`Update`], [`UpdateBuffer`]                |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics).                | [`Subscribe`], [`Event`]                    |
//! | **Errors**        | Typed errors for dispatching and runner operations.           | [`DispatchError`], [`RunnerError`]          |
//! | **Configuration** | Refresh cadence, bus size, shutdown grace.                    | [`DispatcherConfig`]                        |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] subscriber _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use runvisor::{ActionFn, CommandRunner, Dispatcher, DispatcherConfig, Update};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = DispatcherConfig::default().with_refresh_interval(Duration::from_millis(50));
//!
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn runvisor::Subscribe>> = vec![Arc::new(runvisor::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn runvisor::Subscribe>> = Vec::new();
//!
//!     let dispatcher = Dispatcher::builder(cfg).with_subscribers(subs).build();
//!
//!     let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel();
//!     let action = ActionFn::arc(move |update: Update| {
//!         for chunk in update.continuous_output().of_kind(runvisor::OutputKind::Stdout) {
//!             println!("{}", chunk.text);
//!         }
//!         if update.is_terminal() {
//!             let _ = done_tx.send(update.exit_status());
//!         }
//!     });
//!
//!     dispatcher.start(action, Box::new(CommandRunner::new("echo hello")));
//!     let status = done_rx.recv().await.flatten();
//!     println!("exited with {status:?}");
//!
//!     dispatcher.shutdown().await?;
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod runners;
mod subscribers;
mod updates;

// ---- Public re-exports ----

pub use config::DispatcherConfig;
pub use core::{Dispatcher, DispatcherBuilder, Termination};
pub use error::{DispatchError, RunnerError};
pub use events::{Bus, Event, EventKind};
pub use runners::{
    ActionFn, ActionRef, ChannelAction, CommandRunner, Runner, RunnerBox, RunnerId,
    SuspendedAction,
};
pub use subscribers::{Subscribe, SubscriberSet};
pub use updates::{
    ContinuousOutput, ErrorEnvelope, ExitStatus, OutputChunk, OutputKind, Update, UpdateBuffer,
};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
