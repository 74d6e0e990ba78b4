//! # Runner and caller abstractions.
//!
//! This module provides the two collaborator contracts of the dispatcher and
//! ready-made implementations:
//! - [`Runner`] - trait for the concrete executable unit, polled for progress
//! - [`RunnerId`] - cheap-clone runner identifier
//! - [`SuspendedAction`] - trait for the caller waiting on updates
//! - [`ChannelAction`], [`ActionFn`] - channel- and closure-backed actions
//! - [`CommandRunner`] - local shell command runner

mod action;
mod command;
mod runner;

pub use action::{ActionFn, ActionRef, ChannelAction, SuspendedAction};
pub use command::CommandRunner;
pub use runner::{Runner, RunnerBox, RunnerId};
