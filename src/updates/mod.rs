//! # Updates delivered to waiting callers.
//!
//! This module provides the values that flow from a runner to its caller:
//! - [`Update`] - one poll's worth of progress, optionally terminal
//! - [`ExitStatus`] - terminal status carried by an update
//! - [`ErrorEnvelope`] - an escalated error, delivered as an update
//! - [`ContinuousOutput`], [`OutputChunk`], [`OutputKind`] - accumulated output
//! - [`UpdateBuffer`] - helper runners use to collect output between polls

mod buffer;
mod output;
mod update;

pub use buffer::UpdateBuffer;
pub use output::{ContinuousOutput, OutputChunk, OutputKind};
pub use update::{ErrorEnvelope, ExitStatus, Update};
