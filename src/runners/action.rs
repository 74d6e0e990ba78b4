//! # Suspended actions: the callers waiting for updates.
//!
//! A [`SuspendedAction`] is a pure sink: the dispatcher and the runner's actor
//! push [`Update`]s into it and never read anything back. The caller resumes
//! once an update with an exit status arrives.
//!
//! Two implementations are provided:
//! - [`ChannelAction`] forwards updates into an unbounded mpsc channel
//! - [`ActionFn`] calls a closure for every update
//!
//! `append` may be called while the dispatcher's registry lock is held, so an
//! implementation must not call back into the [`Dispatcher`](crate::Dispatcher).

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::updates::Update;

/// Caller handle that receives updates.
pub trait SuspendedAction: Send + Sync + 'static {
    /// Delivers one update. Must not block.
    fn append(&self, update: Update);
}

/// Shared handle to a suspended action.
pub type ActionRef = Arc<dyn SuspendedAction>;

/// Channel-backed action.
///
/// ## Example
/// ```rust
/// use runvisor::{ChannelAction, ExitStatus, SuspendedAction, Update};
///
/// let (action, mut updates) = ChannelAction::channel();
/// action.append(Update::exited(ExitStatus::Code(0)));
/// assert!(updates.try_recv().unwrap().is_terminal());
/// ```
#[derive(Debug, Clone)]
pub struct ChannelAction {
    tx: mpsc::UnboundedSender<Update>,
}

impl ChannelAction {
    /// Creates an action and the receiver its updates arrive on.
    pub fn channel() -> (Arc<Self>, mpsc::UnboundedReceiver<Update>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl SuspendedAction for ChannelAction {
    fn append(&self, update: Update) {
        // Receiver gone: the caller stopped listening, nothing left to notify.
        let _ = self.tx.send(update);
    }
}

/// Closure-backed action.
pub struct ActionFn<F> {
    f: F,
}

impl<F> ActionFn<F>
where
    F: Fn(Update) + Send + Sync + 'static,
{
    /// Wraps a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Wraps a closure and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

impl<F> fmt::Debug for ActionFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionFn").finish_non_exhaustive()
    }
}

impl<F> SuspendedAction for ActionFn<F>
where
    F: Fn(Update) + Send + Sync + 'static,
{
    fn append(&self, update: Update) {
        (self.f)(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::updates::{ExitStatus, OutputKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn channel_action_forwards_in_order() {
        let (action, mut rx) = ChannelAction::channel();
        action.append(Update::output("a", OutputKind::Stdout));
        action.append(Update::exited(ExitStatus::Code(1)));

        assert!(!rx.try_recv().expect("first").is_terminal());
        assert_eq!(
            rx.try_recv().expect("second").exit_status(),
            Some(ExitStatus::Code(1))
        );
    }

    #[test]
    fn channel_action_tolerates_dropped_receiver() {
        let (action, rx) = ChannelAction::channel();
        drop(rx);
        action.append(Update::exited(ExitStatus::Code(0)));
    }

    #[test]
    fn action_fn_calls_closure() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let action: ActionRef = ActionFn::arc(move |_update| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        action.append(Update::default());
        action.append(Update::default());
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
