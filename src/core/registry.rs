//! # Runner registry.
//!
//! Maps each active runner id to its actor mailbox and the caller's action. The
//! registry is the single source of truth for "is this runner active"; the
//! dispatcher keeps it behind one mutex and every mutation happens under it.
//!
//! ## Rules
//! - At most one registration per runner id
//! - Once closed (shutdown), no new registrations are accepted
//! - Removal is idempotent (`remove` on an absent id returns `None`)
//! - Every registration carries a serial that is never reused, so an actor can
//!   tell its own registration apart from a later one under the same id

use std::collections::HashMap;

use crate::core::actor::ActorHandle;
use crate::error::DispatchError;
use crate::runners::{ActionRef, RunnerId};

/// One active runner.
pub(crate) struct Registration {
    /// Mailbox of the runner's actor.
    pub(crate) actor: ActorHandle,
    /// The caller waiting for updates.
    pub(crate) action: ActionRef,
    /// Serial of the actor owning this registration.
    pub(crate) serial: u64,
}

/// Active registrations keyed by runner id.
pub(crate) struct Registry {
    entries: HashMap<RunnerId, Registration>,
    accepting: bool,
    next_serial: u64,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
            accepting: true,
            next_serial: 0,
        }
    }

    /// Hands out the serial for the next actor.
    pub(crate) fn allocate_serial(&mut self) -> u64 {
        self.next_serial += 1;
        self.next_serial
    }

    /// Checks that `id` may be registered right now.
    pub(crate) fn admit(&self, id: &RunnerId) -> Result<(), DispatchError> {
        if id.is_empty() {
            return Err(DispatchError::InvalidRunnerId);
        }
        if !self.accepting {
            return Err(DispatchError::ShuttingDown {
                runner_id: id.clone(),
            });
        }
        if self.entries.contains_key(id) {
            return Err(DispatchError::AlreadyRegistered {
                runner_id: id.clone(),
            });
        }
        Ok(())
    }

    /// Stores a registration; fails if the id is not admissible.
    pub(crate) fn insert(&mut self, id: RunnerId, reg: Registration) -> Result<(), DispatchError> {
        self.admit(&id)?;
        self.entries.insert(id, reg);
        Ok(())
    }

    pub(crate) fn get(&self, id: &str) -> Option<&Registration> {
        self.entries.get(id)
    }

    /// Returns the registration of `id` only if it belongs to actor `serial`.
    pub(crate) fn owned_by(&self, id: &str, serial: u64) -> Option<&Registration> {
        self.entries.get(id).filter(|reg| reg.serial == serial)
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<Registration> {
        self.entries.remove(id)
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Returns sorted runner ids.
    pub(crate) fn ids(&self) -> Vec<RunnerId> {
        let mut ids: Vec<RunnerId> = self.entries.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Stops accepting registrations.
    pub(crate) fn close(&mut self) {
        self.accepting = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runners::ChannelAction;

    fn registration(serial: u64) -> Registration {
        let (actor, _mailbox) = ActorHandle::channel();
        let (action, _rx) = ChannelAction::channel();
        Registration {
            actor,
            action,
            serial,
        }
    }

    #[test]
    fn rejects_duplicates() {
        let mut reg = Registry::new();
        reg.insert("a".into(), registration(0)).expect("first");
        let err = reg.insert("a".into(), registration(0)).expect_err("dup");
        assert_eq!(err.as_label(), "dispatch_already_registered");
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn rejects_empty_ids() {
        let reg = Registry::new();
        let err = reg.admit(&RunnerId::from("")).expect_err("empty");
        assert!(matches!(err, DispatchError::InvalidRunnerId));
    }

    #[test]
    fn remove_is_idempotent() {
        let mut reg = Registry::new();
        reg.insert("a".into(), registration(0)).expect("insert");
        assert!(reg.remove("a").is_some());
        assert!(reg.remove("a").is_none());
        assert!(!reg.contains("a"));
    }

    #[test]
    fn closed_registry_rejects_everything() {
        let mut reg = Registry::new();
        reg.close();
        let err = reg.insert("b".into(), registration(0)).expect_err("closed");
        assert!(matches!(err, DispatchError::ShuttingDown { .. }));
    }

    #[test]
    fn ownership_follows_the_serial() {
        let mut reg = Registry::new();
        let old = reg.allocate_serial();
        reg.insert("a".into(), registration(old)).expect("insert");
        assert!(reg.owned_by("a", old).is_some());

        reg.remove("a");
        let new = reg.allocate_serial();
        assert_ne!(old, new);
        reg.insert("a".into(), registration(new)).expect("re-insert");
        assert!(reg.owned_by("a", old).is_none());
        assert!(reg.owned_by("a", new).is_some());
    }

    #[test]
    fn ids_are_sorted() {
        let mut reg = Registry::new();
        for id in ["c", "a", "b"] {
            reg.insert(id.into(), registration(0)).expect("insert");
        }
        let ids: Vec<String> = reg.ids().iter().map(|id| id.to_string()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
