// Copyright 2024-2026 Actorhost Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

//! Observer bindings (§4.4). An observer is a reference to a (usually
//! client-side) object that actors push notifications to; the runtime only
//! holds a weak pointer to it so an observer that's dropped by its owner
//! doesn't keep the registry entry alive forever.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::error::RuntimeError;
use crate::identity::ActorIdentity;
use crate::providers::Actor;

/// One registered observer: its identity (interface id + generated
/// observer id) and a weak handle to the local instance.
struct Binding {
    instance: Weak<dyn Actor>,
}

/// Maps observer `ActorIdentity` to a weak handle to the local instance,
/// and (for `installObserver`'s idempotent-reinstall rule) a reverse map
/// from the instance's allocation address back to its identity (§4.4).
#[derive(Default)]
pub struct ObserverRegistry {
    bindings: RwLock<HashMap<ActorIdentity, Binding>>,
    reverse: RwLock<HashMap<usize, ActorIdentity>>,
}

fn instance_key(instance: &Arc<dyn Actor>) -> usize {
    Arc::as_ptr(instance) as *const () as usize
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The identity `instance` is already registered under, if any. Used by
    /// `installObserver` to implement "return the existing reference"
    /// idempotency without requiring the caller to know the id in advance.
    pub fn find_existing(&self, instance: &Arc<dyn Actor>) -> Option<ActorIdentity> {
        self.reverse.read().get(&instance_key(instance)).cloned()
    }

    /// `installObserver` (§4.4). Binds `identity` to `instance`. Re-binding
    /// the same identity to a *different* instance is a caller error
    /// (`ConfigError`); re-binding to an `Arc` that points at the exact same
    /// object is a no-op success, matching the "idempotent re-install"
    /// wording.
    pub fn install(&self, identity: ActorIdentity, instance: Arc<dyn Actor>) -> Result<(), RuntimeError> {
        let mut bindings = self.bindings.write();
        if let Some(existing) = bindings.get(&identity) {
            if let Some(current) = existing.instance.upgrade() {
                if !Arc::ptr_eq(&current, &instance) {
                    return Err(RuntimeError::ConfigError(format!(
                        "observer {identity} is already bound to a different instance"
                    )));
                }
                return Ok(());
            }
        }
        bindings.insert(identity.clone(), Binding { instance: Arc::downgrade(&instance) });
        self.reverse.write().insert(instance_key(&instance), identity);
        Ok(())
    }

    /// Resolves an observer identity to its live instance, pruning the
    /// entry if the owner has already dropped it.
    pub fn resolve(&self, identity: &ActorIdentity) -> Result<Arc<dyn Actor>, RuntimeError> {
        let upgraded = self.bindings.read().get(identity).and_then(|b| b.instance.upgrade());
        match upgraded {
            Some(instance) => Ok(instance),
            None => {
                self.bindings.write().remove(identity);
                Err(RuntimeError::ObserverGone)
            }
        }
    }

    pub fn remove(&self, identity: &ActorIdentity) {
        self.bindings.write().remove(identity);
        self.reverse.write().retain(|_, bound_identity| bound_identity != identity);
    }

    /// Drops every binding whose weak reference no longer upgrades. Run
    /// periodically by the eviction scan so bindings for long-gone
    /// observers don't accumulate (§4.2).
    pub fn prune_dead(&self) -> usize {
        let mut bindings = self.bindings.write();
        let before = bindings.len();
        bindings.retain(|_, binding| binding.instance.strong_count() > 0);
        let live: std::collections::HashSet<_> = bindings.keys().cloned().collect();
        self.reverse.write().retain(|_, identity| live.contains(identity));
        before - bindings.len()
    }

    pub fn len(&self) -> usize {
        self.bindings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingActor;

    fn observer_identity(id: &str) -> ActorIdentity {
        ActorIdentity::new(900, id)
    }

    #[test]
    fn install_then_resolve_round_trips() {
        let registry = ObserverRegistry::new();
        let identity = observer_identity("o1");
        let instance = RecordingActor::new();
        registry.install(identity.clone(), instance.clone() as Arc<dyn Actor>).unwrap();
        let resolved = registry.resolve(&identity).unwrap();
        assert!(Arc::ptr_eq(&resolved, &(instance as Arc<dyn Actor>)));
    }

    #[test]
    fn resolve_after_drop_is_observer_gone() {
        let registry = ObserverRegistry::new();
        let identity = observer_identity("o2");
        {
            let instance = RecordingActor::new();
            registry.install(identity.clone(), instance as Arc<dyn Actor>).unwrap();
        }
        let err = registry.resolve(&identity).unwrap_err();
        assert!(matches!(err, RuntimeError::ObserverGone));
        assert!(registry.is_empty(), "failed resolve should prune the dead entry");
    }

    #[test]
    fn reinstalling_a_different_instance_is_rejected() {
        let registry = ObserverRegistry::new();
        let identity = observer_identity("o3");
        let a = RecordingActor::new();
        let b = RecordingActor::new();
        registry.install(identity.clone(), a as Arc<dyn Actor>).unwrap();
        let err = registry.install(identity, b as Arc<dyn Actor>).unwrap_err();
        assert!(matches!(err, RuntimeError::ConfigError(_)));
    }

    #[test]
    fn reinstalling_the_same_instance_is_idempotent() {
        let registry = ObserverRegistry::new();
        let identity = observer_identity("o4");
        let a = RecordingActor::new();
        registry.install(identity.clone(), a.clone() as Arc<dyn Actor>).unwrap();
        registry.install(identity, a as Arc<dyn Actor>).unwrap();
    }

    #[test]
    fn find_existing_returns_the_bound_identity() {
        let registry = ObserverRegistry::new();
        let identity = observer_identity("o5");
        let instance = RecordingActor::new() as Arc<dyn Actor>;
        assert!(registry.find_existing(&instance).is_none());
        registry.install(identity.clone(), instance.clone()).unwrap();
        assert_eq!(registry.find_existing(&instance), Some(identity));
    }

    #[test]
    fn prune_dead_removes_only_dropped_bindings() {
        let registry = ObserverRegistry::new();
        let alive = RecordingActor::new();
        registry.install(observer_identity("alive"), alive.clone() as Arc<dyn Actor>).unwrap();
        {
            let gone = RecordingActor::new();
            registry.install(observer_identity("gone"), gone as Arc<dyn Actor>).unwrap();
        }
        let pruned = registry.prune_dead();
        assert_eq!(pruned, 1);
        assert_eq!(registry.len(), 1);
    }
}
