// Copyright 2024-2026 Actorhost Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

//! `Activation`, `ReferenceEntry`, and the `ActivationRegistry` (§3, §4.2).
//! Orchestration that needs more than the map itself — the instantiate
//! sequence and the eviction scan — lives in [`crate::lifecycle`] and
//! [`crate::timers`] respectively; this module only owns the data
//! structure and the primitive check-out/check-in/evict operations.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::error;

use crate::identity::{ActorIdentity, Reference};
use crate::providers::Actor;
use crate::registry::interface::{ActorFlavor, InterfaceDescriptor};

/// Lifecycle state of an [`Activation`] (§4.6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActivationState {
    Vacant,
    Live,
    Deactivating,
    Retired,
}

/// A live-or-not-yet-live in-memory instance (§3).
pub struct Activation {
    pub instance: Option<Arc<dyn Actor>>,
    pub last_access: u64,
    pub state: ActivationState,
}

impl Activation {
    pub fn vacant(now: u64) -> Self {
        Self {
            instance: None,
            last_access: now,
            state: ActivationState::Vacant,
        }
    }

    pub fn touch(&mut self, now: u64) {
        self.last_access = now;
    }
}

enum Pool {
    Singleton(Mutex<Option<Activation>>),
    Worker(Mutex<VecDeque<Activation>>),
}

/// The registry record for one `ActorIdentity` that has touched this node
/// (§3). `flavor` is fixed at construction and never changes.
pub struct ReferenceEntry {
    pub reference: Reference,
    pub descriptor: Arc<InterfaceDescriptor>,
    pub flavor: ActorFlavor,
    pool: Pool,
    removable: AtomicBool,
}

impl ReferenceEntry {
    fn new(reference: Reference, descriptor: Arc<InterfaceDescriptor>) -> Self {
        let flavor = descriptor.flavor;
        let pool = match flavor {
            ActorFlavor::Singleton => Pool::Singleton(Mutex::new(None)),
            ActorFlavor::StatelessWorker => Pool::Worker(Mutex::new(VecDeque::new())),
        };
        Self {
            reference,
            descriptor,
            flavor,
            pool,
            removable: AtomicBool::new(false),
        }
    }

    pub fn removable(&self) -> bool {
        self.removable.load(Ordering::Relaxed)
    }

    pub fn set_removable(&self, value: bool) {
        self.removable.store(value, Ordering::Relaxed);
    }

    /// `checkOut` (§4.2). Singleton: takes the slot, or fabricates a fresh
    /// `Vacant` activation if it was empty. Worker: pops the tail of the
    /// pool (LIFO, hot-activation bias), or fabricates fresh if empty.
    pub fn check_out(&self, now: u64) -> Activation {
        match &self.pool {
            Pool::Singleton(slot) => slot.lock().take().unwrap_or_else(|| Activation::vacant(now)),
            Pool::Worker(pool) => pool.lock().pop_back().unwrap_or_else(|| Activation::vacant(now)),
        }
    }

    /// `checkIn` (§4.2), the inverse of `check_out`.
    pub fn check_in(&self, activation: Activation) {
        match &self.pool {
            Pool::Singleton(slot) => {
                let mut slot = slot.lock();
                if slot.is_some() {
                    error!(identity = %self.reference.identity, "check_in: singleton slot already occupied");
                }
                *slot = Some(activation);
            }
            Pool::Worker(pool) => pool.lock().push_back(activation),
        }
    }

    /// Takes the singleton's activation out only if it is present; used by
    /// the eviction scan to re-check staleness under the serializer slot
    /// before committing to deactivation. Returns `None` if the slot was
    /// empty (in-flight elsewhere, or already evicted).
    pub fn try_take_singleton(&self) -> Option<Activation> {
        match &self.pool {
            Pool::Singleton(slot) => slot.lock().take(),
            Pool::Worker(_) => None,
        }
    }

    /// Peeks whether the oldest activation (singleton slot, or pool head)
    /// is present and older than `cutoff`, without removing it. Used by the
    /// eviction scan to decide whether an identity is even a candidate
    /// (§4.2 `evictIdle`).
    pub fn oldest_is_stale(&self, cutoff: u64) -> bool {
        match &self.pool {
            Pool::Singleton(slot) => slot.lock().as_ref().is_some_and(|a| a.last_access < cutoff),
            Pool::Worker(pool) => pool.lock().front().is_some_and(|a| a.last_access < cutoff),
        }
    }

    /// Worker-pool-only: partitions the pool into activations that are
    /// stale (`lastAccess < cutoff`, returned for deactivation) and ones
    /// that are not (left in the pool, in their previous relative order —
    /// the "rotated to the tail" behavior from §4.2, since only relative
    /// order among survivors affects the pop-from-tail bias). No-op for
    /// singleton entries.
    pub fn evict_idle_workers(&self, cutoff: u64) -> Vec<Activation> {
        match &self.pool {
            Pool::Worker(pool) => {
                let mut pool = pool.lock();
                let mut survivors = VecDeque::with_capacity(pool.len());
                let mut evicted = Vec::new();
                for activation in pool.drain(..) {
                    if activation.last_access < cutoff {
                        evicted.push(activation);
                    } else {
                        survivors.push_back(activation);
                    }
                }
                *pool = survivors;
                evicted
            }
            Pool::Singleton(_) => Vec::new(),
        }
    }
}

/// Holds per-identity `ReferenceEntry`s; creates, caches, evicts
/// activations (§4.2).
#[derive(Default)]
pub struct ActivationRegistry {
    entries: RwLock<HashMap<ActorIdentity, Arc<ReferenceEntry>>>,
}

impl ActivationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `ensureEntry` (§4.2). Only one job at a time touches `identity`
    /// under the serializer, so a read-then-write-locked double-check is
    /// sufficient; contention is only against the eviction scan.
    pub fn ensure_entry(
        &self,
        identity: &ActorIdentity,
        descriptor: Arc<InterfaceDescriptor>,
    ) -> (Arc<ReferenceEntry>, bool) {
        if let Some(existing) = self.entries.read().get(identity) {
            return (existing.clone(), false);
        }
        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(identity) {
            return (existing.clone(), false);
        }
        let reference = descriptor.reference_factory.create(identity.clone());
        let entry = Arc::new(ReferenceEntry::new(reference, descriptor));
        entries.insert(identity.clone(), entry.clone());
        (entry, true)
    }

    pub fn get(&self, identity: &ActorIdentity) -> Option<Arc<ReferenceEntry>> {
        self.entries.read().get(identity).cloned()
    }

    /// Removes `identity` only if the currently registered entry is still
    /// `expected` (invariant 5 / the `localActors.get(key) != self` guard
    /// in §4.2).
    pub fn remove_if_same(&self, identity: &ActorIdentity, expected: &Arc<ReferenceEntry>) -> bool {
        let mut entries = self.entries.write();
        match entries.get(identity) {
            Some(current) if Arc::ptr_eq(current, expected) => {
                entries.remove(identity);
                true
            }
            _ => false,
        }
    }

    /// Snapshot of entries marked `removable` for the eviction scan to
    /// inspect (§4.2).
    pub fn removable_entries(&self) -> Vec<(ActorIdentity, Arc<ReferenceEntry>)> {
        self.entries
            .read()
            .iter()
            .filter(|(_, entry)| entry.removable())
            .map(|(identity, entry)| (identity.clone(), entry.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
