// Copyright 2024-2026 Actorhost Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

//! `InterfaceDescriptor` and the registry mapping interface ids to them
//! (§3, §4.2). `cannotActivate` caching (property 7) is implemented with a
//! `OnceLock` so the `ClassFinder` runs at most once per descriptor no
//! matter how many concurrent first-touches race to resolve it.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::providers::{ActorFactory, ClassFinder, Dispatcher, ReferenceFactory};

/// Whether an actor interface permits one activation per identity
/// (`Singleton`) or a pool of interchangeable ones (`StatelessWorker`).
/// Irrelevant for observer interfaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActorFlavor {
    Singleton,
    StatelessWorker,
}

pub struct InterfaceDescriptor {
    pub interface_id: u32,
    pub is_observer: bool,
    pub flavor: ActorFlavor,
    pub reference_factory: Arc<dyn ReferenceFactory>,
    pub dispatcher: Arc<dyn Dispatcher>,
    concrete_class_name: String,
    resolved_factory: OnceLock<Option<ActorFactory>>,
}

impl InterfaceDescriptor {
    pub fn new(
        interface_id: u32,
        is_observer: bool,
        flavor: ActorFlavor,
        reference_factory: Arc<dyn ReferenceFactory>,
        dispatcher: Arc<dyn Dispatcher>,
        concrete_class_name: impl Into<String>,
    ) -> Self {
        Self {
            interface_id,
            is_observer,
            flavor,
            reference_factory,
            dispatcher,
            concrete_class_name: concrete_class_name.into(),
            resolved_factory: OnceLock::new(),
        }
    }

    /// Resolves (and caches) the `ActorFactory` for this descriptor's
    /// concrete class via `finder`, calling it at most once regardless of
    /// how many callers race here (§4.2 step 1, property 7).
    pub fn resolve_factory(&self, finder: &dyn ClassFinder) -> Option<ActorFactory> {
        self.resolved_factory
            .get_or_init(|| finder.find(self.interface_id, &self.concrete_class_name))
            .clone()
    }

    /// `true` once `resolve_factory` has run and found nothing. Unresolved
    /// descriptors report `false` (not yet known either way).
    pub fn cannot_activate(&self) -> bool {
        matches!(self.resolved_factory.get(), Some(None))
    }
}

impl std::fmt::Debug for InterfaceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterfaceDescriptor")
            .field("interface_id", &self.interface_id)
            .field("is_observer", &self.is_observer)
            .field("flavor", &self.flavor)
            .field("concrete_class_name", &self.concrete_class_name)
            .finish()
    }
}

/// Maps interface ids to descriptors (§3).
#[derive(Default)]
pub struct InterfaceRegistry {
    descriptors: RwLock<HashMap<u32, Arc<InterfaceDescriptor>>>,
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, descriptor: InterfaceDescriptor) -> Arc<InterfaceDescriptor> {
        let descriptor = Arc::new(descriptor);
        self.descriptors
            .write()
            .insert(descriptor.interface_id, descriptor.clone());
        descriptor
    }

    pub fn get(&self, interface_id: u32) -> Option<Arc<InterfaceDescriptor>> {
        self.descriptors.read().get(&interface_id).cloned()
    }
}
