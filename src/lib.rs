// Copyright 2024-2026 Actorhost Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

//! A single-node virtual-actor execution engine: per-identity serialized
//! dispatch, lazy activation with lifecycle hooks, idle eviction, and
//! weakly-held observer callbacks, bridged to an embedding application's own
//! transport, placement, and storage layers.
//!
//! Cluster membership ([`providers::Locator`]), wire transport
//! ([`providers::Messenger`]), persistence ([`providers::StorageProvider`]),
//! and class discovery ([`providers::ClassFinder`]/[`providers::ReferenceFactory`])
//! are all external collaborators this crate calls through traits; it never
//! implements them itself.

pub mod clock;
pub mod config;
pub mod counters;
pub mod dispatch;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod providers;
pub mod registry;
pub mod runtime;
pub mod serializer;
pub mod timers;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::RuntimeConfig;
pub use error::{Result, RuntimeError};
pub use identity::{ActorIdentity, NodeAddress, Reference};
pub use runtime::{Runtime, RuntimeBuilder};
