// Copyright 2024-2026 Actorhost Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

//! Actor identity, node addresses, and the 128-bit random id generator
//! shared by the runtime identity string and observer ids.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::RwLock;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// `(interfaceId, actorId)`. Keys the activation registry and the
/// serializer. `actor_id == None` is the "no ordering required" null key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorIdentity {
    pub interface_id: u32,
    pub actor_id: Option<String>,
}

impl ActorIdentity {
    pub fn new(interface_id: u32, actor_id: impl Into<String>) -> Self {
        Self {
            interface_id,
            actor_id: Some(actor_id.into()),
        }
    }
}

impl std::fmt::Display for ActorIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.actor_id {
            Some(id) => write!(f, "{}/{id}", self.interface_id),
            None => write!(f, "{}/-", self.interface_id),
        }
    }
}

/// Host/port (or transport-specific) address of a node in the cluster, as
/// returned by the `Locator`. Opaque to this crate beyond equality.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAddress(pub String);

impl std::fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An addressable stub describing an `ActorIdentity`. Cheap to clone (the
/// resolved address is shared, interior-mutable state); producing one never
/// touches the network (§6, `getReference`).
#[derive(Clone, Debug)]
pub struct Reference {
    pub identity: ActorIdentity,
    address: Arc<RwLock<Option<NodeAddress>>>,
}

impl Reference {
    pub fn new(identity: ActorIdentity) -> Self {
        Self {
            identity,
            address: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_address(identity: ActorIdentity, address: NodeAddress) -> Self {
        Self {
            identity,
            address: Arc::new(RwLock::new(Some(address))),
        }
    }

    pub fn address(&self) -> Option<NodeAddress> {
        self.address.read().clone()
    }

    pub fn set_address(&self, address: NodeAddress) {
        *self.address.write() = Some(address);
    }
}

/// Generates the 22-char URL-safe-base64 text form of 16 random bytes used
/// both for the runtime identity suffix and for freshly allocated observer
/// ids (§6: the two code paths share one generator).
pub fn random_id_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// `Name[<22-char base64 of 16 random bytes>]`.
pub fn runtime_identity(system_name: &str) -> String {
    format!("{system_name}[{}]", random_id_token())
}
