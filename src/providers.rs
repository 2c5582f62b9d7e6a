// Copyright 2024-2026 Actorhost Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

//! The seams to every external collaborator named in §1: `Locator`,
//! `Messenger`, `StorageProvider`, `ReferenceFactory`/`ClassFinder` (the
//! `FactoryProvider`'s two responsibilities, split into two traits because
//! this crate never needs them together), and the lifecycle/invoke hook
//! groups. None of these have a production implementation in this crate —
//! they're the contract an embedding application plugs into. `tests/` and
//! [`crate::test_support`] provide fakes.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RuntimeError;
use crate::identity::{ActorIdentity, NodeAddress, Reference};

/// A user actor or observer instance. Generated dispatchers receive `&dyn
/// Actor` and downcast via [`Actor::as_any`] to the concrete type they were
/// generated for — there is no runtime reflection in Rust to fall back on
/// (§9, "Reflection-driven dispatch").
#[async_trait]
pub trait Actor: Send + Sync {
    /// Bind this instance to its reference once activation begins.
    fn bind(&self, _reference: Reference) {}

    /// `instance.storage = first StorageProvider` (§4.2 step 2). Only
    /// called when a `StorageProvider` is configured; the instance is
    /// expected to hold onto it and use it from [`Actor::read_state`].
    fn bind_storage(&self, _storage: Arc<dyn StorageProvider>) {}

    /// Load persisted state. Only called when a `StorageProvider` is
    /// attached (§4.2 step 4). Default no-op for observers and actors with
    /// no durable state.
    async fn read_state(&self) -> Result<(), RuntimeError> {
        Ok(())
    }

    /// `activateAsync` (§4.2 step 5).
    async fn activate(&self) -> Result<(), RuntimeError> {
        Ok(())
    }

    /// `deactivateAsync` (§4.2 `evictIdle`).
    async fn deactivate(&self) -> Result<(), RuntimeError> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any;
}

/// Constructs a fresh instance of `descriptor.concreteClassName`. Rust has
/// no reflection, so this closure stands in for "reflectively construct an
/// instance" (§4.2 step 1).
pub type ActorFactory = Arc<dyn Fn() -> anyhow::Result<Arc<dyn Actor>> + Send + Sync>;

/// Given `(instance, methodId, args)`, invokes the method and returns its
/// result. Produced by an external code-generation step per interface; the
/// runtime only ever goes through this uniform contract (§9).
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn invoke(&self, instance: &dyn Actor, method_id: u32, args: Value) -> Result<Value, RuntimeError>;
}

/// Produces reference proxies for an interface (the `FactoryProvider`'s
/// reference-construction half, §3 `InterfaceDescriptor.factory`).
pub trait ReferenceFactory: Send + Sync {
    fn create(&self, identity: ActorIdentity) -> Reference;
}

/// Resolves `concreteClassName` to an [`ActorFactory`] for an interface that
/// hasn't been touched yet. Called at most once per descriptor; the result
/// (including `None`, meaning `cannotActivate`) is cached (§4.2, property 7).
pub trait ClassFinder: Send + Sync {
    fn find(&self, interface_id: u32, concrete_class_name: &str) -> Option<ActorFactory>;
}

/// Cluster membership / placement lookup. Consulted only when a reference's
/// address is unset (§4.5 step 4).
#[async_trait]
pub trait Locator: Send + Sync {
    async fn locate(&self, reference: &Reference) -> Result<NodeAddress, RuntimeError>;
}

/// Kind of a wire response (§6).
#[derive(Clone, Debug)]
pub enum ResponseKind {
    Normal(Value),
    Exception(String),
    Error(String),
}

/// Serializes/ships messages. Out of scope to implement for real; this
/// crate only calls through the trait (§1).
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(
        &self,
        to: NodeAddress,
        oneway: bool,
        interface_id: u32,
        method_id: u32,
        actor_id: Option<String>,
        args: Value,
    ) -> Result<Value, RuntimeError>;

    async fn send_response(
        &self,
        to: NodeAddress,
        message_id: u64,
        kind: ResponseKind,
    ) -> Result<(), RuntimeError>;

    /// Sweeps the Messenger's own pending-call table for timed-out
    /// invocations (§5). Invoked periodically by [`crate::timers`].
    async fn timeout_cleanup(&self) {}
}

/// Persistent state storage (§1, out of scope to implement).
#[async_trait]
pub trait StorageProvider: Send + Sync {
    async fn read_state(&self, identity: &ActorIdentity) -> Result<Value, RuntimeError>;
    async fn write_state(&self, identity: &ActorIdentity, state: Value) -> Result<(), RuntimeError>;
}

/// Hooks run around activation and deactivation (§4.2, §9). All default to
/// no-ops so a provider only needs to implement the phases it cares about.
#[async_trait]
pub trait LifetimeProvider: Send + Sync {
    async fn pre_activation(&self, _instance: &dyn Actor) -> Result<(), RuntimeError> {
        Ok(())
    }
    async fn post_activation(&self, _instance: &dyn Actor) -> Result<(), RuntimeError> {
        Ok(())
    }
    async fn pre_deactivation(&self, _instance: &dyn Actor) -> Result<(), RuntimeError> {
        Ok(())
    }
    async fn post_deactivation(&self, _instance: &dyn Actor) -> Result<(), RuntimeError> {
        Ok(())
    }
    /// Called once from `Runtime::start`.
    async fn start(&self) -> Result<(), RuntimeError> {
        Ok(())
    }
    /// Called once from `Runtime::stop`.
    async fn stop(&self) -> Result<(), RuntimeError> {
        Ok(())
    }
}

/// Fired around every outbound invocation when `traceEnabled` (§4.5, §6).
pub trait InvokeListenerProvider: Send + Sync {
    fn pre_invoke(&self, _trace_id: u64, _source: Option<&ActorIdentity>, _target: &Reference, _method_id: u32, _args: &Value) {}
    fn post_invoke(&self, _trace_id: u64, _result: &Result<Value, RuntimeError>) {}
}

/// When installed, takes over `OutboundInvoker::invoke` entirely instead of
/// routing through `sendMessage` (§4.5 step 3).
#[async_trait]
pub trait InvokeHookProvider: Send + Sync {
    async fn invoke(&self, target: &Reference, method_id: u32, args: Value, oneway: bool) -> Result<Value, RuntimeError>;
}
