// Copyright 2024-2026 Actorhost Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

//! Fakes shared by unit tests and `tests/scenarios.rs`. Not built for
//! non-test consumers (see `[dev-dependencies]`-only use in `lib.rs`).

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::clock::Clock;
use crate::error::RuntimeError;
use crate::identity::{ActorIdentity, NodeAddress, Reference};
use crate::providers::{
    Actor, ActorFactory, ClassFinder, Dispatcher, LifetimeProvider, Locator, Messenger,
    ReferenceFactory, ResponseKind, StorageProvider,
};

/// A `Clock` an owning test advances explicitly instead of sleeping.
#[derive(Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self { millis: AtomicU64::new(start) }
    }

    pub fn advance(&self, by: u64) {
        self.millis.fetch_add(by, Ordering::SeqCst);
    }

    pub fn set(&self, value: u64) {
        self.millis.store(value, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// Builds a bare, address-less [`Reference`] for the identity. Good enough
/// wherever a test doesn't care about placement.
pub struct FakeReferenceFactory;

impl ReferenceFactory for FakeReferenceFactory {
    fn create(&self, identity: ActorIdentity) -> Reference {
        Reference::new(identity)
    }
}

/// Echoes back whatever `args` it was given. Most registry-level tests
/// never actually invoke through the dispatcher, so this exists mainly to
/// satisfy `InterfaceDescriptor::new`'s signature.
#[derive(Default)]
pub struct FakeDispatcher;

#[async_trait]
impl Dispatcher for FakeDispatcher {
    async fn invoke(&self, _instance: &dyn Actor, _method_id: u32, args: Value) -> Result<Value, RuntimeError> {
        Ok(args)
    }
}

/// A `ClassFinder` that always returns `None`, counting how many times it
/// was actually asked — used to assert the resolved-factory cache only
/// consults the finder once (property 7).
pub struct NeverFinder {
    pub calls: Arc<AtomicUsize>,
}

impl ClassFinder for NeverFinder {
    fn find(&self, _interface_id: u32, _concrete_class_name: &str) -> Option<ActorFactory> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        None
    }
}

/// A `ClassFinder` keyed by `(interfaceId, className)` that hands back a
/// caller-supplied factory, or `None` for anything not registered.
#[derive(Default)]
pub struct MapFinder {
    factories: Mutex<HashMap<(u32, String), ActorFactory>>,
}

impl MapFinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, interface_id: u32, class_name: impl Into<String>, factory: ActorFactory) {
        self.factories.lock().insert((interface_id, class_name.into()), factory);
    }
}

impl ClassFinder for MapFinder {
    fn find(&self, interface_id: u32, concrete_class_name: &str) -> Option<ActorFactory> {
        self.factories.lock().get(&(interface_id, concrete_class_name.to_string())).cloned()
    }
}

/// A plain actor instance that records every lifecycle callback it
/// receives, and can be made to fail any one of them on command.
#[derive(Default)]
pub struct RecordingActor {
    pub bound: Mutex<Option<Reference>>,
    pub read_state_calls: AtomicUsize,
    pub activate_calls: AtomicUsize,
    pub deactivate_calls: AtomicUsize,
    pub fail_activate: std::sync::atomic::AtomicBool,
    pub fail_read_state: std::sync::atomic::AtomicBool,
    pub fail_deactivate: std::sync::atomic::AtomicBool,
}

impl RecordingActor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl Actor for RecordingActor {
    fn bind(&self, reference: Reference) {
        *self.bound.lock() = Some(reference);
    }

    async fn read_state(&self) -> Result<(), RuntimeError> {
        self.read_state_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_read_state.load(Ordering::SeqCst) {
            return Err(RuntimeError::ActivationFailure {
                identity: ActorIdentity::new(0, "unused"),
                source: anyhow::anyhow!("read_state failed"),
            });
        }
        Ok(())
    }

    async fn activate(&self) -> Result<(), RuntimeError> {
        self.activate_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_activate.load(Ordering::SeqCst) {
            return Err(RuntimeError::ActivationFailure {
                identity: ActorIdentity::new(0, "unused"),
                source: anyhow::anyhow!("activate failed"),
            });
        }
        Ok(())
    }

    async fn deactivate(&self) -> Result<(), RuntimeError> {
        self.deactivate_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_deactivate.load(Ordering::SeqCst) {
            return Err(RuntimeError::ActivationFailure {
                identity: ActorIdentity::new(0, "unused"),
                source: anyhow::anyhow!("deactivate failed"),
            });
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Records every message/response sent through it; `locate` and `invoke`
/// answers are pre-programmed.
/// `(to, message_id, kind label, message text)`. The label is one of
/// `"normal"`/`"exception"`/`"error"`; the text is the exception/error
/// payload, or `None` for normal responses.
pub type RecordedResponse = (NodeAddress, u64, String, Option<String>);

#[derive(Default)]
pub struct FakeMessenger {
    pub sent_messages: Mutex<Vec<(NodeAddress, u32, u32, Option<String>)>>,
    pub sent_responses: Mutex<Vec<RecordedResponse>>,
    pub next_reply: Mutex<Option<Value>>,
}

#[async_trait]
impl Messenger for FakeMessenger {
    async fn send_message(
        &self,
        to: NodeAddress,
        _oneway: bool,
        interface_id: u32,
        method_id: u32,
        actor_id: Option<String>,
        _args: Value,
    ) -> Result<Value, RuntimeError> {
        self.sent_messages.lock().push((to, interface_id, method_id, actor_id));
        Ok(self.next_reply.lock().take().unwrap_or(Value::Null))
    }

    async fn send_response(&self, to: NodeAddress, message_id: u64, kind: ResponseKind) -> Result<(), RuntimeError> {
        let (label, text) = match &kind {
            ResponseKind::Normal(_) => ("normal", None),
            ResponseKind::Exception(msg) => ("exception", Some(msg.clone())),
            ResponseKind::Error(msg) => ("error", Some(msg.clone())),
        };
        self.sent_responses.lock().push((to, message_id, label.to_string(), text));
        Ok(())
    }
}

/// Always resolves to the same fixed address, or errors if none was set.
#[derive(Default)]
pub struct FakeLocator {
    pub address: Mutex<Option<NodeAddress>>,
}

impl FakeLocator {
    pub fn fixed(address: NodeAddress) -> Self {
        Self { address: Mutex::new(Some(address)) }
    }
}

#[async_trait]
impl Locator for FakeLocator {
    async fn locate(&self, _reference: &Reference) -> Result<NodeAddress, RuntimeError> {
        self.address
            .lock()
            .clone()
            .ok_or_else(|| RuntimeError::ConfigError("FakeLocator has no address configured".into()))
    }
}

/// In-memory key/value `StorageProvider`.
#[derive(Default)]
pub struct FakeStorageProvider {
    state: Mutex<HashMap<ActorIdentity, Value>>,
}

#[async_trait]
impl StorageProvider for FakeStorageProvider {
    async fn read_state(&self, identity: &ActorIdentity) -> Result<Value, RuntimeError> {
        Ok(self.state.lock().get(identity).cloned().unwrap_or(Value::Null))
    }

    async fn write_state(&self, identity: &ActorIdentity, state: Value) -> Result<(), RuntimeError> {
        self.state.lock().insert(identity.clone(), state);
        Ok(())
    }
}

/// Counts each lifecycle hook invocation so tests can assert ordering and
/// concurrency (all `pre_activation`/`post_activation` hooks installed must
/// run, per `futures::future::try_join_all`).
#[derive(Default)]
pub struct CountingLifetimeProvider {
    pub pre_activation_calls: AtomicUsize,
    pub post_activation_calls: AtomicUsize,
    pub pre_deactivation_calls: AtomicUsize,
    pub post_deactivation_calls: AtomicUsize,
}

#[async_trait]
impl LifetimeProvider for CountingLifetimeProvider {
    async fn pre_activation(&self, _instance: &dyn Actor) -> Result<(), RuntimeError> {
        self.pre_activation_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn post_activation(&self, _instance: &dyn Actor) -> Result<(), RuntimeError> {
        self.post_activation_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn pre_deactivation(&self, _instance: &dyn Actor) -> Result<(), RuntimeError> {
        self.pre_deactivation_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn post_deactivation(&self, _instance: &dyn Actor) -> Result<(), RuntimeError> {
        self.post_deactivation_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
