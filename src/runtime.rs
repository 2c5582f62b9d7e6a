// Copyright 2024-2026 Actorhost Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

//! The top-level handle an embedding application builds once and shares:
//! `start`/`stop`, reference minting, observer installation, and timers
//! (§6 "Runtime control surface").

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::try_join_all;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::config::RuntimeConfig;
use crate::counters::Counters;
use crate::dispatch::inbound::InboundDispatcher;
use crate::dispatch::outbound::OutboundInvoker;
use crate::error::RuntimeError;
use crate::identity::{runtime_identity, ActorIdentity, NodeAddress, Reference};
use crate::providers::{
    Actor, ClassFinder, Dispatcher, InvokeHookProvider, InvokeListenerProvider, LifetimeProvider, Locator,
    Messenger, ReferenceFactory, StorageProvider,
};
use crate::registry::activation::ActivationRegistry;
use crate::registry::interface::{ActorFlavor, InterfaceDescriptor, InterfaceRegistry};
use crate::registry::observer::ObserverRegistry;
use crate::serializer::ExecutionSerializer;
use crate::timers::{self, BackgroundTimers, EvictionScan, TimerCallback, TimerHandle};

/// The well-known identity of the reminder controller actor every
/// `registerReminder`/`unregisterReminder` call is forwarded to. No
/// implementation of that actor lives in this crate (reminders are out of
/// scope); this is purely the client-side forwarding stub named in §6/§9.
pub const REMINDER_CONTROLLER_ID: &str = "0";

/// The well-known interface id under which `start()` registers the hosting
/// façade as an observer with an empty id (§6), so remote callers have a
/// stable, always-present identity to address on this node without the
/// embedding application registering anything itself.
pub const HOST_FACADE_INTERFACE_ID: u32 = u32::MAX;

/// The hosting façade object itself. It has no behavior of its own; its
/// only job is to be a live `Arc<dyn Actor>` the observer registry can hold
/// a weak reference to, so `installObserver`'s empty-id slot is always
/// resolvable for the runtime's own lifetime.
struct HostFacade;

#[async_trait]
impl Actor for HostFacade {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

tokio::task_local! {
    static CURRENT_RUNTIME: std::sync::Weak<Runtime>;
}

/// Everything needed to construct a [`Runtime`]; every field besides
/// `config` has a sensible in-process default so tests can build one with a
/// handful of overrides.
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    messenger: Option<Arc<dyn Messenger>>,
    locator: Option<Arc<dyn Locator>>,
    finder: Option<Arc<dyn ClassFinder>>,
    storage: Option<Arc<dyn StorageProvider>>,
    clock: Arc<dyn Clock>,
    lifetime_providers: Vec<Arc<dyn LifetimeProvider>>,
    invoke_listeners: Vec<Arc<dyn InvokeListenerProvider>>,
    invoke_hook: Option<Arc<dyn InvokeHookProvider>>,
    local_address: NodeAddress,
}

impl RuntimeBuilder {
    pub fn new(config: RuntimeConfig, local_address: NodeAddress) -> Self {
        Self {
            config,
            messenger: None,
            locator: None,
            finder: None,
            storage: None,
            clock: Arc::new(SystemClock),
            lifetime_providers: Vec::new(),
            invoke_listeners: Vec::new(),
            invoke_hook: None,
            local_address,
        }
    }

    pub fn messenger(mut self, messenger: Arc<dyn Messenger>) -> Self {
        self.messenger = Some(messenger);
        self
    }

    pub fn locator(mut self, locator: Arc<dyn Locator>) -> Self {
        self.locator = Some(locator);
        self
    }

    pub fn finder(mut self, finder: Arc<dyn ClassFinder>) -> Self {
        self.finder = Some(finder);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn StorageProvider>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn lifetime_provider(mut self, provider: Arc<dyn LifetimeProvider>) -> Self {
        self.lifetime_providers.push(provider);
        self
    }

    pub fn invoke_listener(mut self, listener: Arc<dyn InvokeListenerProvider>) -> Self {
        self.invoke_listeners.push(listener);
        self
    }

    pub fn invoke_hook(mut self, hook: Arc<dyn InvokeHookProvider>) -> Self {
        self.invoke_hook = Some(hook);
        self
    }

    pub fn build(self) -> Result<Arc<Runtime>, RuntimeError> {
        let messenger = self
            .messenger
            .ok_or_else(|| RuntimeError::ConfigError("RuntimeBuilder requires a Messenger".into()))?;
        let locator = self
            .locator
            .ok_or_else(|| RuntimeError::ConfigError("RuntimeBuilder requires a Locator".into()))?;
        let finder = self
            .finder
            .ok_or_else(|| RuntimeError::ConfigError("RuntimeBuilder requires a ClassFinder".into()))?;

        let interfaces = Arc::new(InterfaceRegistry::new());
        let activations = Arc::new(ActivationRegistry::new());
        let observers = Arc::new(ObserverRegistry::new());
        let serializer = ExecutionSerializer::<ActorIdentity>::new();
        let counters = Arc::new(Counters::default());

        let inbound = Arc::new(InboundDispatcher {
            interfaces: interfaces.clone(),
            activations: activations.clone(),
            observers: observers.clone(),
            serializer: serializer.clone(),
            messenger: messenger.clone(),
            counters: counters.clone(),
            config: self.config.clone(),
            clock: self.clock.clone(),
            finder: finder.clone(),
            storage: self.storage.clone(),
            lifetime_providers: self.lifetime_providers.clone(),
        });

        let outbound = Arc::new(OutboundInvoker {
            messenger: messenger.clone(),
            locator: locator.clone(),
            invoke_listeners: self.invoke_listeners,
            invoke_hook: self.invoke_hook,
            trace_enabled: self.config.trace_enabled,
        });

        let identity = runtime_identity(&self.config.system_name);

        Ok(Arc::new(Runtime {
            identity,
            config: self.config,
            local_address: self.local_address,
            interfaces,
            activations,
            observers,
            serializer,
            inbound,
            outbound,
            counters,
            clock: self.clock,
            finder,
            storage: self.storage,
            lifetime_providers: self.lifetime_providers,
            messenger,
            timers: Mutex::new(None),
            host_facade: Arc::new(HostFacade),
        }))
    }
}

pub struct Runtime {
    identity: String,
    config: RuntimeConfig,
    local_address: NodeAddress,
    interfaces: Arc<InterfaceRegistry>,
    activations: Arc<ActivationRegistry>,
    observers: Arc<ObserverRegistry>,
    serializer: Arc<ExecutionSerializer<ActorIdentity>>,
    inbound: Arc<InboundDispatcher>,
    outbound: Arc<OutboundInvoker>,
    counters: Arc<Counters>,
    clock: Arc<dyn Clock>,
    finder: Arc<dyn ClassFinder>,
    storage: Option<Arc<dyn StorageProvider>>,
    lifetime_providers: Vec<Arc<dyn LifetimeProvider>>,
    messenger: Arc<dyn Messenger>,
    timers: Mutex<Option<BackgroundTimers>>,
    host_facade: Arc<HostFacade>,
}

impl Runtime {
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn inbound(&self) -> &Arc<InboundDispatcher> {
        &self.inbound
    }

    pub fn outbound(&self) -> &Arc<OutboundInvoker> {
        &self.outbound
    }

    /// Registers an interface's dispatch vocabulary (§3 `InterfaceDescriptor`).
    pub fn register_interface(
        &self,
        interface_id: u32,
        is_observer: bool,
        flavor: ActorFlavor,
        reference_factory: Arc<dyn ReferenceFactory>,
        dispatcher: Arc<dyn Dispatcher>,
        concrete_class_name: impl Into<String>,
    ) -> Arc<InterfaceDescriptor> {
        self.interfaces.register(InterfaceDescriptor::new(
            interface_id,
            is_observer,
            flavor,
            reference_factory,
            dispatcher,
            concrete_class_name,
        ))
    }

    fn eviction_scan(&self) -> Arc<EvictionScan> {
        Arc::new(EvictionScan {
            activations: self.activations.clone(),
            observers: self.observers.clone(),
            serializer: self.serializer.clone(),
            lifetime_providers: self.lifetime_providers.clone(),
            clock: self.clock.clone(),
            max_queue_size: self.config.max_queue_size,
        })
    }

    /// `start()` (§6): registers the hosting façade as an observer with an
    /// empty id, starts every `LifetimeProvider`, then schedules the
    /// idle-eviction scan and the message-timeout sweep.
    pub async fn start(self: &Arc<Self>) -> Result<(), RuntimeError> {
        info!(identity = %self.identity, "runtime starting");
        self.observers.install(
            ActorIdentity::new(HOST_FACADE_INTERFACE_ID, String::new()),
            self.host_facade.clone() as Arc<dyn Actor>,
        )?;
        try_join_all(self.lifetime_providers.iter().map(|p| p.start())).await?;

        let background = BackgroundTimers::start(
            self.eviction_scan(),
            self.config.cleanup_interval,
            self.config.idle_ttl,
            self.messenger.clone(),
            self.config.message_timeout_sweep,
        );
        *self.timers.lock() = Some(background);
        Ok(())
    }

    /// Runs one `evictIdle` pass immediately instead of waiting for the next
    /// `cleanup_interval` tick. Exposed both for callers that want eviction
    /// on a signal other than the timer and for deterministic tests driven
    /// by a [`crate::clock::Clock`] they control directly.
    pub async fn evict_idle(&self) {
        self.eviction_scan().scan(self.config.idle_ttl).await;
    }

    /// `stop()` (§6): cancels timers, then stops every `LifetimeProvider`.
    pub async fn stop(&self) -> Result<(), RuntimeError> {
        if let Some(background) = self.timers.lock().take() {
            background.stop();
        }
        try_join_all(self.lifetime_providers.iter().map(|p| p.stop())).await?;
        info!(identity = %self.identity, "runtime stopped");
        Ok(())
    }

    /// `getReference(interface, id)` (§6): never touches the network.
    pub fn get_reference(&self, interface_id: u32, id: impl Into<String>) -> Result<Reference, RuntimeError> {
        let descriptor = self
            .interfaces
            .get(interface_id)
            .ok_or(RuntimeError::NoImplementation(interface_id))?;
        Ok(descriptor.reference_factory.create(ActorIdentity::new(interface_id, id)))
    }

    /// `getObserverReference(interfaceHint?, observer, id?)` (§4.4, §6).
    pub fn get_observer_reference(
        &self,
        interface_id: u32,
        observer: Arc<dyn Actor>,
        id: Option<String>,
    ) -> Result<Reference, RuntimeError> {
        if let Some(existing) = self.observers.find_existing(&observer) {
            if let Some(requested) = &id {
                if existing.actor_id.as_deref() != Some(requested.as_str()) {
                    return Err(RuntimeError::ConfigError(format!(
                        "observer is already installed under a different id ({existing})"
                    )));
                }
            }
            let descriptor = self
                .interfaces
                .get(existing.interface_id)
                .ok_or(RuntimeError::NoImplementation(existing.interface_id))?;
            return Ok(descriptor.reference_factory.create(existing));
        }

        let descriptor = self.interfaces.get(interface_id).ok_or(RuntimeError::NoImplementation(interface_id))?;
        let observer_id = id.unwrap_or_else(crate::identity::random_id_token);
        let identity = ActorIdentity::new(interface_id, observer_id);

        self.observers.install(identity.clone(), observer)?;
        let reference = descriptor.reference_factory.create(identity);
        reference.set_address(self.local_address.clone());
        Ok(reference)
    }

    /// `registerTimer(actor, callable, dueTime, period)` (§6).
    pub fn register_timer(
        &self,
        identity: ActorIdentity,
        callback: TimerCallback,
        due_time: Duration,
        period: Duration,
    ) -> TimerHandle {
        timers::register_timer(self.serializer.clone(), identity, callback, due_time, period, self.config.max_queue_size)
    }

    fn reminder_controller(&self, reminder_interface_id: u32) -> Result<Reference, RuntimeError> {
        self.get_reference(reminder_interface_id, REMINDER_CONTROLLER_ID)
    }

    /// `registerReminder` (§6, §9): forwarded to the well-known reminder
    /// controller actor. No controller implementation ships with this
    /// crate; the call only succeeds if the embedding application's
    /// `Locator`/`Messenger` route it somewhere that implements one.
    pub async fn register_reminder(&self, reminder_interface_id: u32, method_id: u32, args: Value) -> Result<Value, RuntimeError> {
        let target = self.reminder_controller(reminder_interface_id)?;
        self.outbound.invoke(&target, method_id, args, false).await
    }

    pub async fn unregister_reminder(&self, reminder_interface_id: u32, method_id: u32, args: Value) -> Result<Value, RuntimeError> {
        let target = self.reminder_controller(reminder_interface_id)?;
        self.outbound.invoke(&target, method_id, args, false).await
    }

    /// `bind()` (§6): runs `fut` with this runtime as the ambient current
    /// one, so user code constructing references during `fut` defaults to
    /// it via [`Runtime::current`].
    pub async fn bind<F: Future>(self: &Arc<Self>, fut: F) -> F::Output {
        CURRENT_RUNTIME.scope(Arc::downgrade(self), fut).await
    }

    /// The runtime bound via [`Runtime::bind`] on the current task, if any.
    pub fn current() -> Option<Arc<Runtime>> {
        CURRENT_RUNTIME.try_with(|weak| weak.upgrade()).ok().flatten()
    }

    /// `bind(object)` (§6): rebinds an existing reference's address to this
    /// node, as when an activation hands out a reference to itself.
    pub fn bind_reference(&self, reference: &Reference) {
        reference.set_address(self.local_address.clone());
    }

    /// Delivers a wire message through the inbound path (§4.3). The
    /// embedding application's `Messenger` implementation calls this from
    /// whatever transport callback it receives messages on.
    pub async fn on_message_received(
        self: &Arc<Self>,
        from: NodeAddress,
        oneway: bool,
        message_id: u64,
        interface_id: u32,
        method_id: u32,
        key: Option<String>,
        args: Value,
    ) {
        self.inbound.on_message_received(from, oneway, message_id, interface_id, method_id, key, args).await;
    }
}
