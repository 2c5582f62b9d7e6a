// Copyright 2024-2026 Actorhost Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

//! Wire message in, user method invoked, response out (§4.3).

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, instrument, warn};

use crate::clock::Clock;
use crate::config::RuntimeConfig;
use crate::counters::Counters;
use crate::dispatch::context::{self, MessageContext};
use crate::error::RuntimeError;
use crate::identity::{ActorIdentity, NodeAddress};
use crate::lifecycle::{self, ActivationDeps};
use crate::providers::{ClassFinder, LifetimeProvider, Messenger, ResponseKind, StorageProvider};
use crate::registry::activation::{ActivationRegistry, ReferenceEntry};
use crate::registry::interface::{ActorFlavor, InterfaceRegistry};
use crate::registry::observer::ObserverRegistry;
use crate::serializer::{ExecutionSerializer, Job};

/// Holds every collaborator the inbound path needs. Constructed once by
/// [`crate::runtime::Runtime`] and shared behind an `Arc`.
pub struct InboundDispatcher {
    pub interfaces: Arc<InterfaceRegistry>,
    pub activations: Arc<ActivationRegistry>,
    pub observers: Arc<ObserverRegistry>,
    pub serializer: Arc<ExecutionSerializer<ActorIdentity>>,
    pub messenger: Arc<dyn Messenger>,
    pub counters: Arc<Counters>,
    pub config: RuntimeConfig,
    pub clock: Arc<dyn Clock>,
    pub finder: Arc<dyn ClassFinder>,
    pub storage: Option<Arc<dyn StorageProvider>>,
    pub lifetime_providers: Vec<Arc<dyn LifetimeProvider>>,
}

impl InboundDispatcher {
    /// `onMessageReceived` (§4.3 step 1-4).
    #[instrument(skip(self, args), fields(interface_id, method_id))]
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
        self.counters.record_received();
        let identity = ActorIdentity { interface_id, actor_id: key };

        let this = self.clone();
        let from_for_job = from.clone();
        let identity_for_job = identity.clone();
        let job: Job = Box::pin(async move {
            this.handle(identity_for_job, from_for_job, oneway, message_id, method_id, args).await;
        });

        if !self.serializer.offer(Some(identity), job, self.config.max_queue_size) {
            self.counters.record_refused();
            if !oneway {
                self.deliver_response(from, message_id, ResponseKind::Error("Execution refused".into())).await;
            }
        }
    }

    /// `handle` (§4.3), serialized per identity by the caller's `offer`.
    async fn handle(
        self: Arc<Self>,
        identity: ActorIdentity,
        from: NodeAddress,
        oneway: bool,
        message_id: u64,
        method_id: u32,
        args: Value,
    ) {
        self.counters.record_handled();

        let Some(descriptor) = self.interfaces.get(identity.interface_id) else {
            if !oneway {
                self.deliver_response(
                    from,
                    message_id,
                    ResponseKind::Error(format!("No implementation for interface {}", identity.interface_id)),
                )
                .await;
            }
            return;
        };

        if descriptor.is_observer {
            let instance = match self.observers.resolve(&identity) {
                Ok(instance) => instance,
                Err(_) => {
                    if !oneway {
                        self.deliver_response(from, message_id, ResponseKind::Error("Observer no longer present".into())).await;
                    }
                    return;
                }
            };
            // `source` is the identity of the actor whose method is about to
            // run — i.e. this observer itself — so any outbound call it
            // makes during dispatch reports its own identity to trace
            // listeners (§4.5 step 1/2), not the caller's.
            let ctx = MessageContext {
                target: identity.clone(),
                source: Some(identity.clone()),
                from: Some(from.clone()),
                method_id,
                trace_id: context::next_trace_id(),
            };
            let result = context::with_context(ctx, descriptor.dispatcher.invoke(instance.as_ref(), method_id, args)).await;
            if !oneway {
                self.deliver_response(from, message_id, response_kind_for(result)).await;
            }
            return;
        }

        let (entry, created) = self.activations.ensure_entry(&identity, descriptor.clone());
        if created {
            entry.set_removable(true);
        }

        match entry.flavor {
            ActorFlavor::Singleton => {
                self.execute_message(identity, entry, from, oneway, message_id, method_id, args).await;
            }
            ActorFlavor::StatelessWorker => {
                // Per-identity serialization is unnecessary for workers: the
                // pool already gives each checked-out activation exclusive
                // use. Re-offering under a `None` key means per-identity
                // back-pressure granularity is lost here — only the shared
                // keyless queue's `maxQueueSize` bounds worker dispatch.
                let this = self.clone();
                let from_for_job = from.clone();
                let job: Job = Box::pin(async move {
                    this.execute_message(identity, entry, from_for_job, oneway, message_id, method_id, args).await;
                });
                if !self.serializer.offer(None, job, self.config.max_queue_size) {
                    self.counters.record_refused();
                    if !oneway {
                        self.deliver_response(from, message_id, ResponseKind::Error("Execution refused".into())).await;
                    }
                }
            }
        }
    }

    /// `executeMessage` (§4.3).
    async fn execute_message(
        self: Arc<Self>,
        identity: ActorIdentity,
        entry: Arc<ReferenceEntry>,
        from: NodeAddress,
        oneway: bool,
        message_id: u64,
        method_id: u32,
        args: Value,
    ) {
        // `source` is the identity of the actor about to run — itself — so
        // outbound calls made from inside its method report the calling
        // actor's identity to trace listeners (§4.5 step 1/2), not `None`.
        let ctx = MessageContext {
            target: identity.clone(),
            source: Some(identity.clone()),
            from: Some(from.clone()),
            method_id,
            trace_id: context::next_trace_id(),
        };

        let outcome = context::with_context(ctx, async {
            let now = self.clock.now_millis();
            let mut activation = entry.check_out(now);
            activation.touch(now);

            if activation.instance.is_none() {
                let deps = ActivationDeps {
                    finder: self.finder.as_ref(),
                    storage: self.storage.as_ref(),
                    lifetime_providers: &self.lifetime_providers,
                    clock: self.clock.as_ref(),
                };
                activation = match lifecycle::instantiate(&identity, &entry.descriptor, &entry.reference, activation, &deps).await {
                    Ok(activation) => activation,
                    Err((vacant, err)) => {
                        entry.check_in(vacant);
                        return Err(err);
                    }
                };
            }

            let instance = activation.instance.clone().expect("activation just instantiated or already live");
            // Eager check-in (§4.3 step 5, §9 open question): safe only
            // because the serializer guarantees this identity's jobs never
            // overlap with each other.
            entry.check_in(activation);

            entry.descriptor.dispatcher.invoke(instance.as_ref(), method_id, args).await
        })
        .await;

        if !oneway {
            self.deliver_response(from, message_id, response_kind_for(outcome)).await;
        }
    }

    /// `sendResponse` with the degrade-on-failure ladder from §4.3 step 6 /
    /// §7 `TransportFailure`: exception, then error text, then log-only.
    async fn deliver_response(&self, to: NodeAddress, message_id: u64, kind: ResponseKind) {
        if let Err(send_err) = self.messenger.send_response(to.clone(), message_id, kind).await {
            warn!(%send_err, "send_response failed, retrying as exception");
            let exception = ResponseKind::Exception(send_err.to_string());
            if let Err(send_err2) = self.messenger.send_response(to.clone(), message_id, exception).await {
                warn!(%send_err2, "send_response retry failed, falling back to error text");
                let transport_failure = RuntimeError::TransportFailure;
                let fallback = ResponseKind::Error(transport_failure.to_string());
                if let Err(send_err3) = self.messenger.send_response(to, message_id, fallback).await {
                    error!(err = %transport_failure, %send_err3, "send_response fell back a third time, giving up");
                }
            }
        }
    }
}

fn response_kind_for(result: Result<Value, RuntimeError>) -> ResponseKind {
    match result {
        Ok(value) => ResponseKind::Normal(value),
        Err(RuntimeError::UserException(e)) => ResponseKind::Exception(e.to_string()),
        Err(err @ RuntimeError::ActivationFailure { .. }) => ResponseKind::Exception(err.to_string()),
        Err(other) => ResponseKind::Error(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{Actor, Dispatcher, ReferenceFactory};
    use crate::registry::interface::InterfaceDescriptor;
    use crate::test_support::{FakeMessenger, FakeReferenceFactory, MapFinder, RecordingActor};
    use async_trait::async_trait;

    struct EchoDispatcher;

    #[async_trait]
    impl Dispatcher for EchoDispatcher {
        async fn invoke(&self, _instance: &dyn Actor, _method_id: u32, args: Value) -> Result<Value, RuntimeError> {
            Ok(args)
        }
    }

    fn build_dispatcher(flavor: ActorFlavor) -> (Arc<InboundDispatcher>, Arc<FakeMessenger>) {
        let interfaces = Arc::new(InterfaceRegistry::new());
        let finder = Arc::new(MapFinder::new());
        let recording = RecordingActor::new();
        let recording_for_factory = recording.clone();
        finder.register(1, "Echo", Arc::new(move || Ok(recording_for_factory.clone() as Arc<dyn Actor>)));
        let descriptor = InterfaceDescriptor::new(1, false, flavor, Arc::new(FakeReferenceFactory), Arc::new(EchoDispatcher), "Echo");
        interfaces.register(descriptor);

        let messenger = Arc::new(FakeMessenger::default());
        let dispatcher = Arc::new(InboundDispatcher {
            interfaces,
            activations: Arc::new(ActivationRegistry::new()),
            observers: Arc::new(ObserverRegistry::new()),
            serializer: ExecutionSerializer::new(),
            messenger: messenger.clone() as Arc<dyn Messenger>,
            counters: Arc::new(Counters::default()),
            config: RuntimeConfig { max_queue_size: 10, ..RuntimeConfig::default() },
            clock: Arc::new(crate::clock::SystemClock),
            finder: finder as Arc<dyn ClassFinder>,
            storage: None,
            lifetime_providers: Vec::new(),
        });
        (dispatcher, messenger)
    }

    #[tokio::test]
    async fn singleton_round_trip_produces_normal_response() {
        let (dispatcher, messenger) = build_dispatcher(ActorFlavor::Singleton);
        dispatcher
            .on_message_received(NodeAddress("caller".into()), false, 1, 1, 7, Some("a".into()), serde_json::json!(42))
            .await;
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        assert_eq!(dispatcher.counters.messages_received(), 1);
        assert_eq!(dispatcher.counters.messages_handled(), 1);
        let responses = messenger.sent_responses.lock();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].2, "normal");
    }

    #[tokio::test]
    async fn unknown_interface_yields_error_response() {
        let (dispatcher, messenger) = build_dispatcher(ActorFlavor::Singleton);
        dispatcher
            .on_message_received(NodeAddress("caller".into()), false, 1, 999, 1, Some("a".into()), Value::Null)
            .await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let responses = messenger.sent_responses.lock();
        assert_eq!(responses[0].2, "error");
    }
}
