// Copyright 2024-2026 Actorhost Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

//! User call out to a reference, routed to the transport (§4.5).

use std::sync::Arc;

use serde_json::Value;

use crate::dispatch::context;
use crate::error::RuntimeError;
use crate::identity::{NodeAddress, Reference};
use crate::providers::{InvokeHookProvider, InvokeListenerProvider, Locator, Messenger};

/// Sends calls on behalf of user code holding a [`Reference`].
pub struct OutboundInvoker {
    pub messenger: Arc<dyn Messenger>,
    pub locator: Arc<dyn Locator>,
    pub invoke_listeners: Vec<Arc<dyn InvokeListenerProvider>>,
    pub invoke_hook: Option<Arc<dyn InvokeHookProvider>>,
    pub trace_enabled: bool,
}

impl OutboundInvoker {
    /// `invoke(target, method, oneWay, methodId, args)` (§4.5).
    pub async fn invoke(
        &self,
        target: &Reference,
        method_id: u32,
        args: Value,
        oneway: bool,
    ) -> Result<Value, RuntimeError> {
        let ctx = context::current();
        let trace_id = ctx.as_ref().map(|c| c.trace_id).unwrap_or_else(context::next_trace_id);
        let source = ctx.and_then(|c| c.source);

        if self.trace_enabled {
            for listener in &self.invoke_listeners {
                listener.pre_invoke(trace_id, source.as_ref(), target, method_id, &args);
            }
        }

        let result = if let Some(hook) = &self.invoke_hook {
            hook.invoke(target, method_id, args, oneway).await
        } else {
            self.send_message(target, method_id, args, oneway).await
        };

        if self.trace_enabled {
            for listener in &self.invoke_listeners {
                listener.post_invoke(trace_id, &result);
            }
        }

        result
    }

    /// `sendMessage` (§4.5 step 4). The resolved address is never cached on
    /// the reference here; a Locator that wants caching does it internally.
    async fn send_message(&self, target: &Reference, method_id: u32, args: Value, oneway: bool) -> Result<Value, RuntimeError> {
        let address = match target.address() {
            Some(address) => address,
            None => self.locator.locate(target).await?,
        };
        self.dispatch_to(address, target.identity.interface_id, method_id, target.identity.actor_id.clone(), args, oneway).await
    }

    async fn dispatch_to(
        &self,
        to: NodeAddress,
        interface_id: u32,
        method_id: u32,
        actor_id: Option<String>,
        args: Value,
        oneway: bool,
    ) -> Result<Value, RuntimeError> {
        self.messenger.send_message(to, oneway, interface_id, method_id, actor_id, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    use crate::dispatch::context::{self, MessageContext};
    use crate::identity::ActorIdentity;
    use crate::providers::InvokeListenerProvider;
    use crate::test_support::{FakeLocator, FakeMessenger};

    #[tokio::test]
    async fn send_message_resolves_address_via_locator_when_unset() {
        let messenger = Arc::new(FakeMessenger::default());
        let locator = Arc::new(FakeLocator::fixed(NodeAddress("10.0.0.5:1".into())));
        let invoker = OutboundInvoker {
            messenger: messenger.clone() as Arc<dyn Messenger>,
            locator: locator as Arc<dyn Locator>,
            invoke_listeners: Vec::new(),
            invoke_hook: None,
            trace_enabled: false,
        };
        let target = Reference::new(ActorIdentity::new(1, "a"));
        invoker.invoke(&target, 9, Value::Null, false).await.unwrap();
        let sent = messenger.sent_messages.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, NodeAddress("10.0.0.5:1".into()));
    }

    #[tokio::test]
    async fn send_message_skips_locator_when_address_already_set() {
        let messenger = Arc::new(FakeMessenger::default());
        let locator = Arc::new(FakeLocator::default());
        let invoker = OutboundInvoker {
            messenger: messenger.clone() as Arc<dyn Messenger>,
            locator: locator as Arc<dyn Locator>,
            invoke_listeners: Vec::new(),
            invoke_hook: None,
            trace_enabled: false,
        };
        let target = Reference::with_address(ActorIdentity::new(1, "a"), NodeAddress("already-set".into()));
        invoker.invoke(&target, 9, Value::Null, false).await.unwrap();
        assert_eq!(messenger.sent_messages.lock()[0].0, NodeAddress("already-set".into()));
    }

    struct RecordingListener {
        seen_source: Mutex<Option<ActorIdentity>>,
    }

    impl InvokeListenerProvider for RecordingListener {
        fn pre_invoke(&self, _trace_id: u64, source: Option<&ActorIdentity>, _target: &Reference, _method_id: u32, _args: &Value) {
            *self.seen_source.lock() = source.cloned();
        }
    }

    /// A nested outbound call made from inside a dispatched actor method
    /// must report that actor's own identity as `source` to trace
    /// listeners (§4.5 step 1/2) — this is what `MessageContext.source`
    /// is for, not the enclosing call's own source.
    #[tokio::test]
    async fn pre_invoke_sees_the_calling_actors_identity_as_source() {
        let messenger = Arc::new(FakeMessenger::default());
        let locator = Arc::new(FakeLocator::fixed(NodeAddress("10.0.0.5:1".into())));
        let listener = Arc::new(RecordingListener { seen_source: Mutex::new(None) });
        let invoker = OutboundInvoker {
            messenger: messenger.clone() as Arc<dyn Messenger>,
            locator: locator as Arc<dyn Locator>,
            invoke_listeners: vec![listener.clone() as Arc<dyn InvokeListenerProvider>],
            invoke_hook: None,
            trace_enabled: true,
        };

        let calling_actor = ActorIdentity::new(1, "caller-actor");
        let ctx = MessageContext {
            target: calling_actor.clone(),
            source: Some(calling_actor.clone()),
            from: None,
            method_id: 5,
            trace_id: context::next_trace_id(),
        };
        let target = Reference::new(ActorIdentity::new(2, "callee"));

        context::with_context(ctx, invoker.invoke(&target, 9, Value::Null, false))
            .await
            .unwrap();

        assert_eq!(*listener.seen_source.lock(), Some(calling_actor));
    }
}
