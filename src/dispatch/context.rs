// Copyright 2024-2026 Actorhost Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

//! The ambient, task-scoped context visible to user code while a method is
//! executing (§5 "Runtime binding", §9 "Ambient runtime"). Backed by
//! `tokio::task_local!`, whose `scope` future naturally restores the outer
//! value once a nested scope completes — exactly the "install and restore,
//! don't merely clear" requirement for re-entrant local calls.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::identity::{ActorIdentity, NodeAddress};

/// Per-invocation ambient data visible to user code (the glossary's
/// "Message context").
#[derive(Clone, Debug)]
pub struct MessageContext {
    pub target: ActorIdentity,
    pub source: Option<ActorIdentity>,
    pub from: Option<NodeAddress>,
    pub method_id: u32,
    pub trace_id: u64,
}

tokio::task_local! {
    static MESSAGE_CONTEXT: MessageContext;
}

static TRACE_IDS: AtomicU64 = AtomicU64::new(1);

/// Monotonically increasing trace id shared by `pre_invoke`/`post_invoke`
/// pairs for one call (§4.5 step 1).
pub fn next_trace_id() -> u64 {
    TRACE_IDS.fetch_add(1, Ordering::Relaxed)
}

/// Runs `fut` with `ctx` bound as the current [`MessageContext`]. Nesting is
/// safe: an inner `with_context` call sees its own value, and once it
/// returns the outer scope's value is visible again.
pub async fn with_context<F: Future>(ctx: MessageContext, fut: F) -> F::Output {
    MESSAGE_CONTEXT.scope(ctx, fut).await
}

/// The context for the invocation currently executing on this task, if
/// any. `None` when called from outside any dispatched method (e.g. from
/// the embedding application's own code before the first `invoke`).
pub fn current() -> Option<MessageContext> {
    MESSAGE_CONTEXT.try_with(|ctx| ctx.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn nested_scopes_restore_the_outer_context() {
        let outer = MessageContext {
            target: ActorIdentity::new(1, "outer"),
            source: None,
            from: None,
            method_id: 1,
            trace_id: next_trace_id(),
        };
        with_context(outer.clone(), async {
            assert_eq!(current().unwrap().target.actor_id, outer.target.actor_id);
            let inner = MessageContext {
                target: ActorIdentity::new(2, "inner"),
                source: Some(outer.target.clone()),
                from: None,
                method_id: 2,
                trace_id: next_trace_id(),
            };
            with_context(inner, async {
                assert_eq!(current().unwrap().target.actor_id, Some("inner".to_string()));
            })
            .await;
            assert_eq!(current().unwrap().target.actor_id, outer.target.actor_id, "outer context must be restored");
        })
        .await;
        assert!(current().is_none());
    }
}
