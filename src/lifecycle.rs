// Copyright 2024-2026 Actorhost Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

//! The activation sequence itself (§4.2 step-by-step): resolve the class,
//! construct, bind, load state, and run the lifecycle hooks in order. Lives
//! apart from [`crate::registry::activation`] so that module can stay a
//! plain data structure while this one owns the async orchestration.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::warn;

use crate::clock::Clock;
use crate::error::RuntimeError;
use crate::identity::ActorIdentity;
use crate::providers::{Actor, ClassFinder, LifetimeProvider, StorageProvider};
use crate::registry::activation::{Activation, ActivationState};
use crate::registry::interface::InterfaceDescriptor;

/// Everything `instantiate` needs beyond the descriptor and identity, kept
/// together so the call site doesn't thread five separate `Arc`s through.
pub struct ActivationDeps<'a> {
    pub finder: &'a dyn ClassFinder,
    pub storage: Option<&'a Arc<dyn StorageProvider>>,
    pub lifetime_providers: &'a [Arc<dyn LifetimeProvider>],
    pub clock: &'a dyn Clock,
}

/// Runs the full activation sequence for a freshly checked-out `Vacant`
/// activation and returns it populated and `Live`, or a `RuntimeError` with
/// the vacant activation left for the caller to check back in unchanged.
///
/// Order (§4.2):
/// 1. resolve factory (cached, at most one `ClassFinder` call ever)
/// 2. construct, bind reference and storage
/// 3. `preActivation` hooks, concurrently
/// 4. `readState` (only if a storage provider is configured)
/// 5. `activateAsync`
/// 6. `postActivation` hooks, concurrently
pub async fn instantiate(
    identity: &ActorIdentity,
    descriptor: &InterfaceDescriptor,
    reference: &crate::identity::Reference,
    mut activation: Activation,
    deps: &ActivationDeps<'_>,
) -> Result<Activation, (Activation, RuntimeError)> {
    let factory = match descriptor.resolve_factory(deps.finder) {
        Some(factory) => factory,
        None => {
            return Err((activation, RuntimeError::NoImplementation(descriptor.interface_id)));
        }
    };

    let instance: Arc<dyn Actor> = match factory() {
        Ok(instance) => instance,
        Err(source) => {
            return Err((
                activation,
                RuntimeError::ActivationFailure { identity: identity.clone(), source },
            ));
        }
    };

    instance.bind(reference.clone());
    if let Some(storage) = deps.storage {
        instance.bind_storage(storage.clone());
    }

    if let Err(source) = run_pre_activation(&instance, deps.lifetime_providers).await {
        return Err((activation, RuntimeError::ActivationFailure { identity: identity.clone(), source }));
    }

    if deps.storage.is_some() {
        if let Err(err) = instance.read_state().await {
            return Err((activation, wrap_activation_error(identity, err)));
        }
    }

    if let Err(err) = instance.activate().await {
        return Err((activation, wrap_activation_error(identity, err)));
    }

    if let Err(source) = run_post_activation(&instance, deps.lifetime_providers).await {
        return Err((activation, RuntimeError::ActivationFailure { identity: identity.clone(), source }));
    }

    activation.instance = Some(instance);
    activation.state = ActivationState::Live;
    activation.touch(deps.clock.now_millis());
    Ok(activation)
}

async fn run_pre_activation(instance: &Arc<dyn Actor>, providers: &[Arc<dyn LifetimeProvider>]) -> anyhow::Result<()> {
    try_join_all(providers.iter().map(|p| {
        let instance = instance.clone();
        async move { p.pre_activation(instance.as_ref()).await.map_err(anyhow::Error::from) }
    }))
    .await?;
    Ok(())
}

async fn run_post_activation(instance: &Arc<dyn Actor>, providers: &[Arc<dyn LifetimeProvider>]) -> anyhow::Result<()> {
    try_join_all(providers.iter().map(|p| {
        let instance = instance.clone();
        async move { p.post_activation(instance.as_ref()).await.map_err(anyhow::Error::from) }
    }))
    .await?;
    Ok(())
}

fn wrap_activation_error(identity: &ActorIdentity, err: RuntimeError) -> RuntimeError {
    match err {
        RuntimeError::ActivationFailure { source, .. } => {
            RuntimeError::ActivationFailure { identity: identity.clone(), source }
        }
        other => RuntimeError::ActivationFailure { identity: identity.clone(), source: other.into() },
    }
}

/// Runs `preDeactivation`, `deactivateAsync`, then `postDeactivation` for an
/// activation being evicted or replaced. Every failure is wrapped as a
/// `RuntimeError::DeactivationError`, logged, and swallowed: deactivation
/// never blocks eviction (§4.2 `evictIdle`, §7 `DeactivationError`).
pub async fn deactivate(
    identity: &ActorIdentity,
    instance: &Arc<dyn Actor>,
    lifetime_providers: &[Arc<dyn LifetimeProvider>],
) {
    if let Err(source) = try_join_all(lifetime_providers.iter().map(|p| {
        let instance = instance.clone();
        async move { p.pre_deactivation(instance.as_ref()).await.map_err(anyhow::Error::from) }
    }))
    .await
    {
        let err = RuntimeError::DeactivationError { identity: identity.clone(), source };
        warn!(%err, "pre_deactivation hook failed, continuing");
    }

    if let Err(source) = instance.deactivate().await {
        let err = RuntimeError::DeactivationError { identity: identity.clone(), source: source.into() };
        warn!(%err, "deactivateAsync failed, discarding activation anyway");
    }

    if let Err(source) = try_join_all(lifetime_providers.iter().map(|p| {
        let instance = instance.clone();
        async move { p.post_deactivation(instance.as_ref()).await.map_err(anyhow::Error::from) }
    }))
    .await
    {
        let err = RuntimeError::DeactivationError { identity: identity.clone(), source };
        warn!(%err, "post_deactivation hook failed, continuing");
    }
}
