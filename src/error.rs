// Copyright 2024-2026 Actorhost Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

//! The closed set of errors this crate can return. Infrastructure-level
//! failures (a saturated queue, a missing observer) and user-level failures
//! (an actor method throwing) are both represented here so callers match on
//! one enum instead of parsing strings.

use thiserror::Error;

use crate::identity::ActorIdentity;

#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The per-key queue for this identity was at `maxQueueSize` when the
    /// message arrived. Always counted in `refused_executions`.
    #[error("Execution refused")]
    ExecutionRefused,

    /// `ClassFinder` returned `None` for this interface; no implementation
    /// is available on this node.
    #[error("No implementation for interface {0}")]
    NoImplementation(u32),

    /// The addressed observer's weak reference no longer upgrades.
    #[error("Observer no longer present")]
    ObserverGone,

    /// Construction, `preActivation`, `readState`, or `activateAsync` failed.
    /// The activation is not published; callers see this wrapped error.
    #[error("Activation failed for {identity:?}: {source}")]
    ActivationFailure {
        identity: ActorIdentity,
        #[source]
        source: anyhow::Error,
    },

    /// The user's method body returned an error.
    #[error("User method failed: {0}")]
    UserException(anyhow::Error),

    /// Delivering a response failed twice in a row.
    #[error("failed twice sending result")]
    TransportFailure,

    /// A deactivation hook or `deactivateAsync` failed. Logged; the
    /// activation is discarded regardless.
    #[error("Deactivation error for {identity:?}: {source}")]
    DeactivationError {
        identity: ActorIdentity,
        #[source]
        source: anyhow::Error,
    },

    /// Synchronous misuse: bad arguments to `installObserver`, binding a
    /// non-reference, re-registering an observer under a different id, an id
    /// clash with a distinct observer.
    #[error("{0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
