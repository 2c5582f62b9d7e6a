// Copyright 2024-2026 Actorhost Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

//! Typed knobs for the runtime (§6). Reading these from a file or the
//! environment is the embedding application's job — this crate only defines
//! the shape and its defaults, mirroring how `Libp2pConfig` in the reference
//! codebase is a plain `Deserialize` struct with a hand-written `Default`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Per-key queue depth before `offer` refuses new jobs (§4.1).
    pub max_queue_size: usize,
    /// Period of the idle-eviction scan (§4.2).
    pub cleanup_interval: Duration,
    /// Activation idle timeout; activations untouched for longer than this
    /// since `lastAccess` are eviction candidates (§4.2).
    pub idle_ttl: Duration,
    /// Turns on `InvokeListenerProvider::pre_invoke`/`post_invoke`
    /// notifications (§4.5).
    pub trace_enabled: bool,
    /// Period of the `Messenger::timeout_cleanup` sweep (§5).
    pub message_timeout_sweep: Duration,
    /// Short name embedded in the runtime identity, e.g. `Name[<token>]`.
    pub system_name: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 10_000,
            cleanup_interval: Duration::from_secs(5 * 60),
            idle_ttl: Duration::from_secs(10 * 60),
            trace_enabled: false,
            message_timeout_sweep: Duration::from_secs(5),
            system_name: "actorhost".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.max_queue_size, 10_000);
        assert_eq!(cfg.cleanup_interval, Duration::from_secs(300));
        assert_eq!(cfg.idle_ttl, Duration::from_secs(600));
        assert!(!cfg.trace_enabled);
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = RuntimeConfig {
            max_queue_size: 42,
            ..RuntimeConfig::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: RuntimeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.max_queue_size, 42);
    }
}
