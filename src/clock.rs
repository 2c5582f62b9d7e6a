// Copyright 2024-2026 Actorhost Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

//! Pluggable time source. Production code uses [`SystemClock`]; the idle
//! eviction scenarios in `tests/` drive a [`crate::test_support::ManualClock`]
//! instead so `evictIdle` can be exercised without real sleeps.

use std::time::{SystemTime, UNIX_EPOCH};

/// Monotonic-ish milliseconds-since-epoch time source. Activation
/// `lastAccess` timestamps and the eviction cutoff are both read through
/// this trait so tests can control the passage of time deterministically.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_millis() as u64
    }
}
