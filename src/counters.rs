// Copyright 2024-2026 Actorhost Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

//! Runtime-wide counters (§3). Plain atomics rather than a metrics crate:
//! there is nowhere in scope for this crate to export them to (the
//! embedding application scrapes them through `Runtime::counters`).

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default, Debug)]
pub struct Counters {
    messages_received: AtomicU64,
    messages_handled: AtomicU64,
    refused_executions: AtomicU64,
}

impl Counters {
    pub fn record_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handled(&self) {
        self.messages_handled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_refused(&self) {
        self.refused_executions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn messages_handled(&self) -> u64 {
        self.messages_handled.load(Ordering::Relaxed)
    }

    pub fn refused_executions(&self) -> u64 {
        self.refused_executions.load(Ordering::Relaxed)
    }
}
