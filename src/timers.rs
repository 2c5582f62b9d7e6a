// Copyright 2024-2026 Actorhost Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

//! Periodic idle eviction, the `Messenger` timeout sweep, and per-actor
//! repeating timers (§4.2 `evictIdle`, §5, §6 `registerTimer`).

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::clock::Clock;
use crate::identity::ActorIdentity;
use crate::lifecycle;
use crate::providers::{LifetimeProvider, Messenger};
use crate::registry::activation::ActivationRegistry;
use crate::registry::interface::ActorFlavor;
use crate::registry::observer::ObserverRegistry;
use crate::serializer::{ExecutionSerializer, Job};

/// Drives the periodic `evictIdle` scan (§4.2).
pub struct EvictionScan {
    pub activations: Arc<ActivationRegistry>,
    pub observers: Arc<ObserverRegistry>,
    pub serializer: Arc<ExecutionSerializer<ActorIdentity>>,
    pub lifetime_providers: Vec<Arc<dyn LifetimeProvider>>,
    pub clock: Arc<dyn Clock>,
    pub max_queue_size: usize,
}

impl EvictionScan {
    /// Runs one pass over every `removable` entry. Singleton cleanup is
    /// deferred to a serializer job so it cannot race an in-flight call for
    /// the same identity (§4.2's "cleanup runs under the serializer").
    /// Worker pools are scanned directly since a checked-out activation is
    /// never visible to this scan at all.
    pub async fn scan(&self, idle_ttl: Duration) {
        let cutoff = self.clock.now_millis().saturating_sub(idle_ttl.as_millis() as u64);
        self.observers.prune_dead();

        for (identity, entry) in self.activations.removable_entries() {
            match entry.flavor {
                ActorFlavor::Singleton => {
                    if !entry.oldest_is_stale(cutoff) {
                        continue;
                    }
                    let activations = self.activations.clone();
                    let lifetime_providers = self.lifetime_providers.clone();
                    let job_identity = identity.clone();
                    let job: Job = Box::pin(async move {
                        let Some(activation) = entry.try_take_singleton() else {
                            return;
                        };
                        if activation.last_access >= cutoff {
                            // Lost the race against a fresher touch; restore it.
                            entry.check_in(activation);
                            return;
                        }
                        if let Some(instance) = activation.instance.as_ref() {
                            lifecycle::deactivate(&job_identity, instance, &lifetime_providers).await;
                        }
                        if !activations.remove_if_same(&job_identity, &entry) {
                            warn!(identity = %job_identity, "eviction found entry already replaced, leaving it alone");
                        }
                    });
                    self.serializer.offer(Some(identity), job, self.max_queue_size);
                }
                ActorFlavor::StatelessWorker => {
                    let evicted = entry.evict_idle_workers(cutoff);
                    if evicted.is_empty() {
                        continue;
                    }
                    debug!(%identity, count = evicted.len(), "evicting idle worker activations");
                    let lifetime_providers = self.lifetime_providers.clone();
                    let identity = identity.clone();
                    tokio::spawn(async move {
                        for activation in evicted {
                            if let Some(instance) = activation.instance.as_ref() {
                                lifecycle::deactivate(&identity, instance, &lifetime_providers).await;
                            }
                        }
                    });
                }
            }
        }
    }
}

/// Spawns the repeating `evictIdle` scan and the `Messenger::timeout_cleanup`
/// sweep, both cancelled when dropped.
pub struct BackgroundTimers {
    eviction: tokio::task::JoinHandle<()>,
    timeout_sweep: tokio::task::JoinHandle<()>,
}

impl BackgroundTimers {
    pub fn start(
        scan: Arc<EvictionScan>,
        cleanup_interval: Duration,
        idle_ttl: Duration,
        messenger: Arc<dyn Messenger>,
        message_timeout_sweep: Duration,
    ) -> Self {
        let eviction = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cleanup_interval);
            loop {
                ticker.tick().await;
                scan.scan(idle_ttl).await;
            }
        });
        let timeout_sweep = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(message_timeout_sweep);
            loop {
                ticker.tick().await;
                messenger.timeout_cleanup().await;
            }
        });
        Self { eviction, timeout_sweep }
    }

    pub fn stop(self) {
        self.eviction.abort();
        self.timeout_sweep.abort();
    }
}

/// A job factory for a repeating per-actor timer (§6 `registerTimer`).
pub type TimerCallback = Arc<dyn Fn() -> Job + Send + Sync>;

/// Returned by [`register_timer`]; cancellation is cooperative (§5).
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
    task: tokio::task::JoinHandle<()>,
}

impl TimerHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// `registerTimer(actor, callable, dueTime, period)` (§6). Runs `callback`
/// under `identity`'s serializer slot so ticks never overlap user calls for
/// the same actor. A `period` of `Duration::ZERO` runs the callback once.
pub fn register_timer(
    serializer: Arc<ExecutionSerializer<ActorIdentity>>,
    identity: ActorIdentity,
    callback: TimerCallback,
    due_time: Duration,
    period: Duration,
    max_queue_size: usize,
) -> TimerHandle {
    let cancelled = Arc::new(AtomicBool::new(false));
    let cancelled_for_task = cancelled.clone();
    let task = tokio::spawn(async move {
        tokio::time::sleep(due_time).await;
        loop {
            if cancelled_for_task.load(Ordering::SeqCst) {
                break;
            }
            let job = callback();
            serializer.offer(Some(identity.clone()), job, max_queue_size);
            if period.is_zero() {
                break;
            }
            tokio::time::sleep(period).await;
        }
    });
    TimerHandle { cancelled, task }
}

/// Boxes an `async` closure into the [`Job`] shape a timer callback needs.
pub fn timer_job<F>(f: impl FnOnce() -> F + Send + 'static) -> Job
where
    F: Future<Output = ()> + Send + 'static,
{
    Box::pin(async move { f().await }) as Pin<Box<dyn Future<Output = ()> + Send>>
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Actor;
    use crate::registry::interface::InterfaceDescriptor;
    use crate::test_support::{FakeDispatcher, FakeReferenceFactory, ManualClock, RecordingActor};
    use std::sync::atomic::AtomicUsize;

    fn descriptor(flavor: ActorFlavor) -> Arc<InterfaceDescriptor> {
        Arc::new(InterfaceDescriptor::new(
            1,
            false,
            flavor,
            Arc::new(FakeReferenceFactory),
            Arc::new(FakeDispatcher::default()),
            "Actor",
        ))
    }

    #[tokio::test]
    async fn scan_evicts_stale_singleton_and_removes_entry() {
        let activations = Arc::new(ActivationRegistry::new());
        let identity = ActorIdentity::new(1, "a");
        let (entry, _) = activations.ensure_entry(&identity, descriptor(ActorFlavor::Singleton));
        entry.set_removable(true);
        let recording = RecordingActor::new();
        let mut activation = entry.check_out(0);
        activation.instance = Some(recording.clone() as Arc<dyn Actor>);
        activation.touch(0);
        entry.check_in(activation);

        let clock = Arc::new(ManualClock::new(20 * 60 * 1000));
        let scan = Arc::new(EvictionScan {
            activations: activations.clone(),
            observers: Arc::new(ObserverRegistry::new()),
            serializer: ExecutionSerializer::new(),
            lifetime_providers: Vec::new(),
            clock: clock.clone() as Arc<dyn Clock>,
            max_queue_size: 100,
        });

        scan.scan(Duration::from_secs(600)).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(recording.deactivate_calls.load(Ordering::SeqCst), 1);
        assert!(activations.get(&identity).is_none());
    }

    #[tokio::test]
    async fn scan_spares_recently_touched_singleton() {
        let activations = Arc::new(ActivationRegistry::new());
        let identity = ActorIdentity::new(1, "a");
        let (entry, _) = activations.ensure_entry(&identity, descriptor(ActorFlavor::Singleton));
        entry.set_removable(true);
        let recording = RecordingActor::new();
        let mut activation = entry.check_out(0);
        activation.instance = Some(recording.clone() as Arc<dyn Actor>);
        activation.touch(1_000_000);
        entry.check_in(activation);

        let clock = Arc::new(ManualClock::new(1_000_100));
        let scan = Arc::new(EvictionScan {
            activations: activations.clone(),
            observers: Arc::new(ObserverRegistry::new()),
            serializer: ExecutionSerializer::new(),
            lifetime_providers: Vec::new(),
            clock: clock.clone() as Arc<dyn Clock>,
            max_queue_size: 100,
        });

        scan.scan(Duration::from_secs(600)).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(recording.deactivate_calls.load(Ordering::SeqCst), 0, "invariant 6: conservative eviction");
        assert!(activations.get(&identity).is_some());
    }

    #[tokio::test]
    async fn register_timer_runs_until_cancelled() {
        let serializer = ExecutionSerializer::<ActorIdentity>::new();
        let identity = ActorIdentity::new(1, "a");
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticks_for_cb = ticks.clone();
        let callback: TimerCallback = Arc::new(move || {
            let ticks = ticks_for_cb.clone();
            timer_job(move || async move {
                ticks.fetch_add(1, Ordering::SeqCst);
            })
        });
        let handle = register_timer(serializer, identity, callback, Duration::from_millis(5), Duration::from_millis(10), 10);
        tokio::time::sleep(Duration::from_millis(35)).await;
        handle.cancel();
        let seen = ticks.load(Ordering::SeqCst);
        assert!(seen >= 2, "expected several ticks, saw {seen}");
    }
}
