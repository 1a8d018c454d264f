//! Per-node event-driven debounce cache: gates signal publication behind
//! container lifecycle churn.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use shared::types::{ContainerId, PodId};

use crate::baseline::{BaselineEstimator, OverprovisionCounter};

struct PodEntry {
    creating: u32,
    running: u32,
    deleting: u32,
    start_time: Instant,
}

struct Inner {
    creating: HashSet<ContainerId>,
    deleting: HashSet<ContainerId>,
    pod_containers: HashMap<PodId, PodEntry>,
    pod_count: usize,
    ends: Instant,
    timer: Option<JoinHandle<()>>,
    overprovision: OverprovisionCounter,
    baseline: BaselineEstimator,
}

impl Inner {
    fn waiting(&self) -> bool {
        !self.creating.is_empty() || !self.deleting.is_empty() || Instant::now() < self.ends
    }
}

/// Callback invoked when a debounce quiet period elapses with a snapshot
/// of `(pod_count, overprovision_counter)` taken under the state lock.
pub trait Trigger: Send + Sync + 'static {
    fn fire(&self, pod_count: usize, overprovision: u32);
}

impl<F> Trigger for F
where
    F: Fn(usize, u32) + Send + Sync + 'static,
{
    fn fire(&self, pod_count: usize, overprovision: u32) {
        (self)(pod_count, overprovision)
    }
}

/// Debounces `Create`/`Start`/`Exit`/`Delete` container lifecycle events
/// for one node and calls a [`Trigger`] once the node settles.
pub struct EventCache {
    inner: Arc<Mutex<Inner>>,
    on_trigger: Arc<dyn Trigger>,
    create_interval: Duration,
    delete_interval: Duration,
}

impl EventCache {
    pub fn new(
        create_interval: Duration,
        delete_interval: Duration,
        baseline: BaselineEstimator,
        on_trigger: impl Trigger,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                creating: HashSet::new(),
                deleting: HashSet::new(),
                pod_containers: HashMap::new(),
                pod_count: 0,
                ends: Instant::now(),
                timer: None,
                overprovision: OverprovisionCounter::new(),
                baseline,
            })),
            on_trigger: Arc::new(on_trigger),
            create_interval,
            delete_interval,
        }
    }

    /// Number of pods currently tracked (at least one known container).
    pub fn pod_count(&self) -> usize {
        self.inner.lock().pod_count
    }

    /// Current overprovision counter value.
    pub fn overprovision(&self) -> u32 {
        self.inner.lock().overprovision.value()
    }

    /// True while a debounce window is open or container transitions are
    /// in flight; publication must be suppressed.
    pub fn is_waiting(&self) -> bool {
        self.inner.lock().waiting()
    }

    pub fn on_create(&self, container: ContainerId, pod: PodId) {
        let mut inner = self.inner.lock();
        inner.creating.insert(container);
        let is_new_pod = !inner.pod_containers.contains_key(&pod);
        let entry = inner.pod_containers.entry(pod).or_insert_with(|| PodEntry {
            creating: 0,
            running: 0,
            deleting: 0,
            start_time: Instant::now(),
        });
        entry.creating += 1;
        if is_new_pod {
            inner.pod_count += 1;
        }
    }

    pub fn on_start(&self, container: ContainerId, pod: PodId) {
        let should_schedule;
        {
            let mut inner = self.inner.lock();
            inner.creating.remove(&container);
            let mut creating_done = false;
            if let Some(entry) = inner.pod_containers.get_mut(&pod) {
                if entry.creating > 0 {
                    entry.creating -= 1;
                }
                entry.running += 1;
                creating_done = entry.creating == 0;
            }
            should_schedule = creating_done;
        }
        if should_schedule {
            self.schedule_trigger(self.create_interval);
        }
    }

    pub fn on_exit(&self, container: ContainerId, pod: PodId) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.pod_containers.get_mut(&pod) {
            if entry.running > 0 {
                entry.running -= 1;
            }
            entry.deleting += 1;
        }
        inner.deleting.insert(container);
    }

    pub fn on_delete(&self, container: ContainerId, pod: PodId) {
        let mut retired = false;
        {
            let mut inner = self.inner.lock();
            inner.deleting.remove(&container);

            let remaining = inner.pod_containers.get_mut(&pod).map(|entry| {
                entry.deleting = entry.deleting.saturating_sub(1);
                (entry.deleting, entry.running, entry.start_time)
            });

            if let Some((deleting_left, running, start_time)) = remaining {
                if deleting_left == 0 && running == 0 {
                    inner.pod_containers.remove(&pod);
                    inner.pod_count = inner.pod_count.saturating_sub(1);
                    let lifetime = start_time.elapsed().as_secs_f64();
                    let oversaturated = inner.baseline.add_sample(lifetime);
                    inner.overprovision.observe(oversaturated);
                    retired = true;
                }
            }
        }
        if retired {
            self.schedule_trigger(self.delete_interval);
        }
    }

    /// Schedule a trigger `after` from now, coalescing with any earlier
    /// pending timer: the existing timer is stopped only if the new
    /// expiry is later than the current one.
    fn schedule_trigger(&self, after: Duration) {
        let new_ends = Instant::now() + after;
        let mut inner = self.inner.lock();
        if new_ends <= inner.ends && inner.timer.is_some() {
            return;
        }
        inner.ends = new_ends;
        if let Some(old) = inner.timer.take() {
            old.abort();
        }

        let inner_handle = Arc::clone(&self.inner);
        let on_trigger = Arc::clone(&self.on_trigger);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let (pod_count, overprovision, fire) = {
                let mut guard = inner_handle.lock();
                guard.timer = None;
                if guard.waiting() {
                    (0, 0, false)
                } else {
                    (guard.pod_count, guard.overprovision.value(), true)
                }
            };
            if fire {
                on_trigger.fire(pod_count, overprovision);
            }
        });
        inner.timer = Some(handle);
    }

    /// Fire the trigger immediately if the cache is not currently
    /// waiting, for callers that tick on a fixed cadence rather than
    /// relying solely on the debounce timer.
    pub fn tick(&self) {
        let (pod_count, overprovision, fire) = {
            let inner = self.inner.lock();
            if inner.waiting() {
                (0, 0, false)
            } else {
                (inner.pod_count, inner.overprovision.value(), true)
            }
        };
        if fire {
            self.on_trigger.fire(pod_count, overprovision);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cache_with_counter() -> (EventCache, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);
        let cache = EventCache::new(
            Duration::from_millis(20),
            Duration::from_millis(20),
            BaselineEstimator::new(3, 0.2, 0.05, 1.2, 0.10),
            move |_pod_count: usize, _overprovision: u32| {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            },
        );
        (cache, fired)
    }

    #[tokio::test]
    async fn debounces_a_burst_of_events_into_a_single_trigger() {
        let (cache, fired) = cache_with_counter();

        for i in 0..5u32 {
            let container = format!("c{i}");
            let pod = format!("p{}", i % 2);
            cache.on_create(container.clone(), pod.clone());
            cache.on_start(container.clone(), pod.clone());
            cache.on_exit(container.clone(), pod.clone());
            cache.on_delete(container, pod);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(fired.load(Ordering::SeqCst), 0, "still inside the debounce window");
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pod_entry_is_created_on_first_container_and_retired_when_empty() {
        let (cache, _fired) = cache_with_counter();
        cache.on_create("c1".into(), "p1".into());
        assert_eq!(cache.pod_count(), 1);
        cache.on_start("c1".into(), "p1".into());
        cache.on_exit("c1".into(), "p1".into());
        cache.on_delete("c1".into(), "p1".into());
        assert_eq!(cache.pod_count(), 0);
    }
}
