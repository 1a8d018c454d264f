//! Container lifecycle event source boundary. `EventCache` only consumes
//! `(container, pod)` pairs on lifecycle transitions; where those events
//! actually come from is an external collaborator, selected at the agent
//! binary's CLI by `--informer`.
//!
//! Grounded in `src/remote/cache/event-container.go` and `informer.go`:
//! the source's informer forwards container runtime events into the cache
//! with the same four transitions this crate models. Only the synthetic
//! backend is implemented here; the API/containerd variants are reserved
//! for a future orchestrator integration behind this same trait.

use async_trait::async_trait;
use shared::types::{ContainerId, PodId};

use crate::cache::EventCache;

/// One container lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerEvent {
    Create(ContainerId, PodId),
    Start(ContainerId, PodId),
    Exit(ContainerId, PodId),
    Delete(ContainerId, PodId),
}

/// Drives an [`EventCache`] from an external stream of container lifecycle
/// events. `run` is expected to loop until its event source is exhausted
/// or cancelled.
#[async_trait]
pub trait ContainerEventSource: Send + Sync {
    async fn run(&mut self, cache: &EventCache);
}

/// Replays a fixed, pre-scripted sequence of events, used by
/// `--informer=static` and by integration tests that want a deterministic
/// container churn pattern without a runtime socket.
pub struct StaticEventSource {
    events: Vec<ContainerEvent>,
}

impl StaticEventSource {
    pub fn new(events: Vec<ContainerEvent>) -> Self {
        Self { events }
    }
}

#[async_trait]
impl ContainerEventSource for StaticEventSource {
    async fn run(&mut self, cache: &EventCache) {
        for event in self.events.drain(..) {
            apply(cache, event);
        }
    }
}

fn apply(cache: &EventCache, event: ContainerEvent) {
    match event {
        ContainerEvent::Create(container, pod) => cache.on_create(container, pod),
        ContainerEvent::Start(container, pod) => cache.on_start(container, pod),
        ContainerEvent::Exit(container, pod) => cache.on_exit(container, pod),
        ContainerEvent::Delete(container, pod) => cache.on_delete(container, pod),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::BaselineEstimator;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn static_source_replays_its_scripted_events_in_order() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let cache = EventCache::new(
            Duration::from_millis(10),
            Duration::from_millis(10),
            BaselineEstimator::new(3, 0.2, 0.05, 1.2, 0.10),
            move |_pod_count: usize, _overprovision: u32| {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            },
        );

        let mut source = StaticEventSource::new(vec![
            ContainerEvent::Create("c1".into(), "p1".into()),
            ContainerEvent::Start("c1".into(), "p1".into()),
        ]);
        source.run(&cache).await;

        assert_eq!(cache.pod_count(), 1);
    }
}
