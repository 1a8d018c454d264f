//! Orchestrator boundary: pod-watch, bind and event creation/deletion. This
//! is the out-of-scope collaborator from spec.md §1/§6 — the dispatcher
//! only ever talks to it through this trait. `StaticOrchestrator` is a
//! scripted, in-memory stand-in used by tests and the default CLI
//! configuration, in the same spirit as `collector::StaticMetricSource` and
//! `eventcache::StaticEventSource` elsewhere in this workspace; a
//! Kubernetes-backed implementation is left for future wiring.

use async_trait::async_trait;
use tokio::sync::mpsc;

use shared::types::{EventHandle, PodRef};

/// Errors talking to the orchestrator. Each bind worker retries these with
/// its own backoff policy; this trait only reports success or failure.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum OrchestratorError {
    #[error("bind request failed: {0}")]
    BindFailed(String),
    #[error("event creation failed: {0}")]
    EventFailed(String),
    #[error("event deletion failed: {0}")]
    EventDeleteFailed(String),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// The external collaborator contract: watch unscheduled pods, bind one to
/// a node, and create/delete the scheduling event that records the bind.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Subscribes to ADDED events for pods targeting this scheduler and not
    /// yet assigned a node. The returned receiver is closed when the watch
    /// ends; callers reopen it after a backoff per spec.md §7.
    async fn watch_pods(&self) -> mpsc::Receiver<PodRef>;

    /// Creates a `Binding` for `pod` onto `node`.
    async fn bind(&self, pod: &PodRef, node: &str) -> OrchestratorResult<()>;

    /// Creates a Normal "Scheduled" event recording the bind.
    async fn create_event(
        &self,
        pod: &PodRef,
        node: &str,
        reporting_controller: &str,
        reporting_instance: &str,
    ) -> OrchestratorResult<EventHandle>;

    /// Deletes a previously created event (bind rollback compensation).
    async fn delete_event(&self, handle: &EventHandle) -> OrchestratorResult<()>;
}

/// Scripted, in-memory orchestrator: replays a fixed pod list on
/// `watch_pods`, and records binds/events so tests can assert on them. Bind
/// and event calls can be configured to fail a fixed number of times before
/// succeeding, to exercise the bind worker's retry/compensation paths.
pub struct StaticOrchestrator {
    pods: parking_lot::Mutex<Vec<PodRef>>,
    bind_failures: parking_lot::Mutex<u32>,
    event_failures: parking_lot::Mutex<u32>,
    binds: parking_lot::Mutex<Vec<(PodRef, String)>>,
    events: parking_lot::Mutex<Vec<EventHandle>>,
    next_event_id: std::sync::atomic::AtomicU64,
}

impl StaticOrchestrator {
    pub fn new(pods: Vec<PodRef>) -> Self {
        Self {
            pods: parking_lot::Mutex::new(pods),
            bind_failures: parking_lot::Mutex::new(0),
            event_failures: parking_lot::Mutex::new(0),
            binds: parking_lot::Mutex::new(Vec::new()),
            events: parking_lot::Mutex::new(Vec::new()),
            next_event_id: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Makes the next `count` `bind` calls fail before succeeding.
    pub fn fail_bind_times(&self, count: u32) {
        *self.bind_failures.lock() = count;
    }

    /// Makes the next `count` `create_event` calls fail before succeeding.
    pub fn fail_event_times(&self, count: u32) {
        *self.event_failures.lock() = count;
    }

    /// Binds recorded so far, as `(pod, node)` pairs in call order.
    pub fn recorded_binds(&self) -> Vec<(PodRef, String)> {
        self.binds.lock().clone()
    }

    /// Events currently considered live (created and not yet deleted).
    pub fn live_events(&self) -> Vec<EventHandle> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl Orchestrator for StaticOrchestrator {
    async fn watch_pods(&self) -> mpsc::Receiver<PodRef> {
        let (tx, rx) = mpsc::channel(16);
        let pods = std::mem::take(&mut *self.pods.lock());
        tokio::spawn(async move {
            for pod in pods {
                if tx.send(pod).await.is_err() {
                    return;
                }
            }
        });
        rx
    }

    async fn bind(&self, pod: &PodRef, node: &str) -> OrchestratorResult<()> {
        let mut remaining = self.bind_failures.lock();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(OrchestratorError::BindFailed(format!(
                "simulated bind failure for {pod} onto {node}"
            )));
        }
        drop(remaining);
        self.binds.lock().push((pod.clone(), node.to_string()));
        Ok(())
    }

    async fn create_event(
        &self,
        pod: &PodRef,
        _node: &str,
        _reporting_controller: &str,
        _reporting_instance: &str,
    ) -> OrchestratorResult<EventHandle> {
        let mut remaining = self.event_failures.lock();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(OrchestratorError::EventFailed(format!(
                "simulated event failure for {pod}"
            )));
        }
        drop(remaining);
        let id = self
            .next_event_id
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let handle = EventHandle::new(pod.namespace.clone(), format!("{}-{id}", pod.name));
        self.events.lock().push(handle.clone());
        Ok(handle)
    }

    async fn delete_event(&self, handle: &EventHandle) -> OrchestratorResult<()> {
        self.events.lock().retain(|h| h != handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn watch_pods_replays_the_scripted_list_in_order() {
        let orch = StaticOrchestrator::new(vec![
            PodRef::new("default", "a", "uid-a"),
            PodRef::new("default", "b", "uid-b"),
        ]);
        let mut rx = orch.watch_pods().await;
        assert_eq!(rx.recv().await.unwrap().name, "a");
        assert_eq!(rx.recv().await.unwrap().name, "b");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn bind_fails_the_configured_number_of_times_then_succeeds() {
        let orch = StaticOrchestrator::new(vec![]);
        orch.fail_bind_times(2);
        let pod = PodRef::new("default", "a", "uid-a");
        assert!(orch.bind(&pod, "node-1").await.is_err());
        assert!(orch.bind(&pod, "node-1").await.is_err());
        assert!(orch.bind(&pod, "node-1").await.is_ok());
        assert_eq!(orch.recorded_binds(), vec![(pod, "node-1".to_string())]);
    }
}
