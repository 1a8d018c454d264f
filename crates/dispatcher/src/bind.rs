//! Bind worker pool: commits a sampled `(pod, node)` placement against the
//! orchestrator, with the bind/event-creation join semantics and
//! compensating delete from spec.md §4.8. Grounded directly in
//! `src/central/bind.go`'s `bindPodWorker` — the concurrent bind-attempt
//! and event-creation goroutines, joined by two result channels, are
//! ported here as two concurrently spawned tasks joined by a
//! `tokio::sync::watch` cancellation signal and the event task's own
//! `JoinHandle`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use shared::constants::{BIND_BACKOFF_BASE_MS, BIND_MAX_ATTEMPTS, EVENT_BACKOFF_CAP_MS};
use shared::types::{EventHandle, PodRef};

use crate::orchestrator::Orchestrator;

/// One placement decision queued for a bind worker.
#[derive(Debug, Clone)]
pub struct BindJob {
    pub pod: PodRef,
    pub node: String,
}

/// Attempts `bind` up to [`BIND_MAX_ATTEMPTS`] times with doubling backoff
/// starting at [`BIND_BACKOFF_BASE_MS`] (1s, 2s, 4s). Returns `Err(())` once
/// every attempt has failed; the caller (not this function) owns retry
/// queueing.
async fn bind_with_retry(orch: &dyn Orchestrator, pod: &PodRef, node: &str) -> Result<(), ()> {
    let mut backoff = Duration::from_millis(BIND_BACKOFF_BASE_MS);
    for attempt in 1..=BIND_MAX_ATTEMPTS {
        match orch.bind(pod, node).await {
            Ok(()) => return Ok(()),
            Err(err) => {
                warn!(%pod, node, attempt, error = %err, "bind attempt failed");
                if attempt < BIND_MAX_ATTEMPTS {
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }
    Err(())
}

/// Creates the scheduling event for `pod`/`node`, retrying with backoff
/// doubling up to [`EVENT_BACKOFF_CAP_MS`] until it succeeds or `cancel`
/// is tripped. Returns `None` if cancelled before a creation succeeded.
async fn create_event_until_cancelled(
    orch: &dyn Orchestrator,
    pod: &PodRef,
    node: &str,
    reporting_controller: &str,
    reporting_instance: &str,
    mut cancel: watch::Receiver<bool>,
) -> Option<EventHandle> {
    let cap = Duration::from_millis(EVENT_BACKOFF_CAP_MS);
    let mut backoff = Duration::from_secs(1);
    loop {
        if *cancel.borrow() {
            return None;
        }
        tokio::select! {
            _ = cancel.changed() => {
                if *cancel.borrow() {
                    return None;
                }
            }
            result = orch.create_event(pod, node, reporting_controller, reporting_instance) => {
                match result {
                    Ok(handle) => return Some(handle),
                    Err(err) => {
                        warn!(%pod, node, error = %err, "event creation failed, retrying");
                        tokio::select! {
                            _ = tokio::time::sleep(backoff) => {}
                            _ = cancel.changed() => {
                                if *cancel.borrow() {
                                    return None;
                                }
                            }
                        }
                        backoff = (backoff * 2).min(cap);
                    }
                }
            }
        }
    }
}

/// Deletes `handle`, retrying with the same capped backoff as event
/// creation, until it succeeds. Used only as bind-failure compensation, so
/// there is no cancellation path: the delete must eventually land.
async fn delete_event_until_done(orch: &dyn Orchestrator, handle: &EventHandle) {
    let cap = Duration::from_millis(EVENT_BACKOFF_CAP_MS);
    let mut backoff = Duration::from_secs(1);
    loop {
        match orch.delete_event(handle).await {
            Ok(()) => return,
            Err(err) => {
                warn!(event = %handle.name, error = %err, "compensating event delete failed, retrying");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(cap);
            }
        }
    }
}

/// Runs one bind worker until both `bind_queue` and `retry_queue` are
/// closed: dequeues a job (retries interleaved with fresh placements),
/// commits the bind and the scheduling event concurrently, and on bind
/// failure cancels the event loop, compensates any event that did get
/// created, and re-queues the pod.
pub async fn run_bind_worker(
    orch: Arc<dyn Orchestrator>,
    mut bind_queue: mpsc::Receiver<BindJob>,
    retry_queue: mpsc::Sender<PodRef>,
    reporting_controller: String,
    reporting_instance: String,
) {
    while let Some(job) = bind_queue.recv().await {
        let BindJob { pod, node } = job;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let event_orch = orch.clone();
        let event_pod = pod.clone();
        let event_node = node.clone();
        let rc = reporting_controller.clone();
        let ri = reporting_instance.clone();
        let event_task = tokio::spawn(async move {
            create_event_until_cancelled(event_orch.as_ref(), &event_pod, &event_node, &rc, &ri, cancel_rx).await
        });

        match bind_with_retry(orch.as_ref(), &pod, &node).await {
            Ok(()) => {
                // Bind succeeded: let the event loop keep retrying (it
                // always eventually succeeds, since it is never cancelled
                // on this path) and wait for it.
                let _ = event_task.await;
                info!(%pod, node, "pod bound");
            }
            Err(()) => {
                let _ = cancel_tx.send(true);
                if let Ok(Some(handle)) = event_task.await {
                    warn!(%pod, node, event = %handle.name, "bind failed after retries, deleting created event");
                    delete_event_until_done(orch.as_ref(), &handle).await;
                }
                if retry_queue.send(pod.clone()).await.is_err() {
                    warn!(%pod, "retry queue closed, dropping failed bind");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::StaticOrchestrator;

    #[tokio::test(start_paused = true)]
    async fn successful_bind_creates_exactly_one_event() {
        let orch = Arc::new(StaticOrchestrator::new(vec![]));
        let (bind_tx, bind_rx) = mpsc::channel(4);
        let (retry_tx, mut retry_rx) = mpsc::channel(4);

        let worker = tokio::spawn(run_bind_worker(
            orch.clone(),
            bind_rx,
            retry_tx,
            "pronto".into(),
            "pronto-dev-k8s-00".into(),
        ));

        let pod = PodRef::new("default", "p1", "uid-1");
        bind_tx
            .send(BindJob { pod: pod.clone(), node: "node-1".into() })
            .await
            .unwrap();
        drop(bind_tx);
        worker.await.unwrap();

        assert_eq!(orch.recorded_binds(), vec![(pod, "node-1".to_string())]);
        assert_eq!(orch.live_events().len(), 1);
        assert!(retry_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn bind_failure_after_retries_deletes_the_event_and_requeues() {
        let orch = Arc::new(StaticOrchestrator::new(vec![]));
        orch.fail_bind_times(u32::MAX);
        let (bind_tx, bind_rx) = mpsc::channel(4);
        let (retry_tx, mut retry_rx) = mpsc::channel(4);

        let worker = tokio::spawn(run_bind_worker(
            orch.clone(),
            bind_rx,
            retry_tx,
            "pronto".into(),
            "pronto-dev-k8s-00".into(),
        ));

        let pod = PodRef::new("default", "p1", "uid-1");
        bind_tx
            .send(BindJob { pod: pod.clone(), node: "node-1".into() })
            .await
            .unwrap();
        drop(bind_tx);
        worker.await.unwrap();

        assert!(orch.live_events().is_empty(), "compensating delete must remove the event");
        let retried = retry_rx.recv().await.expect("pod re-queued for retry");
        assert_eq!(retried, pod);
    }
}
