//! Watch and retry loops: pull unscheduled pods from the orchestrator,
//! sample a node from the current alias table, and hand the placement to
//! the bind worker pool. Grounded in `src/central/central_sched.go`'s
//! `Schedule` loop (watch → `findNode` → `placePodToNode`), adapted so
//! `findNode`'s busy-wait becomes a non-blocking `try_sample` with a retry
//! queue, per spec.md §4.8.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use shared::types::PodRef;

use crate::alias_slot::AliasSlot;
use crate::bind::BindJob;
use crate::orchestrator::Orchestrator;
use crate::registry::NodeRegistry;

/// Runs until the orchestrator's watch stream closes (then the caller's
/// outer loop is expected to reopen it after a backoff per spec.md §7):
/// for each observed pod, try to sample a node immediately; on success
/// enqueue the bind job, on failure route the pod to the retry queue.
pub async fn run_watch_loop(
    orch: Arc<dyn Orchestrator>,
    registry: Arc<NodeRegistry>,
    alias: Arc<AliasSlot>,
    bind_queue: mpsc::Sender<BindJob>,
    retry_queue: mpsc::Sender<PodRef>,
) {
    let mut pods = orch.watch_pods().await;
    while let Some(pod) = pods.recv().await {
        match alias.try_sample() {
            Some(idx) => {
                let node = registry.name(idx).to_string();
                debug!(%pod, node, "sampled node for new pod");
                if bind_queue.send(BindJob { pod, node }).await.is_err() {
                    warn!("bind queue closed, dropping watch event");
                    return;
                }
            }
            None => {
                debug!(%pod, "no usable alias table, routing to retry queue");
                if retry_queue.send(pod).await.is_err() {
                    warn!("retry queue closed, dropping watch event");
                    return;
                }
            }
        }
    }
}

/// Runs until `retry_queue` is closed: repeatedly tries to place the head
/// of the queue, backing off between attempts on the same pod so a
/// persistently unusable table does not spin the loop.
pub async fn run_retry_loop(
    registry: Arc<NodeRegistry>,
    alias: Arc<AliasSlot>,
    mut retry_queue: mpsc::Receiver<PodRef>,
    bind_queue: mpsc::Sender<BindJob>,
    backoff: Duration,
) {
    while let Some(pod) = retry_queue.recv().await {
        loop {
            match alias.try_sample() {
                Some(idx) => {
                    let node = registry.name(idx).to_string();
                    debug!(%pod, node, "retried pod placed");
                    if bind_queue.send(BindJob { pod, node }).await.is_err() {
                        return;
                    }
                    break;
                }
                None => {
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::StaticOrchestrator;
    use alias::CtlAliasTable;

    #[tokio::test]
    async fn watch_loop_routes_to_retry_when_no_table_is_published() {
        let orch: Arc<dyn Orchestrator> =
            Arc::new(StaticOrchestrator::new(vec![PodRef::new("default", "a", "uid-a")]));
        let registry = Arc::new(NodeRegistry::new(vec!["node-1".into()]));
        let alias = Arc::new(AliasSlot::new());
        let (bind_tx, mut bind_rx) = mpsc::channel(4);
        let (retry_tx, mut retry_rx) = mpsc::channel(4);

        run_watch_loop(orch, registry, alias, bind_tx, retry_tx).await;

        assert!(bind_rx.try_recv().is_err());
        let retried = retry_rx.recv().await.unwrap();
        assert_eq!(retried.name, "a");
    }

    #[tokio::test]
    async fn watch_loop_enqueues_a_bind_job_when_a_table_is_ready() {
        let orch: Arc<dyn Orchestrator> =
            Arc::new(StaticOrchestrator::new(vec![PodRef::new("default", "a", "uid-a")]));
        let registry = Arc::new(NodeRegistry::new(vec!["node-1".into()]));
        let alias = Arc::new(AliasSlot::new());
        alias.publish(CtlAliasTable::new(&[1.0]).unwrap().with_idxs(vec![0]).unwrap());
        let (bind_tx, mut bind_rx) = mpsc::channel(4);
        let (retry_tx, _retry_rx) = mpsc::channel(4);

        run_watch_loop(orch, registry, alias, bind_tx, retry_tx).await;

        let job = bind_rx.recv().await.unwrap();
        assert_eq!(job.node, "node-1");
    }
}
