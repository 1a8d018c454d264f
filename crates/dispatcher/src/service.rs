//! gRPC surface: the legacy unary `PodPlacement.RequestPod` and the
//! primary `SignalService.StreamSignals` long-lived stream. Both only ever
//! touch [`NodeRegistry`]; placement and binding live entirely in
//! [`crate::watch`] and [`crate::bind`]. Grounded in
//! `src/central/server.go`'s `StreamSignals` (node identity latched from
//! the stream's first message, slot zeroed on EOF/error).

use std::sync::Arc;

use tonic::{Request, Response, Status, Streaming};
use tracing::{info, warn};

use wire::pod_placement_server::PodPlacement;
use wire::signal_service_server::SignalService;
use wire::{EmptyReply, PodRequest, Signal, SignalAck};

use crate::registry::NodeRegistry;

/// Shared gRPC service implementation; both traits below borrow the same
/// registry, so one struct backs both generated servers.
pub struct PlacementService {
    registry: Arc<NodeRegistry>,
}

impl PlacementService {
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self { registry }
    }
}

#[tonic::async_trait]
impl PodPlacement for PlacementService {
    /// Legacy unary update path used by `rand-sched` and other callers that
    /// cannot hold a streaming RPC open.
    async fn request_pod(&self, request: Request<PodRequest>) -> Result<Response<EmptyReply>, Status> {
        let req = request.into_inner();
        match self.registry.index_of(&req.node) {
            Some(idx) => {
                self.registry.set(idx, req.signal);
                Ok(Response::new(EmptyReply {}))
            }
            None => Err(Status::not_found(format!("unknown node: {}", req.node))),
        }
    }
}

#[tonic::async_trait]
impl SignalService for PlacementService {
    /// Primary signal ingestion path: node identity latches from the first
    /// message on the stream. On EOF or a stream error, the node's slot is
    /// zeroed so a dead node immediately stops winning alias-table draws.
    async fn stream_signals(
        &self,
        request: Request<Streaming<Signal>>,
    ) -> Result<Response<SignalAck>, Status> {
        let mut stream = request.into_inner();
        let mut latched: Option<usize> = None;

        loop {
            match stream.message().await {
                Ok(Some(msg)) => {
                    let idx = match latched {
                        Some(idx) => idx,
                        None => match self.registry.index_of(&msg.node) {
                            Some(idx) => {
                                latched = Some(idx);
                                idx
                            }
                            None => {
                                warn!(node = %msg.node, "signal stream from unknown node, dropping message");
                                continue;
                            }
                        },
                    };
                    self.registry.set(idx, msg.signal);
                }
                Ok(None) => {
                    if let Some(idx) = latched {
                        self.registry.zero(idx);
                        info!(node = self.registry.name(idx), "signal stream closed, node zeroed");
                    }
                    return Ok(Response::new(SignalAck {}));
                }
                Err(status) => {
                    if let Some(idx) = latched {
                        self.registry.zero(idx);
                        warn!(node = self.registry.name(idx), error = %status, "signal stream errored, node zeroed");
                    }
                    return Err(status);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_pod_rejects_an_unknown_node() {
        let registry = Arc::new(NodeRegistry::new(vec!["node-1".into()]));
        let svc = PlacementService::new(registry);
        let req = Request::new(PodRequest { node: "node-2".into(), signal: 1.0 });
        assert!(svc.request_pod(req).await.is_err());
    }

    #[tokio::test]
    async fn request_pod_updates_a_known_node() {
        let registry = Arc::new(NodeRegistry::new(vec!["node-1".into()]));
        let svc = PlacementService::new(registry.clone());
        let req = Request::new(PodRequest { node: "node-1".into(), signal: 2.5 });
        svc.request_pod(req).await.unwrap();
        assert_eq!(registry.get(0), 2.5);
    }
}
