//! `AggregateMerge` gRPC surface wrapping [`aggregator::Aggregator`].
//! Grounded in `src/aggregate/server.go`'s `RequestAggMerge`: enqueue the
//! caller's submission, then return whatever `U` is currently published —
//! best-effort, possibly not yet reflecting this very submission.

use tonic::{Request, Response, Status};

use aggregator::Aggregator;
use wire::aggregate_merge_server::AggregateMerge;
use wire::DenseMatrix;

pub struct AggregateMergeService {
    aggregator: Aggregator,
}

impl AggregateMergeService {
    pub fn new(aggregator: Aggregator) -> Self {
        Self { aggregator }
    }
}

#[tonic::async_trait]
impl AggregateMerge for AggregateMergeService {
    async fn request_agg_merge(
        &self,
        request: Request<DenseMatrix>,
    ) -> Result<Response<DenseMatrix>, Status> {
        let input = request
            .into_inner()
            .into_dmatrix()
            .map_err(|err| Status::invalid_argument(err.to_string()))?;

        let reply = match self.aggregator.request_agg_merge(input).await {
            Some(u) => DenseMatrix::from_dmatrix(&u),
            None => DenseMatrix { rows: 0, cols: 0, data: Vec::new() },
        };
        Ok(Response::new(reply))
    }
}
