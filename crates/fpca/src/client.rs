//! Aggregator rendezvous boundary. The FPCA cycle only needs one RPC;
//! keeping it behind a trait lets the agent's batch-cycle logic be tested
//! without a live aggregator.

use async_trait::async_trait;
use nalgebra::DMatrix;
use tonic::transport::Channel;
use tracing::warn;
use wire::aggregate_merge_client::AggregateMergeClient;
use wire::DenseMatrix;

/// Submits a local `U*Sigma` product and returns the aggregator's current
/// published `U`, if any. A `None` return means the exchange failed or the
/// aggregator has not yet seen a first submission from anyone; either way
/// the caller proceeds with a purely local update this cycle.
#[async_trait]
pub trait AggregatorClient: Send + Sync {
    async fn request_agg_merge(&self, u_sigma: &DMatrix<f64>) -> Option<DMatrix<f64>>;
}

/// Tonic-backed [`AggregatorClient`] talking `AggregateMerge.RequestAggMerge`.
pub struct TonicAggregatorClient {
    inner: tokio::sync::Mutex<AggregateMergeClient<Channel>>,
}

impl TonicAggregatorClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: tokio::sync::Mutex::new(AggregateMergeClient::new(channel)),
        }
    }
}

#[async_trait]
impl AggregatorClient for TonicAggregatorClient {
    async fn request_agg_merge(&self, u_sigma: &DMatrix<f64>) -> Option<DMatrix<f64>> {
        let request = DenseMatrix::from_dmatrix(u_sigma);
        let mut client = self.inner.lock().await;
        match client.request_agg_merge(request).await {
            Ok(response) => match response.into_inner().into_dmatrix() {
                Ok(m) if m.nrows() > 0 && m.ncols() > 0 => Some(m),
                Ok(_) => None,
                Err(err) => {
                    warn!(error = %err, "aggregator returned a malformed matrix");
                    None
                }
            },
            Err(status) => {
                warn!(error = %status, "aggregator rendezvous failed, proceeding locally");
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Always returns the same fixed `U_A`, counting how many times it was
    /// called.
    pub struct FixedAggregatorClient {
        pub reply: Option<DMatrix<f64>>,
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl AggregatorClient for FixedAggregatorClient {
        async fn request_agg_merge(&self, _u_sigma: &DMatrix<f64>) -> Option<DMatrix<f64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }
}
