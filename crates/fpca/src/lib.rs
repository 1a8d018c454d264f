//! Federated incremental PCA: per-node subspace tracking with periodic
//! rendezvous against the central aggregator.

pub mod agent;
pub mod client;

pub use agent::{FPCAAgent, FpcaError, FpcaResult};
pub use client::{AggregatorClient, TonicAggregatorClient};
