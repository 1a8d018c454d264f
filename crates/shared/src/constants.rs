//! Constants shared across the placement engine crates.

/// gRPC port the dispatcher listens on (`PodPlacement`, `SignalService`).
pub const DISPATCHER_PORT: u16 = 50051;

/// gRPC port the aggregator listens on (`AggregateMerge`).
pub const AGGREGATOR_PORT: u16 = 50052;

/// HTTP port each long-running binary exposes `/healthz` and `/metrics` on.
pub const PROFILER_PORT: u16 = 50053;

/// DNS template agents use to resolve the aggregator, `<ns>` substituted at
/// config time.
pub const AGGREGATOR_DNS_TEMPLATE: &str = "agg-svc.{ns}.svc.cluster.local";

/// DNS name agents and the orchestrator use to resolve the dispatcher.
pub const DISPATCHER_DNS: &str = "pronto-svc.kube-system.svc.cluster.local";

/// Saturation threshold: a dimension at or above this value is considered
/// saturated regardless of its projected rate of change.
pub const SATURATION_THRESHOLD: f64 = 0.95;

/// Minimum signal weight retained by the alias updater; nodes at or below
/// this are dropped from the sampling distribution.
pub const ALIAS_WEIGHT_EPSILON: f64 = 1e-3;

/// Period of the dispatcher's alias updater loop.
pub const ALIAS_UPDATE_PERIOD_MS: u64 = 10;

/// Number of draws an alias table serves before it is forcibly rebuilt,
/// bounding staleness variance independent of the update period.
pub const ALIAS_MAX_SAMPLES: u32 = 4;

/// Bind attempt count before a pod is returned to the retry queue.
pub const BIND_MAX_ATTEMPTS: u32 = 3;

/// Base backoff between bind attempts; doubles each retry (1s, 2s, 4s).
pub const BIND_BACKOFF_BASE_MS: u64 = 1000;

/// Cap on the event-creation retry backoff.
pub const EVENT_BACKOFF_CAP_MS: u64 = 30_000;

/// Overprovision baseline percentile (k-th percentile of the current
/// window, k ≈ 10%).
pub const BASELINE_PERCENTILE: f64 = 0.10;

/// Forget weight applied to the existing subspace during a local merge.
pub const DEFAULT_FORGET: f64 = 0.9;

/// Enhance weight applied to the incoming batch during a local merge.
pub const DEFAULT_ENHANCE: f64 = 1.1;

/// Default target subspace rank.
pub const DEFAULT_RANK: usize = 4;

/// Environment variable the agent binary reads its node identity from.
pub const NODE_NAME_ENV: &str = "NODE_NAME";

/// Number of utilization dimensions a remote agent collects per frame
/// (CPU, RAM).
pub const METRIC_DIMS: usize = 2;

/// Number of consecutive frames batched into one `d x b` matrix before it
/// is handed to the FPCA agent.
pub const METRIC_BATCH_SIZE: usize = 10;

/// Collector sampling cadence.
pub const METRIC_COLLECT_PERIOD_MS: u64 = 1000;
