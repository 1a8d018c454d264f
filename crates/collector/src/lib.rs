//! Fixed-cadence metric collection feeding the per-node FPCA agent: a
//! [`source::MetricSource`] produces raw utilization frames, an optional
//! [`filter::Filter`] smooths them, and [`collector::MetricCollector`]
//! batches them for the subspace pipeline.

pub mod collector;
pub mod filter;
pub mod source;

pub use collector::MetricCollector;
pub use filter::{DynEma, Filter, NullFilter};
pub use source::{MetricSource, StaticMetricSource};
