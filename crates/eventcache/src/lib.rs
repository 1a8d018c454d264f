//! Event-driven debounce cache and overprovision baseline estimator for
//! one node's container lifecycle stream.

pub mod baseline;
pub mod cache;
pub mod informer;

pub use baseline::{BaselineEstimator, OverprovisionCounter};
pub use cache::{EventCache, Trigger};
pub use informer::{ContainerEvent, ContainerEventSource, StaticEventSource};
