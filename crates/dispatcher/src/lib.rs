//! Central dispatcher: node signal registry, the periodically rebuilt
//! alias table, the pod-watch and retry loops, the bind worker pool, and
//! the gRPC surface ingesting per-node signals.

pub mod alias_slot;
pub mod bind;
pub mod orchestrator;
pub mod registry;
pub mod service;
pub mod watch;

pub use alias_slot::{run_alias_updater, AliasSlot};
pub use bind::{run_bind_worker, BindJob};
pub use orchestrator::{Orchestrator, OrchestratorError, OrchestratorResult, StaticOrchestrator};
pub use registry::NodeRegistry;
pub use service::PlacementService;
pub use watch::{run_retry_loop, run_watch_loop};
