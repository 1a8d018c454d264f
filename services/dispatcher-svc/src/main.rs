//! Dispatcher binary: wires the node registry, the alias-table updater, the
//! pod watch/retry loops, a bind worker pool, the signal-ingestion gRPC
//! surface, and the profiler HTTP surface into one process per spec.md §4.8.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;
use tonic::transport::Server;
use tracing::info;

use shared::constants::{ALIAS_MAX_SAMPLES, ALIAS_UPDATE_PERIOD_MS, DISPATCHER_PORT, PROFILER_PORT};
use dispatcher::{
    run_alias_updater, run_bind_worker, run_retry_loop, run_watch_loop, AliasSlot, BindJob,
    NodeRegistry, Orchestrator, PlacementService, StaticOrchestrator,
};
use wire::pod_placement_server::PodPlacementServer;
use wire::signal_service_server::SignalServiceServer;

#[derive(Parser, Debug)]
#[command(author, version, about = "pronto dispatcher: alias-sampled pod placement", long_about = None)]
struct Args {
    /// Comma-separated fixed node-name set this dispatcher samples over.
    #[arg(long, value_delimiter = ',')]
    nodes: Vec<String>,

    /// gRPC listen port.
    #[arg(long, default_value_t = DISPATCHER_PORT)]
    port: u16,

    /// Profiler HTTP listen port.
    #[arg(long, default_value_t = PROFILER_PORT)]
    profiler_port: u16,

    /// Alias table rebuild period.
    #[arg(long, default_value_t = ALIAS_UPDATE_PERIOD_MS)]
    alias_update_period_ms: u64,

    /// Draws served by an alias table before it is forcibly rebuilt.
    #[arg(long, default_value_t = ALIAS_MAX_SAMPLES)]
    alias_max_samples: u32,

    /// Bind worker pool size.
    #[arg(long, default_value_t = 4)]
    bind_workers: usize,

    /// Backoff between retry-queue placement attempts while no node clears
    /// the alias weight epsilon.
    #[arg(long, default_value_t = 100)]
    retry_backoff_ms: u64,

    /// `reportingController` recorded on created scheduling events.
    #[arg(long, default_value = "pronto")]
    reporting_controller: String,

    /// `reportingInstance` recorded on created scheduling events.
    #[arg(long, default_value = "pronto-dispatcher-00")]
    reporting_instance: String,

    /// Log level / `EnvFilter` directive.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt().with_env_filter(args.log_level).init();

    let registry = Arc::new(NodeRegistry::new(args.nodes.clone()));
    let alias_slot = Arc::new(AliasSlot::new());
    let orchestrator: Arc<dyn Orchestrator> = Arc::new(StaticOrchestrator::new(Vec::new()));

    info!(nodes = ?args.nodes, bind_workers = args.bind_workers, "starting dispatcher");

    tokio::spawn(run_alias_updater(
        registry.clone(),
        alias_slot.clone(),
        Duration::from_millis(args.alias_update_period_ms),
        args.alias_max_samples,
    ));

    let (bind_tx, mut bind_rx) = mpsc::channel::<BindJob>(256);
    let (retry_tx, retry_rx) = mpsc::channel(256);

    tokio::spawn(run_watch_loop(
        orchestrator.clone(),
        registry.clone(),
        alias_slot.clone(),
        bind_tx.clone(),
        retry_tx.clone(),
    ));
    tokio::spawn(run_retry_loop(
        registry.clone(),
        alias_slot.clone(),
        retry_rx,
        bind_tx.clone(),
        Duration::from_millis(args.retry_backoff_ms),
    ));
    drop(bind_tx);

    // Fan the single incoming bind queue out across a fixed worker pool,
    // round-robin, so one slow bind (retry backoff) cannot head-of-line
    // block unrelated placements.
    let mut worker_txs = Vec::with_capacity(args.bind_workers);
    for _ in 0..args.bind_workers {
        let (tx, rx) = mpsc::channel::<BindJob>(64);
        worker_txs.push(tx);
        tokio::spawn(run_bind_worker(
            orchestrator.clone(),
            rx,
            retry_tx.clone(),
            args.reporting_controller.clone(),
            args.reporting_instance.clone(),
        ));
    }
    drop(retry_tx);
    tokio::spawn(async move {
        let mut next = 0usize;
        while let Some(job) = bind_rx.recv().await {
            if worker_txs[next % worker_txs.len()].send(job).await.is_err() {
                break;
            }
            next = next.wrapping_add(1);
        }
    });

    let placement_service = PlacementService::new(registry.clone());
    let signal_service = PlacementService::new(registry.clone());

    let grpc_addr: SocketAddr = ([0, 0, 0, 0], args.port).into();
    let profiler_addr: SocketAddr = ([0, 0, 0, 0], args.profiler_port).into();
    let registry_metrics = prometheus::Registry::new();

    let grpc = Server::builder()
        .add_service(PodPlacementServer::new(placement_service))
        .add_service(SignalServiceServer::new(signal_service))
        .serve_with_shutdown(grpc_addr, shutdown_signal());

    let profiling = profiler::serve(profiler_addr, registry_metrics);

    tokio::select! {
        result = grpc => result?,
        result = profiling => result?,
    }

    info!("dispatcher shut down");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
