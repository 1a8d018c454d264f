//! Aggregator binary: hosts the `AggregateMerge` gRPC service backed by
//! [`aggregator::Aggregator`]'s queue-plus-reducer, and the shared
//! `/healthz`+`/metrics` profiler surface.

mod service;

use std::net::SocketAddr;

use anyhow::Result;
use clap::Parser;
use tonic::transport::Server;
use tracing::info;

use shared::constants::{AGGREGATOR_PORT, DEFAULT_RANK, PROFILER_PORT};
use wire::aggregate_merge_server::AggregateMergeServer;

use service::AggregateMergeService;

#[derive(Parser, Debug)]
#[command(author, version, about = "pronto aggregator: federated subspace rendezvous", long_about = None)]
struct Args {
    /// Target subspace rank.
    #[arg(long, default_value_t = DEFAULT_RANK)]
    rank: usize,

    /// Bounded capacity of the reducer's inbound submission queue.
    #[arg(long, default_value_t = 64)]
    queue_capacity: usize,

    /// gRPC listen port.
    #[arg(long, default_value_t = AGGREGATOR_PORT)]
    port: u16,

    /// Profiler HTTP listen port.
    #[arg(long, default_value_t = PROFILER_PORT)]
    profiler_port: u16,

    /// Log level / `EnvFilter` directive.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt().with_env_filter(args.log_level).init();

    let aggregator = aggregator::Aggregator::spawn(args.rank, args.queue_capacity);
    let svc = AggregateMergeService::new(aggregator);

    let grpc_addr: SocketAddr = ([0, 0, 0, 0], args.port).into();
    let profiler_addr: SocketAddr = ([0, 0, 0, 0], args.profiler_port).into();
    let registry = prometheus::Registry::new();

    info!(%grpc_addr, rank = args.rank, "starting aggregator");

    let grpc = Server::builder()
        .add_service(AggregateMergeServer::new(svc))
        .serve_with_shutdown(grpc_addr, shutdown_signal());

    let profiling = profiler::serve(profiler_addr, registry);

    tokio::select! {
        result = grpc => result?,
        result = profiling => result?,
    }

    info!("aggregator shut down");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
