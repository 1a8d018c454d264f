//! Naive comparison scheduler: repeatedly samples a node uniformly at
//! random from a fixed set and calls the legacy `PodPlacement.RequestPod`
//! unary RPC against the dispatcher, standing in for a real placement
//! decision. Grounded in `cmd/rand_sched/main.go`'s `rand_sched.Schedule`
//! loop, which this directly replaces — the original forks a goroutine per
//! scheduling round and then sleeps forever; here the round itself runs on
//! a fixed-period ticker in the main task.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use rand::seq::SliceRandom;
use tonic::transport::Channel;
use tracing::{debug, warn};

use shared::constants::DISPATCHER_DNS;
use wire::pod_placement_client::PodPlacementClient;
use wire::PodRequest;

#[derive(Parser, Debug)]
#[command(author, version, about = "pronto rand-sched: uniform-random placement baseline for comparison runs", long_about = None)]
struct Args {
    /// Dispatcher address to dial (host:port).
    #[arg(long, default_value = DISPATCHER_DNS)]
    dispatcher_addr: String,

    /// Comma-separated node-name set to sample uniformly over.
    #[arg(long, value_delimiter = ',', required = true)]
    nodes: Vec<String>,

    /// Period between scheduling rounds.
    #[arg(long, default_value_t = 1000)]
    period_ms: u64,

    /// Log level / `EnvFilter` directive.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt().with_env_filter(args.log_level).init();

    if args.nodes.is_empty() {
        anyhow::bail!("--nodes must list at least one node");
    }

    let channel = Channel::from_shared(args.dispatcher_addr.clone())
        .context("invalid dispatcher address")?
        .connect_lazy();
    let mut client = PodPlacementClient::new(channel);

    let mut ticker = tokio::time::interval(Duration::from_millis(args.period_ms));
    let mut rng = rand::thread_rng();
    loop {
        ticker.tick().await;
        let node = args.nodes.choose(&mut rng).expect("nodes is non-empty");

        let request = PodRequest {
            node: node.clone(),
            signal: 1.0,
        };
        match client.request_pod(request).await {
            Ok(_) => debug!(node, "placed onto uniformly sampled node"),
            Err(status) => warn!(node, error = %status, "rand-sched placement call failed"),
        }
    }
}
