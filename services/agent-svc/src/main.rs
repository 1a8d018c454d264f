//! Remote agent binary: one process per node, wiring together metric
//! collection, the federated incremental PCA cycle, Kalman capacity
//! estimation, and the event-driven debounce cache, and forwarding the
//! resulting `(signal, capacity, overprovision)` triples to the dispatcher
//! over a long-lived `SignalService.StreamSignals` stream.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use nalgebra::DMatrix;
use rand::Rng;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::Channel;
use tracing::{info, warn};

use capacity::CapacityState;
use eventcache::{BaselineEstimator, ContainerEvent, ContainerEventSource, EventCache, StaticEventSource};
use fpca::{AggregatorClient, FPCAAgent, TonicAggregatorClient};
use shared::config::{AgentConfig, KalmanConfig};
use shared::constants::{METRIC_DIMS, PROFILER_PORT};
use shared::types::PodCostFunc;
use wire::signal_service_client::SignalServiceClient;
use wire::Signal;

#[derive(Parser, Debug)]
#[command(author, version, about = "pronto remote agent: per-node load signal pipeline", long_about = None)]
struct Args {
    /// Optional YAML/TOML config file layered under CLI flags and the
    /// `PRONTO_` environment prefix.
    #[arg(long)]
    config: Option<String>,

    /// Which Kalman capacity model variant to run.
    #[arg(long, value_enum)]
    podcost_func: Option<PodCostFunc>,

    /// Path to the Kalman filter's initial-state/noise YAML document.
    #[arg(long)]
    kalman_config: Option<String>,

    /// Aggregator address to dial (host:port), overriding the config.
    #[arg(long)]
    aggregator_addr: Option<String>,

    /// Dispatcher address to dial (host:port), overriding the config.
    #[arg(long)]
    dispatcher_addr: Option<String>,

    /// FPCA target subspace rank.
    #[arg(long, default_value_t = shared::constants::DEFAULT_RANK)]
    rank: usize,

    /// Run FPCA in adaptive-rank mode.
    #[arg(long, default_value_t = false)]
    adaptive_rank: bool,

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
    tracing_subscriber::fmt().with_env_filter(args.log_level.clone()).init();

    let mut cfg = AgentConfig::load(args.config.as_deref())?;
    if let Some(func) = args.podcost_func {
        cfg.podcost_func = func;
    }
    if let Some(addr) = args.aggregator_addr.clone() {
        cfg.aggregator_addr = addr;
    }
    if let Some(addr) = args.dispatcher_addr.clone() {
        cfg.dispatcher_addr = addr;
    }
    if args.kalman_config.is_some() {
        cfg.kalman_config_path = args.kalman_config.clone();
    }

    info!(node = %cfg.node_name, podcost_func = ?cfg.podcost_func, "starting remote agent");

    let kalman_cfg = match &cfg.kalman_config_path {
        Some(path) => KalmanConfig::from_file(std::path::Path::new(path))
            .with_context(|| format!("loading kalman config from {path}"))?,
        None => KalmanConfig::default_two_d(),
    };
    let capacity_state = Arc::new(CapacityState::new(cfg.podcost_func, &kalman_cfg)?);

    let source = Arc::new(collector::StaticMetricSource::new(METRIC_DIMS, || {
        let mut rng = rand::thread_rng();
        (0..METRIC_DIMS).map(|_| rng.gen_range(0.0..1.0)).collect()
    }));
    let metric_collector = collector::MetricCollector::new(source);
    let latest_frame = metric_collector.latest_frame();
    let (batch_tx, mut batch_rx) = mpsc::channel::<DMatrix<f64>>(4);
    tokio::spawn(metric_collector.run(batch_tx));

    let aggregator_channel = Channel::from_shared(cfg.aggregator_addr.clone())
        .context("invalid aggregator address")?
        .connect_lazy();
    let aggregator_client: Arc<dyn AggregatorClient> =
        Arc::new(TonicAggregatorClient::new(aggregator_channel));

    let fpca_agent = Arc::new(tokio::sync::Mutex::new(FPCAAgent::new(
        args.rank,
        shared::constants::DEFAULT_FORGET,
        shared::constants::DEFAULT_ENHANCE,
        0.05,
        0.5,
        1e-6,
        args.adaptive_rank,
    )));
    let fpca_p = fpca_agent.lock().await.p();

    {
        let fpca_agent = fpca_agent.clone();
        let aggregator_client = aggregator_client.clone();
        tokio::spawn(async move {
            while let Some(batch) = batch_rx.recv().await {
                let mut agent = fpca_agent.lock().await;
                if let Err(err) = agent.process_batch(&batch, aggregator_client.as_ref()).await {
                    warn!(error = %err, "FPCA batch cycle failed");
                }
            }
        });
    }

    let (signal_tx, signal_rx) = mpsc::channel::<Signal>(16);
    let node_name = cfg.node_name.clone();
    let podcost_lower = cfg.podcost_lower;
    let podcost_upper = cfg.podcost_upper;
    let event_cache = EventCache::new(
        Duration::from_millis(500),
        Duration::from_secs(2),
        BaselineEstimator::new(20, 0.2, 0.05, 1.2, shared::constants::BASELINE_PERCENTILE),
        move |pod_count: usize, overprovision: u32| {
            let y = latest_frame.load();
            let p = fpca_p.load();
            let signal = capacity::time_to_saturation(&y, &p);
            capacity_state.update(pod_count as f64, signal);
            let capacity_value =
                shared::utils::clamp(capacity_state.capacity_from_pod_count(pod_count as f64), podcost_lower, podcost_upper);
            let msg = Signal {
                node: node_name.clone(),
                signal,
                capacity: capacity_value,
                overprovision: overprovision as f64,
            };
            if signal_tx.try_send(msg).is_err() {
                warn!("signal stream channel full or closed, dropping this publication");
            }
        },
    );

    // `--informer=static` replays a scripted container lifecycle instead of
    // reading a real runtime event bus; each round creates, starts, runs and
    // retires one synthetic pod so the debounce cache and baseline
    // estimator keep seeing churn for the life of the process.
    tokio::spawn(async move {
        let mut round = 0u64;
        loop {
            let container = format!("synthetic-c{round}");
            let pod = format!("synthetic-p{round}");
            let mut source = StaticEventSource::new(vec![
                ContainerEvent::Create(container.clone(), pod.clone()),
                ContainerEvent::Start(container.clone(), pod.clone()),
            ]);
            source.run(&event_cache).await;

            tokio::time::sleep(Duration::from_secs(3)).await;
            let mut teardown = StaticEventSource::new(vec![
                ContainerEvent::Exit(container.clone(), pod.clone()),
                ContainerEvent::Delete(container, pod),
            ]);
            teardown.run(&event_cache).await;

            round += 1;
            tokio::time::sleep(Duration::from_secs(3)).await;
        }
    });

    let dispatcher_channel = Channel::from_shared(cfg.dispatcher_addr.clone())
        .context("invalid dispatcher address")?
        .connect_lazy();
    let mut signal_client = SignalServiceClient::new(dispatcher_channel);
    tokio::spawn(async move {
        if let Err(status) = signal_client.stream_signals(ReceiverStream::new(signal_rx)).await {
            warn!(error = %status, "signal stream to dispatcher ended");
        }
    });

    let profiler_addr = ([0, 0, 0, 0], args.profiler_port).into();
    let registry = prometheus::Registry::new();
    tokio::select! {
        result = profiler::serve(profiler_addr, registry) => result?,
        _ = tokio::signal::ctrl_c() => {}
    }

    info!("remote agent shut down");
    Ok(())
}
