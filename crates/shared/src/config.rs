//! Layered configuration loading (defaults → file → environment) built on
//! the `config` crate, mirroring the teacher's config-layering pattern.

use serde::{Deserialize, Serialize};

use crate::error::ProntoResult;
use crate::types::{InformerKind, PodCostFunc};

/// Initial state and noise parameters for a Kalman capacity filter,
/// loaded from a `--kalman-config` YAML document. Field names match the
/// document format exactly: `initX`, `initP`, `Q`, `R`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KalmanConfig {
    /// Initial state vector. Length 1 for the 1-D filter, 2 for the 2-D
    /// filter, ignored by the constant filter.
    #[serde(rename = "initX")]
    pub init_x: Vec<f64>,

    /// Initial state covariance, row-major, `len(initX)^2` entries.
    #[serde(rename = "initP")]
    pub init_p: Vec<f64>,

    /// Process noise covariance, row-major, `len(initX)^2` entries.
    #[serde(rename = "Q")]
    pub q: Vec<f64>,

    /// Observation noise variance.
    #[serde(rename = "R")]
    pub r: f64,
}

impl KalmanConfig {
    /// Default 2-D configuration: capacity offset and per-pod cost
    /// uncorrelated, moderate process noise, unit observation noise.
    pub fn default_two_d() -> Self {
        Self {
            init_x: vec![0.0, -0.1],
            init_p: vec![1.0, 0.0, 0.0, 1.0],
            q: vec![1e-4, 0.0, 0.0, 1e-4],
            r: 1.0,
        }
    }

    /// Load from a YAML file at `path`.
    pub fn from_file(path: &std::path::Path) -> ProntoResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&raw)?)
    }
}

/// Configuration for a remote agent binary, assembled from defaults, an
/// optional file, environment variables, and CLI flags, in that order of
/// increasing precedence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Node identity; defaults to the `NODE_NAME` environment variable.
    pub node_name: String,
    /// Which informer backend feeds container lifecycle events.
    pub informer: InformerKind,
    /// Which Kalman capacity model variant to run.
    pub podcost_func: PodCostFunc,
    /// Path to the Kalman configuration document, if any.
    pub kalman_config_path: Option<String>,
    /// Lower clamp on the per-pod cost estimate.
    pub podcost_lower: f64,
    /// Upper clamp on the per-pod cost estimate.
    pub podcost_upper: f64,
    /// Aggregator DNS name to dial.
    pub aggregator_addr: String,
    /// Dispatcher DNS name to dial.
    pub dispatcher_addr: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            node_name: String::new(),
            informer: InformerKind::default(),
            podcost_func: PodCostFunc::default(),
            kalman_config_path: None,
            podcost_lower: 1e-6,
            podcost_upper: 1e3,
            aggregator_addr: crate::constants::AGGREGATOR_DNS_TEMPLATE.to_string(),
            dispatcher_addr: crate::constants::DISPATCHER_DNS.to_string(),
        }
    }
}

impl AgentConfig {
    /// Build a layered config: built-in defaults, an optional config file,
    /// then environment variables prefixed `PRONTO_`.
    pub fn load(file_path: Option<&str>) -> ProntoResult<Self> {
        let mut builder = config::Config::builder()
            .set_default("node_name", "")?
            .set_default("informer", "static")?
            .set_default("podcost_func", "two_d")?
            .set_default("podcost_lower", 1e-6)?
            .set_default("podcost_upper", 1e3)?
            .set_default(
                "aggregator_addr",
                crate::constants::AGGREGATOR_DNS_TEMPLATE,
            )?
            .set_default("dispatcher_addr", crate::constants::DISPATCHER_DNS)?;

        if let Some(path) = file_path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder = builder.add_source(config::Environment::with_prefix("PRONTO"));

        let built = builder.build()?;
        let mut cfg: Self = built.try_deserialize()?;
        if cfg.node_name.is_empty() {
            if let Ok(name) = std::env::var(crate::constants::NODE_NAME_ENV) {
                cfg.node_name = name;
            }
        }
        Ok(cfg)
    }
}
