//! Common types shared across the placement engine crates.

use serde::{Deserialize, Serialize};

/// Identifies a node (remote agent) by its DNS-stable name, e.g.
/// `remote-<node>.pronto.svc.cluster.local`.
pub type NodeId = String;

/// Identifies a pod by its orchestrator-assigned name.
pub type PodId = String;

/// Identifies a container within a pod.
pub type ContainerId = String;

/// Which Kalman capacity model variant a remote agent runs, selected via
/// `--podcost-func`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[clap(rename_all = "snake_case")]
pub enum PodCostFunc {
    /// Capacity offset only, per-pod cost held at a fixed constant.
    Constant,
    /// 1-D filter: per-pod cost folded into a single scalar state.
    OneD,
    /// 2-D filter: independent capacity-offset and per-pod-cost states.
    TwoD,
}

impl Default for PodCostFunc {
    fn default() -> Self {
        PodCostFunc::TwoD
    }
}

/// Which informer backend a remote agent reads pod/container events from,
/// selected via `--informer`. Only `Static` is implemented in this
/// workspace; `Api` and `Containerd` are reserved variants behind the same
/// trait seam for a future orchestrator/runtime integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[clap(rename_all = "snake_case")]
pub enum InformerKind {
    /// Synthetic/test informer driven by a local config document.
    Static,
    /// Kubernetes API informer (not implemented).
    Api,
    /// containerd event bus informer (not implemented).
    Containerd,
}

impl Default for InformerKind {
    fn default() -> Self {
        InformerKind::Static
    }
}

/// Minimal identity of a pod as seen through the orchestrator's watch
/// stream: enough to build a `Binding` and a matching scheduling `Event`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PodRef {
    pub namespace: String,
    pub name: String,
    pub uid: String,
}

impl PodRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            uid: uid.into(),
        }
    }
}

impl std::fmt::Display for PodRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Identifies a scheduling `Event` created for a successful bind, so it can
/// be deleted again if the bind is later rolled back. `name` carries the
/// concrete name the orchestrator assigned (the event's `GenerateName`
/// prefix plus its generated suffix).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventHandle {
    pub namespace: String,
    pub name: String,
}

impl EventHandle {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}
