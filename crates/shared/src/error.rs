//! Error types and result definitions for the pronto placement engine.

use thiserror::Error;

/// Main error type shared across the placement pipeline.
#[derive(Error, Debug)]
pub enum ProntoError {
    /// A required signal is not yet available (y vector, p vector, alias
    /// table). Retryable: the caller should log and defer one tick.
    #[error("not ready: {0}")]
    NotReady(String),

    /// Aggregator or dispatcher RPC failed or timed out. Recoverable; the
    /// caller degrades to local-only operation for this cycle.
    #[error("transport error: {0}")]
    Transport(String),

    /// A numerical precondition was violated (rank mismatch, dimension
    /// mismatch, non-finite input). Fatal to the current batch only.
    #[error("numerical error: {0}")]
    Numerical(String),

    /// Malformed or missing configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Generic error wrapper for external collaborators (orchestrator,
    /// container runtime, node/pod metadata API).
    #[error("external collaborator error: {0}")]
    External(String),

    /// IO errors (config file reads, profiler endpoint binding, etc).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapper for anyhow-sourced errors.
    #[error("{0}")]
    Generic(#[from] anyhow::Error),
}

/// Result type alias used throughout the placement engine.
pub type ProntoResult<T> = Result<T, ProntoError>;

impl From<config::ConfigError> for ProntoError {
    fn from(err: config::ConfigError) -> Self {
        ProntoError::Configuration(err.to_string())
    }
}

impl From<serde_yaml::Error> for ProntoError {
    fn from(err: serde_yaml::Error) -> Self {
        ProntoError::Configuration(err.to_string())
    }
}
