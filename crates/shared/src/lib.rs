//! Shared error types, constants, config loading, and small utilities used
//! across the pronto placement engine crates.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
pub mod utils;

pub use config::{AgentConfig, KalmanConfig};
pub use constants::*;
pub use error::{ProntoError, ProntoResult};
pub use types::*;
pub use utils::*;
