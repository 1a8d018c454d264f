//! Signal derivation and Kalman capacity/cost estimation for one node.

pub mod capacity;
pub mod kalman;
pub mod signal;

pub use capacity::CapacityState;
pub use kalman::{Constant, KalmanFilter, OneD, TwoD};
pub use signal::time_to_saturation;
