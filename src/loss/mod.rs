//! Loss functions used to fit the policy network toward its learning targets.

pub mod functions;

pub use functions::{Loss, MeanSquaredError};
