//! # Activation Functions Module
//!
//! Activation functions used by the Q-network layers. Hidden layers use ReLU,
//! the output layer is linear so Q-value estimates stay unconstrained.
//!
//! ## Usage Example
//!
//! ```rust
//! use territory_dqn::activations::Activation;
//! use ndarray::array;
//!
//! let mut data = array![1.0, -0.5, 0.0, 2.0];
//! Activation::Relu.apply(&mut data);
//! assert_eq!(data, array![1.0, 0.0, 0.0, 2.0]);
//! ```

pub mod functions;

pub use functions::Activation;
