//! Building blocks of the convolutional Q-network.
//!
//! Every layer caches what it needs during `forward_batch` and consumes that
//! cache in `backward_batch`, so a backward pass must follow a forward pass on
//! the same layer.

pub mod conv;
pub mod dense;
pub mod initialization;
pub mod pooling;

pub use conv::{Conv2DLayer, ConvGradients};
pub use dense::DenseLayer;
pub use initialization::WeightInit;
pub use pooling::MaxPool2DLayer;
