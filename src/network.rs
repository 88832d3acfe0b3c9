//! Action-value networks.
//!
//! [`QNetwork`] is the capability boundary the agent is written against:
//! predict, fit, weight access and persistence. [`ConvQNetwork`] is the
//! convolutional implementation used for board observations:
//!
//! ```text
//! Conv2D(filters, k, ReLU) -> Conv2D(filters, k, ReLU) -> MaxPool2D(p)
//!     -> flatten -> Dense(hidden, ReLU) -> Dense(actions, Linear)
//! ```

use ndarray::{Array, Array1, Array2, ArrayD, ArrayView1, ArrayView2, ArrayView3, ArrayView4, Axis, Dimension, Ix1, Ix2, Ix4};
use rand::Rng;
use serde::{Serialize, Deserialize};
use std::path::Path;

use crate::activations::Activation;
use crate::config::NetworkConfig;
use crate::env::ObservationShape;
use crate::error::{DqnError, Result};
use crate::layers::{Conv2DLayer, DenseLayer, MaxPool2DLayer};
use crate::loss::{Loss, MeanSquaredError};
use crate::optimizer::{Optimizer, OptimizerWrapper};
use crate::persistence;

/// Bumped whenever the artifact layout changes.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// A function approximator mapping an observation to one value per action.
pub trait QNetwork {
    fn input_shape(&self) -> ObservationShape;

    fn num_actions(&self) -> usize;

    /// Action values for a batch of observations [batch, channels, height, width].
    fn predict_batch(&mut self, states: ArrayView4<f32>) -> Result<Array2<f32>>;

    /// Action values for a single observation.
    fn predict(&mut self, state: ArrayView3<f32>) -> Result<Array1<f32>> {
        let values = self.predict_batch(state.insert_axis(Axis(0)))?;
        Ok(values.index_axis_move(Axis(0), 0))
    }

    /// Take one gradient step toward `target` for `state`; returns the loss before the step.
    fn fit(&mut self, state: ArrayView3<f32>, target: ArrayView1<f32>) -> Result<f32>;

    /// Copies of every trainable tensor, in a stable order.
    fn get_weights(&self) -> Vec<ArrayD<f32>>;

    /// Replace every trainable tensor. Shapes must match [`QNetwork::get_weights`].
    fn set_weights(&mut self, weights: Vec<ArrayD<f32>>) -> Result<()>;

    fn save_weights(&self, path: &Path) -> Result<()>;

    /// Restore weights saved by [`QNetwork::save_weights`]. Failures are
    /// reported as [`DqnError::ArtifactLoad`].
    fn load_weights(&mut self, path: &Path) -> Result<()>;
}

/// On-disk form of a network's weights.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WeightArtifact {
    pub format_version: u32,
    pub input_shape: ObservationShape,
    pub num_actions: usize,
    pub tensors: Vec<ArrayD<f32>>,
}

/// Index of the largest value, first index on ties. NaNs never win.
pub fn argmax(values: ArrayView1<f32>) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if v <= b || v.is_nan() => best,
            None if v.is_nan() => None,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

#[derive(Clone, Debug)]
pub struct ConvQNetwork {
    conv1: Conv2DLayer,
    conv2: Conv2DLayer,
    pool: MaxPool2DLayer,
    hidden: DenseLayer,
    output: DenseLayer,
    optimizer: OptimizerWrapper,
    loss: MeanSquaredError,
    learning_rate: f32,
    input_shape: ObservationShape,
    /// (channels, height, width) after pooling
    pooled_dims: (usize, usize, usize),
}

impl ConvQNetwork {
    pub fn new<R: Rng + ?Sized>(
        input_shape: ObservationShape,
        num_actions: usize,
        config: &NetworkConfig,
        rng: &mut R,
    ) -> Result<Self> {
        config.validate()?;
        if num_actions == 0 {
            return Err(DqnError::invalid_parameter("num_actions", "action space is empty"));
        }
        if input_shape.is_empty() {
            return Err(DqnError::invalid_parameter("input_shape", "observation shape is empty"));
        }

        let too_small = || {
            DqnError::invalid_parameter(
                "input_shape".to_string(),
                format!(
                    "{:?} is too small for two {}x{} convolutions and {}x{} pooling",
                    input_shape.dims(),
                    config.kernel_size,
                    config.kernel_size,
                    config.pool_size,
                    config.pool_size
                ),
            )
        };

        let kernel = (config.kernel_size, config.kernel_size);
        let conv1 = Conv2DLayer::new(input_shape.channels, config.filters, kernel, (1, 1), (0, 0), Activation::Relu, config.weight_init, rng);
        let (h1, w1) = conv1.output_dims(input_shape.height, input_shape.width).ok_or_else(too_small)?;
        let conv2 = Conv2DLayer::new(config.filters, config.filters, kernel, (1, 1), (0, 0), Activation::Relu, config.weight_init, rng);
        let (h2, w2) = conv2.output_dims(h1, w1).ok_or_else(too_small)?;
        let pool = MaxPool2DLayer::new((config.pool_size, config.pool_size), None);
        let (h3, w3) = pool.output_dims(h2, w2).ok_or_else(too_small)?;

        let flat = config.filters * h3 * w3;
        let hidden = DenseLayer::new(flat, config.hidden_units, Activation::Relu, config.weight_init, rng);
        let output = DenseLayer::new(config.hidden_units, num_actions, Activation::Linear, config.weight_init, rng);

        Ok(ConvQNetwork {
            conv1,
            conv2,
            pool,
            hidden,
            output,
            optimizer: config.optimizer.build(),
            loss: MeanSquaredError,
            learning_rate: config.learning_rate,
            input_shape,
            pooled_dims: (config.filters, h3, w3),
        })
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    /// Total number of trainable scalars.
    pub fn parameter_count(&self) -> usize {
        self.get_weights().iter().map(|w| w.len()).sum()
    }

    fn check_input(&self, states: &ArrayView4<f32>) -> Result<()> {
        let (_, c, h, w) = states.dim();
        if (c, h, w) != self.input_shape.dims() {
            return Err(DqnError::dimension_mismatch(
                format!("observation of shape {:?}", self.input_shape.dims()),
                format!("observation of shape {:?}", (c, h, w)),
            ));
        }
        Ok(())
    }

    fn forward_batch(&mut self, states: ArrayView4<f32>) -> Result<Array2<f32>> {
        self.check_input(&states)?;
        let batch_size = states.dim().0;
        let (c, h, w) = self.pooled_dims;

        let features = self.conv1.forward_batch(states)?;
        let features = self.conv2.forward_batch(features.view())?;
        let features = self.pool.forward_batch(features.view())?;
        let flat = features
            .into_shape((batch_size, c * h * w))
            .map_err(|e| DqnError::TrainingError(e.to_string()))?;

        let hidden = self.hidden.forward_batch(flat.view());
        Ok(self.output.forward_batch(hidden.view()))
    }

    /// One gradient step on a whole batch; returns the loss before the step.
    pub fn fit_batch(&mut self, states: ArrayView4<f32>, targets: ArrayView2<f32>) -> Result<f32> {
        let predictions = self.forward_batch(states)?;
        if targets.dim() != predictions.dim() {
            return Err(DqnError::dimension_mismatch(
                format!("targets of shape {:?}", predictions.dim()),
                format!("targets of shape {:?}", targets.dim()),
            ));
        }

        let loss = self.loss.compute_batch(predictions.view(), targets);
        if !loss.is_finite() {
            return Err(DqnError::TrainingError(format!("non-finite loss {}", loss)));
        }

        let grad = self.loss.gradient_batch(predictions.view(), targets);
        let (grad, output_w, output_b) = self.output.backward_batch(grad.view())?;
        let (grad, hidden_w, hidden_b) = self.hidden.backward_batch(grad.view())?;
        let (c, h, w) = self.pooled_dims;
        let grad = grad
            .as_standard_layout()
            .into_owned()
            .into_shape((predictions.nrows(), c, h, w))
            .map_err(|e| DqnError::TrainingError(e.to_string()))?;
        let grad = self.pool.backward_batch(grad.view())?;
        let conv2 = self.conv2.backward_batch(grad.view(), true)?;
        let conv2_input = conv2.input.as_ref().ok_or_else(|| {
            DqnError::TrainingError("missing input gradient of the second convolution".to_string())
        })?;
        let conv1 = self.conv1.backward_batch(conv2_input.view(), false)?;

        let lr = self.learning_rate;
        self.optimizer.begin_step();
        self.optimizer.update(0, &mut self.conv1.kernels, &conv1.kernels, lr);
        self.optimizer.update(1, &mut self.conv1.biases, &conv1.biases, lr);
        self.optimizer.update(2, &mut self.conv2.kernels, &conv2.kernels, lr);
        self.optimizer.update(3, &mut self.conv2.biases, &conv2.biases, lr);
        self.optimizer.update(4, &mut self.hidden.weights, &hidden_w, lr);
        self.optimizer.update(5, &mut self.hidden.biases, &hidden_b, lr);
        self.optimizer.update(6, &mut self.output.weights, &output_w, lr);
        self.optimizer.update(7, &mut self.output.biases, &output_b, lr);

        Ok(loss)
    }
}

fn take_tensor<D: Dimension, I: Iterator<Item = ArrayD<f32>>>(tensors: &mut I) -> Result<Array<f32, D>> {
    let tensor = tensors
        .next()
        .ok_or_else(|| DqnError::invalid_parameter("weights", "too few tensors"))?;
    tensor
        .as_standard_layout()
        .into_owned()
        .into_dimensionality::<D>()
        .map_err(|e| DqnError::dimension_mismatch(format!("rank {:?}", D::NDIM), e.to_string()))
}

impl QNetwork for ConvQNetwork {
    fn input_shape(&self) -> ObservationShape {
        self.input_shape
    }

    fn num_actions(&self) -> usize {
        self.output.output_size()
    }

    fn predict_batch(&mut self, states: ArrayView4<f32>) -> Result<Array2<f32>> {
        self.forward_batch(states)
    }

    fn fit(&mut self, state: ArrayView3<f32>, target: ArrayView1<f32>) -> Result<f32> {
        self.fit_batch(state.insert_axis(Axis(0)), target.insert_axis(Axis(0)))
    }

    fn get_weights(&self) -> Vec<ArrayD<f32>> {
        vec![
            self.conv1.kernels.clone().into_dyn(),
            self.conv1.biases.clone().into_dyn(),
            self.conv2.kernels.clone().into_dyn(),
            self.conv2.biases.clone().into_dyn(),
            self.hidden.weights.clone().into_dyn(),
            self.hidden.biases.clone().into_dyn(),
            self.output.weights.clone().into_dyn(),
            self.output.biases.clone().into_dyn(),
        ]
    }

    fn set_weights(&mut self, weights: Vec<ArrayD<f32>>) -> Result<()> {
        let current = self.get_weights();
        if weights.len() != current.len() {
            return Err(DqnError::dimension_mismatch(
                format!("{} weight tensors", current.len()),
                format!("{} weight tensors", weights.len()),
            ));
        }
        for (i, (new, old)) in weights.iter().zip(current.iter()).enumerate() {
            if new.shape() != old.shape() {
                return Err(DqnError::dimension_mismatch(
                    format!("tensor {} of shape {:?}", i, old.shape()),
                    format!("tensor {} of shape {:?}", i, new.shape()),
                ));
            }
        }

        let mut tensors = weights.into_iter();
        self.conv1.kernels = take_tensor::<Ix4, _>(&mut tensors)?;
        self.conv1.biases = take_tensor::<Ix1, _>(&mut tensors)?;
        self.conv2.kernels = take_tensor::<Ix4, _>(&mut tensors)?;
        self.conv2.biases = take_tensor::<Ix1, _>(&mut tensors)?;
        self.hidden.weights = take_tensor::<Ix2, _>(&mut tensors)?;
        self.hidden.biases = take_tensor::<Ix1, _>(&mut tensors)?;
        self.output.weights = take_tensor::<Ix2, _>(&mut tensors)?;
        self.output.biases = take_tensor::<Ix1, _>(&mut tensors)?;
        Ok(())
    }

    fn save_weights(&self, path: &Path) -> Result<()> {
        let artifact = WeightArtifact {
            format_version: ARTIFACT_FORMAT_VERSION,
            input_shape: self.input_shape,
            num_actions: self.num_actions(),
            tensors: self.get_weights(),
        };
        persistence::save(path, &artifact)
    }

    fn load_weights(&mut self, path: &Path) -> Result<()> {
        let artifact: WeightArtifact = persistence::load(path)?;
        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(DqnError::artifact_load(
                path,
                format!("unsupported format version {}", artifact.format_version),
            ));
        }
        if artifact.input_shape != self.input_shape || artifact.num_actions != self.num_actions() {
            return Err(DqnError::artifact_load(
                path,
                format!(
                    "artifact was saved for {:?} with {} actions, network expects {:?} with {}",
                    artifact.input_shape.dims(),
                    artifact.num_actions,
                    self.input_shape.dims(),
                    self.num_actions()
                ),
            ));
        }
        self.set_weights(artifact.tensors)
            .map_err(|e| DqnError::artifact_load(path, e.to_string()))
    }
}
