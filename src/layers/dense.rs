use ndarray::{Array1, Array2, ArrayView2, Axis, Ix2};
use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::activations::Activation;
use crate::error::{DqnError, Result};
use super::initialization::WeightInit;

/// A fully connected (dense) layer in a neural network
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DenseLayer {
    /// Weight matrix [input_size, output_size]
    pub weights: Array2<f32>,
    pub biases: Array1<f32>,
    pub activation: Activation,
    #[serde(skip)]
    pre_activation_output: Option<Array2<f32>>,
    #[serde(skip)]
    inputs: Option<Array2<f32>>,
}

impl DenseLayer {
    /// Create a new dense layer with the given input size, output size, and activation function.
    /// Weights are drawn with `init`, biases start at zero.
    pub fn new<R: Rng + ?Sized>(input_size: usize, output_size: usize, activation: Activation, init: WeightInit, rng: &mut R) -> Self {
        let weights = init
            .initialize(Ix2(input_size, output_size), input_size, output_size, rng);
        let biases = Array1::zeros(output_size);
        DenseLayer {
            weights,
            biases,
            activation,
            pre_activation_output: None,
            inputs: None,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.nrows()
    }

    pub fn output_size(&self) -> usize {
        self.weights.ncols()
    }

    /// Forward pass for a batch of row vectors [batch, input_size].
    pub fn forward_batch(&mut self, inputs: ArrayView2<f32>) -> Array2<f32> {
        self.inputs = Some(inputs.to_owned());
        let mut outputs = inputs.dot(&self.weights) + &self.biases.view().insert_axis(Axis(0));
        self.pre_activation_output = Some(outputs.clone());
        self.activation.apply(&mut outputs);
        outputs
    }

    /// Backward pass for a batch of output errors.
    ///
    /// Returns `(input_gradients, weight_gradients, bias_gradients)`.
    pub fn backward_batch(&self, output_errors: ArrayView2<f32>) -> Result<(Array2<f32>, Array2<f32>, Array1<f32>)> {
        let (pre_activation_output, inputs) = match (&self.pre_activation_output, &self.inputs) {
            (Some(pre), Some(inputs)) => (pre, inputs),
            _ => return Err(DqnError::TrainingError(
                "dense backward pass requested before a forward pass".to_string(),
            )),
        };

        let activation_deriv = self.activation.derivative(pre_activation_output);
        let adjusted_error = &output_errors * &activation_deriv;
        let weight_gradients = inputs.t().dot(&adjusted_error);
        let bias_gradients = adjusted_error.sum_axis(Axis(0));
        let input_gradients = adjusted_error.dot(&self.weights.t());

        Ok((input_gradients, weight_gradients, bias_gradients))
    }
}
