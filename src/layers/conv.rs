//! Convolutional layer for processing board observations
//!
//! Inputs are laid out `[batch, channels, height, width]`. The convolution is
//! computed by unfolding receptive fields into a matrix (im2col) so the heavy
//! lifting is a single matrix product per sample.

use ndarray::{s, Array1, Array2, Array3, Array4, ArrayView2, ArrayView3, ArrayView4, Axis, Ix4};
use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::activations::Activation;
use crate::error::{DqnError, Result};
use super::initialization::WeightInit;

/// 2D Convolutional Layer
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Conv2DLayer {
    /// Convolution kernels/filters [out_channels, in_channels, kernel_height, kernel_width]
    pub kernels: Array4<f32>,

    /// Bias terms for each output channel
    pub biases: Array1<f32>,

    pub activation: Activation,

    pub stride: (usize, usize),

    /// Zero padding added on each side
    pub padding: (usize, usize),

    pub in_channels: usize,

    pub out_channels: usize,

    pub kernel_size: (usize, usize),

    /// Padded input cached for the backward pass
    #[serde(skip)]
    cached_input: Option<Array4<f32>>,

    /// Cached pre-activation output
    #[serde(skip)]
    cached_pre_activation: Option<Array4<f32>>,
}

/// Gradients produced by [`Conv2DLayer::backward_batch`].
#[derive(Debug, Clone)]
pub struct ConvGradients {
    /// Gradient with respect to the layer input, when requested
    pub input: Option<Array4<f32>>,
    pub kernels: Array4<f32>,
    pub biases: Array1<f32>,
}

impl Conv2DLayer {
    /// Create a new 2D convolutional layer
    pub fn new<R: Rng + ?Sized>(
        in_channels: usize,
        out_channels: usize,
        kernel_size: (usize, usize),
        stride: (usize, usize),
        padding: (usize, usize),
        activation: Activation,
        init: WeightInit,
        rng: &mut R,
    ) -> Self {
        let receptive_field = kernel_size.0 * kernel_size.1;
        let kernels = init.initialize(
            Ix4(out_channels, in_channels, kernel_size.0, kernel_size.1),
            in_channels * receptive_field,
            out_channels * receptive_field,
            rng,
        );

        Conv2DLayer {
            kernels,
            biases: Array1::zeros(out_channels),
            activation,
            stride,
            padding,
            in_channels,
            out_channels,
            kernel_size,
            cached_input: None,
            cached_pre_activation: None,
        }
    }

    /// Spatial output size for an input of the given size, or `None` if the
    /// kernel does not fit.
    pub fn output_dims(&self, in_height: usize, in_width: usize) -> Option<(usize, usize)> {
        let padded_height = in_height + 2 * self.padding.0;
        let padded_width = in_width + 2 * self.padding.1;
        if self.stride.0 == 0
            || self.stride.1 == 0
            || padded_height < self.kernel_size.0
            || padded_width < self.kernel_size.1
        {
            return None;
        }
        Some((
            (padded_height - self.kernel_size.0) / self.stride.0 + 1,
            (padded_width - self.kernel_size.1) / self.stride.1 + 1,
        ))
    }

    /// Pad input with zeros
    fn pad_input(&self, input: ArrayView4<f32>) -> Array4<f32> {
        if self.padding == (0, 0) {
            return input.to_owned();
        }
        let (batch_size, channels, height, width) = input.dim();
        let mut padded = Array4::zeros((
            batch_size,
            channels,
            height + 2 * self.padding.0,
            width + 2 * self.padding.1,
        ));
        padded
            .slice_mut(s![.., .., self.padding.0..self.padding.0 + height, self.padding.1..self.padding.1 + width])
            .assign(&input);
        padded
    }

    /// Kernels flattened to [out_channels, in_channels * kh * kw]
    fn kernel_matrix(&self) -> Result<ArrayView2<'_, f32>> {
        let (out_channels, in_channels, kh, kw) = self.kernels.dim();
        self.kernels
            .view()
            .into_shape((out_channels, in_channels * kh * kw))
            .map_err(|e| DqnError::TrainingError(format!("kernel tensor is not contiguous: {}", e)))
    }

    /// Unfold every receptive field of one padded sample into a row.
    fn im2col(&self, padded: ArrayView3<f32>, out_height: usize, out_width: usize) -> Array2<f32> {
        let (kh, kw) = self.kernel_size;
        let mut cols = Array2::zeros((out_height * out_width, self.in_channels * kh * kw));
        for oh in 0..out_height {
            for ow in 0..out_width {
                let h_start = oh * self.stride.0;
                let w_start = ow * self.stride.1;
                let patch = padded.slice(s![.., h_start..h_start + kh, w_start..w_start + kw]);
                let mut row = cols.row_mut(oh * out_width + ow);
                for (dst, &src) in row.iter_mut().zip(patch.iter()) {
                    *dst = src;
                }
            }
        }
        cols
    }

    /// Fold rows back onto a padded sample, summing overlapping fields.
    fn col2im(
        &self,
        cols: ArrayView2<f32>,
        padded_dims: (usize, usize, usize),
        out_height: usize,
        out_width: usize,
    ) -> Array3<f32> {
        let (kh, kw) = self.kernel_size;
        let mut folded = Array3::zeros(padded_dims);
        for oh in 0..out_height {
            for ow in 0..out_width {
                let h_start = oh * self.stride.0;
                let w_start = ow * self.stride.1;
                let row = cols.row(oh * out_width + ow);
                let mut patch = folded.slice_mut(s![.., h_start..h_start + kh, w_start..w_start + kw]);
                for (dst, &src) in patch.iter_mut().zip(row.iter()) {
                    *dst += src;
                }
            }
        }
        folded
    }

    /// Forward pass for batch of images [batch, channels, height, width]
    pub fn forward_batch(&mut self, input: ArrayView4<f32>) -> Result<Array4<f32>> {
        let (batch_size, channels, in_height, in_width) = input.dim();
        if channels != self.in_channels {
            return Err(DqnError::dimension_mismatch(
                format!("{} input channels", self.in_channels),
                format!("{} input channels", channels),
            ));
        }
        let (out_height, out_width) = self.output_dims(in_height, in_width).ok_or_else(|| {
            DqnError::dimension_mismatch(
                format!("input of at least {:?}", self.kernel_size),
                format!("input of {}x{}", in_height, in_width),
            )
        })?;

        let padded = self.pad_input(input);
        let kernel_matrix = self.kernel_matrix()?;
        let mut output = Array4::zeros((batch_size, self.out_channels, out_height, out_width));

        for (b, mut sample) in output.outer_iter_mut().enumerate() {
            let cols = self.im2col(padded.index_axis(Axis(0), b), out_height, out_width);
            // [out_channels, out_height * out_width]
            let response = kernel_matrix.dot(&cols.t());
            for ((mut plane, row), &bias) in sample
                .outer_iter_mut()
                .zip(response.outer_iter())
                .zip(self.biases.iter())
            {
                for (dst, &v) in plane.iter_mut().zip(row.iter()) {
                    *dst = v + bias;
                }
            }
        }

        self.cached_input = Some(padded);
        self.cached_pre_activation = Some(output.clone());
        self.activation.apply(&mut output);
        Ok(output)
    }

    /// Backward pass.
    ///
    /// `propagate` controls whether the gradient with respect to the input is
    /// computed; the first layer of a network has no use for it.
    pub fn backward_batch(&self, output_gradient: ArrayView4<f32>, propagate: bool) -> Result<ConvGradients> {
        let (padded, pre_activation) = match (&self.cached_input, &self.cached_pre_activation) {
            (Some(padded), Some(pre)) => (padded, pre),
            _ => return Err(DqnError::TrainingError(
                "convolution backward pass requested before a forward pass".to_string(),
            )),
        };
        if output_gradient.dim() != pre_activation.dim() {
            return Err(DqnError::dimension_mismatch(
                format!("{:?}", pre_activation.dim()),
                format!("{:?}", output_gradient.dim()),
            ));
        }

        let grad = &output_gradient * &self.activation.derivative(pre_activation);
        let (_, out_channels, out_height, out_width) = grad.dim();
        let (_, channels, padded_height, padded_width) = padded.dim();
        let kernel_matrix = self.kernel_matrix()?;

        let mut kernel_gradients = Array2::<f32>::zeros(kernel_matrix.raw_dim());
        let mut bias_gradients = Array1::<f32>::zeros(out_channels);
        let mut input_gradients = if propagate {
            Some(Array4::<f32>::zeros((
                grad.dim().0,
                channels,
                padded_height - 2 * self.padding.0,
                padded_width - 2 * self.padding.1,
            )))
        } else {
            None
        };

        for (b, sample_grad) in grad.outer_iter().enumerate() {
            let sample_grad = Array2::from_shape_vec(
                (out_channels, out_height * out_width),
                sample_grad.iter().copied().collect(),
            )
            .map_err(|e| DqnError::TrainingError(e.to_string()))?;
            let cols = self.im2col(padded.index_axis(Axis(0), b), out_height, out_width);

            kernel_gradients += &sample_grad.dot(&cols);
            bias_gradients += &sample_grad.sum_axis(Axis(1));

            if let Some(input_gradients) = input_gradients.as_mut() {
                let grad_cols = sample_grad.t().dot(&kernel_matrix);
                let folded = self.col2im(
                    grad_cols.view(),
                    (channels, padded_height, padded_width),
                    out_height,
                    out_width,
                );
                input_gradients.index_axis_mut(Axis(0), b).assign(&folded.slice(s![
                    ..,
                    self.padding.0..padded_height - self.padding.0,
                    self.padding.1..padded_width - self.padding.1
                ]));
            }
        }

        let kernels = kernel_gradients
            .into_shape(self.kernels.raw_dim())
            .map_err(|e| DqnError::TrainingError(e.to_string()))?;

        Ok(ConvGradients {
            input: input_gradients,
            kernels,
            biases: bias_gradients,
        })
    }
}
