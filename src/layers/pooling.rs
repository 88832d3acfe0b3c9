//! Max pooling for downsampling convolutional feature maps

use ndarray::{Array4, ArrayView4};
use serde::{Serialize, Deserialize};

use crate::error::{DqnError, Result};

/// 2D Max Pooling Layer
///
/// Applies max pooling over spatial dimensions to reduce size and extract dominant features.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MaxPool2DLayer {
    /// Pooling window size
    pub pool_size: (usize, usize),

    /// Stride for pooling
    pub stride: (usize, usize),

    /// Argmax location of every output cell, for the backward pass
    #[serde(skip)]
    cached_indices: Option<Array4<(usize, usize)>>,

    #[serde(skip)]
    cached_input_shape: Option<(usize, usize, usize, usize)>,
}

impl MaxPool2DLayer {
    /// Create a new 2D max pooling layer; the stride defaults to the window size.
    pub fn new(pool_size: (usize, usize), stride: Option<(usize, usize)>) -> Self {
        MaxPool2DLayer {
            pool_size,
            stride: stride.unwrap_or(pool_size),
            cached_indices: None,
            cached_input_shape: None,
        }
    }

    /// Spatial output size for an input of the given size, or `None` if the window does not fit.
    pub fn output_dims(&self, in_height: usize, in_width: usize) -> Option<(usize, usize)> {
        if self.stride.0 == 0
            || self.stride.1 == 0
            || self.pool_size.0 == 0
            || self.pool_size.1 == 0
            || in_height < self.pool_size.0
            || in_width < self.pool_size.1
        {
            return None;
        }
        Some((
            (in_height - self.pool_size.0) / self.stride.0 + 1,
            (in_width - self.pool_size.1) / self.stride.1 + 1,
        ))
    }

    /// Forward pass for batch of images [batch, channels, height, width]
    pub fn forward_batch(&mut self, input: ArrayView4<f32>) -> Result<Array4<f32>> {
        let (batch_size, channels, in_height, in_width) = input.dim();
        let (out_height, out_width) = self.output_dims(in_height, in_width).ok_or_else(|| {
            DqnError::dimension_mismatch(
                format!("feature map of at least {:?}", self.pool_size),
                format!("feature map of {}x{}", in_height, in_width),
            )
        })?;

        let mut output = Array4::zeros((batch_size, channels, out_height, out_width));
        let mut indices = Array4::from_elem((batch_size, channels, out_height, out_width), (0, 0));

        for b in 0..batch_size {
            for c in 0..channels {
                for oh in 0..out_height {
                    for ow in 0..out_width {
                        let h_start = oh * self.stride.0;
                        let w_start = ow * self.stride.1;

                        let mut max_val = f32::NEG_INFINITY;
                        let mut max_pos = (h_start, w_start);
                        for h in h_start..h_start + self.pool_size.0 {
                            for w in w_start..w_start + self.pool_size.1 {
                                let val = input[[b, c, h, w]];
                                if val > max_val {
                                    max_val = val;
                                    max_pos = (h, w);
                                }
                            }
                        }

                        output[[b, c, oh, ow]] = max_val;
                        indices[[b, c, oh, ow]] = max_pos;
                    }
                }
            }
        }

        self.cached_input_shape = Some((batch_size, channels, in_height, in_width));
        self.cached_indices = Some(indices);
        Ok(output)
    }

    /// Backward pass: route each gradient to the input cell that won the max.
    pub fn backward_batch(&self, output_gradient: ArrayView4<f32>) -> Result<Array4<f32>> {
        let (indices, input_shape) = match (&self.cached_indices, self.cached_input_shape) {
            (Some(indices), Some(shape)) => (indices, shape),
            _ => return Err(DqnError::TrainingError(
                "pooling backward pass requested before a forward pass".to_string(),
            )),
        };
        if output_gradient.dim() != indices.dim() {
            return Err(DqnError::dimension_mismatch(
                format!("{:?}", indices.dim()),
                format!("{:?}", output_gradient.dim()),
            ));
        }

        let mut input_gradient = Array4::zeros(input_shape);
        for ((b, c, oh, ow), &(h, w)) in indices.indexed_iter() {
            input_gradient[[b, c, h, w]] += output_gradient[[b, c, oh, ow]];
        }
        Ok(input_gradient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_pool_forward_and_backward() {
        let mut pool = MaxPool2DLayer::new((2, 2), None);
        let input = Array4::from_shape_vec(
            (1, 1, 4, 4),
            vec![
                1.0, 2.0, 0.0, 0.0,
                3.0, 4.0, 0.0, 9.0,
                0.0, 0.0, 5.0, 0.0,
                7.0, 0.0, 0.0, 6.0,
            ],
        ).unwrap();

        let output = pool.forward_batch(input.view()).unwrap();
        assert_eq!(output.into_raw_vec(), vec![4.0, 9.0, 7.0, 6.0]);

        let grad = pool.backward_batch(Array4::ones((1, 1, 2, 2)).view()).unwrap();
        assert_eq!(grad[[0, 0, 1, 1]], 1.0);
        assert_eq!(grad[[0, 0, 1, 3]], 1.0);
        assert_eq!(grad[[0, 0, 3, 0]], 1.0);
        assert_eq!(grad[[0, 0, 3, 3]], 1.0);
        assert_eq!(grad.sum(), 4.0);
    }

    #[test]
    fn test_odd_sizes_floor() {
        let mut pool = MaxPool2DLayer::new((2, 2), None);
        let output = pool.forward_batch(Array4::zeros((2, 3, 5, 7)).view()).unwrap();
        assert_eq!(output.dim(), (2, 3, 2, 3));
    }
}
