use ndarray::{Array, Dimension};
use serde::{Serialize, Deserialize};

/// An enumeration of the possible activation functions that can be used in a neural network layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Activation {
    #[default]
    Relu,
    Linear,
}

impl Activation {
    /// Apply the activation function to an array of any dimension in-place.
    pub fn apply<D: Dimension>(&self, input: &mut Array<f32, D>) {
        match self {
            Activation::Relu => {
                input.mapv_inplace(|v| v.max(0.0));
            }
            Activation::Linear => {}
        }
    }

    /// Compute the derivative of the activation function at the given pre-activation values.
    pub fn derivative<D: Dimension>(&self, pre_activation: &Array<f32, D>) -> Array<f32, D> {
        match self {
            Activation::Relu => {
                pre_activation.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 })
            }
            Activation::Linear => {
                // Derivative of linear activation is always 1
                Array::ones(pre_activation.raw_dim())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array4};

    #[test]
    fn test_relu_apply_and_derivative() {
        let mut x = array![[-1.0, 0.0], [0.5, 3.0]];
        let pre = x.clone();
        Activation::Relu.apply(&mut x);
        assert_eq!(x, array![[0.0, 0.0], [0.5, 3.0]]);
        assert_eq!(Activation::Relu.derivative(&pre), array![[0.0, 0.0], [1.0, 1.0]]);
    }

    #[test]
    fn test_linear_is_identity() {
        let mut x = Array4::from_elem((1, 2, 2, 2), -3.0f32);
        Activation::Linear.apply(&mut x);
        assert!(x.iter().all(|&v| v == -3.0));
        assert!(Activation::Linear.derivative(&x).iter().all(|&v| v == 1.0));
    }
}
