use ndarray::{Array, Dimension};
use ndarray_rand::RandomExt;
use rand_distr::Uniform;
use rand::Rng;
use serde::{Serialize, Deserialize};

/// Weight initialization strategies
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WeightInit {
    /// Xavier/Glorot uniform initialization
    #[default]
    XavierUniform,

    /// He/Kaiming uniform initialization (for ReLU)
    HeUniform,

    /// Uniform distribution with custom range
    Uniform { min: f32, max: f32 },

    /// All zeros
    Zeros,
}

impl WeightInit {
    /// Initialize a weight tensor of any rank.
    ///
    /// `fan_in` and `fan_out` are the number of inputs feeding and outputs fed by
    /// one unit; for convolutions this includes the receptive field size.
    pub fn initialize<D: Dimension, R: Rng + ?Sized>(
        &self,
        shape: D,
        fan_in: usize,
        fan_out: usize,
        rng: &mut R,
    ) -> Array<f32, D> {
        match self {
            WeightInit::XavierUniform => {
                let limit = (6.0 / (fan_in + fan_out).max(1) as f32).sqrt();
                Array::random_using(shape, Uniform::new_inclusive(-limit, limit), rng)
            }

            WeightInit::HeUniform => {
                let limit = (6.0 / fan_in.max(1) as f32).sqrt();
                Array::random_using(shape, Uniform::new_inclusive(-limit, limit), rng)
            }

            WeightInit::Uniform { min, max } => {
                Array::random_using(shape, Uniform::new_inclusive(*min, *max), rng)
            }

            WeightInit::Zeros => Array::zeros(shape),
        }
    }
}
