//! Environment adapter contract.
//!
//! The training loop only ever talks to the game through [`Environment`]:
//! `reset`, `step`, the discrete action space and the observation shape.
//! Observations are `(channels, height, width)` grids of `f32`.

use ndarray::Array3;
use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::error::{DqnError, Result};

/// Shape of one observation grid.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObservationShape {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl ObservationShape {
    pub fn new(channels: usize, height: usize, width: usize) -> Self {
        ObservationShape { channels, height, width }
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        (self.channels, self.height, self.width)
    }

    pub fn len(&self) -> usize {
        self.channels * self.height * self.width
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check an observation against this shape.
    pub fn check(&self, observation: &Array3<f32>) -> Result<()> {
        if observation.dim() != self.dims() {
            return Err(DqnError::Environment(format!(
                "malformed observation: expected shape {:?}, got {:?}",
                self.dims(),
                observation.dim()
            )));
        }
        Ok(())
    }
}

/// A discrete action space `{0, 1, ..., n - 1}`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Discrete {
    pub n: usize,
}

impl Discrete {
    pub fn new(n: usize) -> Self {
        Discrete { n }
    }

    /// Draw an action uniformly at random.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        rng.gen_range(0..self.n)
    }

    pub fn contains(&self, action: usize) -> bool {
        action < self.n
    }
}

/// Auxiliary information reported with every step.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct StepInfo {
    /// Game score, read at the end of each episode for reporting
    pub score: f64,
}

/// Outcome of one environment step.
#[derive(Clone, Debug)]
pub struct Step {
    pub observation: Array3<f32>,
    pub reward: f32,
    pub done: bool,
    pub info: StepInfo,
}

/// A game the agent can be trained against.
///
/// Implementations report failures as [`DqnError::Environment`]; the trainer
/// propagates them without retrying.
pub trait Environment {
    /// Start a new episode and return the initial observation.
    fn reset(&mut self) -> Result<Array3<f32>>;

    /// Apply an action.
    fn step(&mut self, action: usize) -> Result<Step>;

    fn action_space(&self) -> Discrete;

    fn observation_shape(&self) -> ObservationShape;

    /// Release per-episode resources. Called after every episode.
    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_discrete_sample_in_range() {
        let space = Discrete::new(4);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            assert!(space.contains(space.sample(&mut rng)));
        }
        assert!(!space.contains(4));
    }

    #[test]
    fn test_shape_check() {
        let shape = ObservationShape::new(2, 3, 4);
        assert!(shape.check(&Array3::zeros((2, 3, 4))).is_ok());
        assert!(matches!(shape.check(&Array3::zeros((3, 2, 4))), Err(DqnError::Environment(_))));
        assert_eq!(shape.len(), 24);
    }
}
