//! Epsilon-greedy exploration schedule.

use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::error::{DqnError, Result};

/// Multiplicatively decaying exploration rate, floored at `epsilon_min`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct EpsilonGreedy {
    epsilon: f32,
    epsilon_min: f32,
    decay: f32,
}

impl EpsilonGreedy {
    pub fn new(epsilon: f32, epsilon_min: f32, decay: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&epsilon_min) || !(epsilon_min..=1.0).contains(&epsilon) {
            return Err(DqnError::invalid_parameter(
                "epsilon".to_string(),
                format!("need 0 <= epsilon_min ({}) <= epsilon ({}) <= 1", epsilon_min, epsilon),
            ));
        }
        if !(decay > 0.0 && decay <= 1.0) {
            return Err(DqnError::invalid_parameter(
                "epsilon_decay".to_string(),
                format!("must lie in (0, 1], got {}", decay),
            ));
        }
        Ok(EpsilonGreedy { epsilon, epsilon_min, decay })
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    pub fn epsilon_min(&self) -> f32 {
        self.epsilon_min
    }

    /// Apply one decay step and return the new rate.
    pub fn decay(&mut self) -> f32 {
        self.epsilon = (self.epsilon * self.decay).max(self.epsilon_min);
        self.epsilon
    }

    /// Draw `u ~ U[0, 1)` and report whether it falls below the current rate.
    pub fn should_explore<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.gen::<f32>() < self.epsilon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decay_sequence() {
        let mut schedule = EpsilonGreedy::new(1.0, 0.01, 0.995).unwrap();
        assert!((schedule.decay() - 0.995).abs() < 1e-6);
        assert!((schedule.decay() - 0.990025).abs() < 1e-6);
    }

    #[test]
    fn test_decay_floors_at_minimum() {
        let mut schedule = EpsilonGreedy::new(0.02, 0.01, 0.5).unwrap();
        assert_eq!(schedule.decay(), 0.01);
        assert_eq!(schedule.decay(), 0.01);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(EpsilonGreedy::new(0.005, 0.01, 0.9).is_err());
        assert!(EpsilonGreedy::new(1.0, 0.01, 0.0).is_err());
        assert!(EpsilonGreedy::new(1.5, 0.01, 0.9).is_err());
    }
}
