//! Training configuration.
//!
//! Every struct derives serde and carries the reference hyperparameters as its
//! `Default`, so a partial JSON file only needs the fields it overrides.

use serde::{Serialize, Deserialize};
use std::path::{Path, PathBuf};

use crate::error::{DqnError, Result};
use crate::layers::WeightInit;
use crate::optimizer::OptimizerConfig;

/// Architecture of the convolutional Q-network.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Filters in each of the two convolution stages
    pub filters: usize,
    pub kernel_size: usize,
    pub pool_size: usize,
    pub hidden_units: usize,
    pub learning_rate: f32,
    pub optimizer: OptimizerConfig,
    /// Initializer for every layer's weights; Glorot uniform by default
    pub weight_init: WeightInit,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            filters: 24,
            kernel_size: 7,
            pool_size: 2,
            hidden_units: 24,
            learning_rate: 0.005,
            optimizer: OptimizerConfig::default(),
            weight_init: WeightInit::default(),
        }
    }
}

/// Where the two weight artifacts live.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ArtifactPaths {
    pub policy: PathBuf,
    pub target: PathBuf,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        ArtifactPaths {
            policy: PathBuf::from("model.bin"),
            target: PathBuf::from("target_model.bin"),
        }
    }
}

impl ArtifactPaths {
    /// Both artifacts under `dir`, with the default file names.
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let defaults = Self::default();
        ArtifactPaths {
            policy: dir.as_ref().join(defaults.policy),
            target: dir.as_ref().join(defaults.target),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// Discount factor
    pub gamma: f32,
    pub epsilon: f32,
    pub epsilon_min: f32,
    pub epsilon_decay: f32,
    /// Polyak factor for the target network
    pub tau: f32,
    pub batch_size: usize,
    pub memory_capacity: usize,
    /// Restore both networks from `artifacts` instead of starting fresh
    pub reuse_model: bool,
    /// Seed for weight init, sampling and exploration; entropy when absent
    pub seed: Option<u64>,
    pub network: NetworkConfig,
    pub artifacts: ArtifactPaths,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            gamma: 0.85,
            epsilon: 1.0,
            epsilon_min: 0.01,
            epsilon_decay: 0.995,
            tau: 0.125,
            batch_size: 32,
            memory_capacity: 2000,
            reuse_model: false,
            seed: None,
            network: NetworkConfig::default(),
            artifacts: ArtifactPaths::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct TrainerConfig {
    /// Number of episodes to run
    pub trials: usize,
    /// Step cap per episode
    pub trial_len: usize,
    /// Episodes kept in the metrics history
    pub history: usize,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            trials: 1_000_000,
            trial_len: 500,
            history: 1000,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(default)]
pub struct TrainingConfig {
    pub agent: AgentConfig,
    pub trainer: TrainerConfig,
}

fn check(ok: bool, name: &str, reason: String) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(DqnError::invalid_parameter(name.to_string(), reason))
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<()> {
        check(self.filters > 0, "filters", "must be positive".to_string())?;
        check(self.kernel_size > 0, "kernel_size", "must be positive".to_string())?;
        check(self.pool_size > 0, "pool_size", "must be positive".to_string())?;
        check(self.hidden_units > 0, "hidden_units", "must be positive".to_string())?;
        check(
            self.learning_rate > 0.0 && self.learning_rate.is_finite(),
            "learning_rate",
            format!("must be a positive finite number, got {}", self.learning_rate),
        )
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        check((0.0..=1.0).contains(&self.gamma), "gamma", format!("must lie in [0, 1], got {}", self.gamma))?;
        check(self.tau > 0.0 && self.tau <= 1.0, "tau", format!("must lie in (0, 1], got {}", self.tau))?;
        check(self.batch_size > 0, "batch_size", "must be positive".to_string())?;
        check(
            self.memory_capacity >= self.batch_size,
            "memory_capacity",
            format!("must hold at least one batch ({}), got {}", self.batch_size, self.memory_capacity),
        )?;
        // Exploration bounds are checked by the schedule itself
        crate::exploration::EpsilonGreedy::new(self.epsilon, self.epsilon_min, self.epsilon_decay)?;
        self.network.validate()
    }
}

impl TrainerConfig {
    pub fn validate(&self) -> Result<()> {
        check(self.trial_len > 0, "trial_len", "must be positive".to_string())?;
        check(self.history > 0, "history", "must be positive".to_string())
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        self.agent.validate()?;
        self.trainer.validate()
    }

    /// Read and validate a JSON configuration file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_reference_hyperparameters() {
        let config = TrainingConfig::default();
        assert_eq!(config.agent.gamma, 0.85);
        assert_eq!(config.agent.tau, 0.125);
        assert_eq!(config.agent.batch_size, 32);
        assert_eq!(config.agent.memory_capacity, 2000);
        assert_eq!(config.agent.network.learning_rate, 0.005);
        assert_eq!(config.agent.network.weight_init, WeightInit::XavierUniform);
        assert_eq!(config.trainer.trial_len, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: TrainingConfig =
            serde_json::from_str(r#"{ "agent": { "gamma": 0.5, "network": { "filters": 4 } } }"#).unwrap();
        assert_eq!(config.agent.gamma, 0.5);
        assert_eq!(config.agent.network.filters, 4);
        assert_eq!(config.agent.network.kernel_size, 7);
        assert_eq!(config.trainer.trials, 1_000_000);
    }

    #[test]
    fn test_json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = TrainingConfig::default();
        config.agent.seed = Some(42);
        config.agent.network.optimizer = OptimizerConfig::Sgd;
        config.to_json_file(&path).unwrap();
        assert_eq!(TrainingConfig::from_json_file(&path).unwrap(), config);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AgentConfig::default();
        config.tau = 0.0;
        assert!(config.validate().is_err());

        let mut config = AgentConfig::default();
        config.memory_capacity = 16;
        assert!(config.validate().is_err());

        let mut config = AgentConfig::default();
        config.epsilon_min = 2.0;
        assert!(config.validate().is_err());

        let trainer = TrainerConfig { trial_len: 0, ..TrainerConfig::default() };
        assert!(trainer.validate().is_err());
    }
}
