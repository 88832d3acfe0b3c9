//! # territory-dqn - Deep Q-learning for grid territory games
//!
//! A DQN trainer for games played on a grid, where the agent observes the
//! board as a stack of `(channels, height, width)` planes and picks one of a
//! small set of discrete moves.
//!
//! ## Key Features
//!
//! - **Convolutional Q-network**: two convolutions, max pooling and a dense head,
//!   trained with Adam on a mean squared error
//! - **Replay memory**: fixed-capacity FIFO with uniform sampling
//! - **Target network**: bootstrap values from a Polyak-averaged copy of the policy
//! - **Epsilon-greedy exploration** with per-action decay
//! - **Atomic persistence** of both networks after every episode
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use territory_dqn::config::TrainingConfig;
//! use territory_dqn::env::Environment;
//! use territory_dqn::trainer::Trainer;
//!
//! fn train<E: Environment>(env: E) -> territory_dqn::Result<()> {
//!     let config = TrainingConfig::from_json_file("training.json")?;
//!     let mut trainer = Trainer::from_config(env, &config)?;
//!     let summary = trainer.run()?;
//!     println!("{} episodes, {} steps", summary.episodes, summary.total_steps);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`activations`] - ReLU and linear activations
//! - [`agent`] - The DQN agent: act, remember, replay, soft update
//! - [`config`] - Serializable hyperparameters
//! - [`env`] - The environment contract and action/observation spaces
//! - [`error`] - Error types and result handling
//! - [`exploration`] - Epsilon-greedy schedule
//! - [`layers`] - Convolution, pooling and dense layers
//! - [`loss`] - Loss functions for training
//! - [`metrics`] - Per-episode metrics
//! - [`network`] - The Q-network trait and its convolutional implementation
//! - [`optimizer`] - SGD and Adam
//! - [`persistence`] - Atomic artifact files
//! - [`replay_buffer`] - Experience replay
//! - [`trainer`] - The episode loop

pub mod activations;
pub mod agent;
pub mod config;
pub mod env;
pub mod error;
pub mod exploration;
pub mod layers;
pub mod loss;
pub mod metrics;
pub mod network;
pub mod optimizer;
pub mod persistence;
pub mod replay_buffer;
pub mod trainer;

pub use error::{DqnError, Result};

#[cfg(test)]
mod tests;
