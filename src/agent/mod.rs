//! # Deep Q-Network agent
//!
//! [`DqnAgent`] owns a policy network, a target network and a replay memory.
//! One training cycle looks like:
//!
//! 1. [`DqnAgent::act`] picks an action epsilon-greedily (decaying epsilon)
//! 2. [`DqnAgent::remember`] stores the resulting transition
//! 3. [`DqnAgent::replay`] fits the policy on a sampled batch
//! 4. [`DqnAgent::soft_update_target`] blends the policy into the target network
//!
//! The agent is generic over [`crate::network::QNetwork`], so any value
//! function approximator with the same capabilities can stand in for the
//! default [`crate::network::ConvQNetwork`].

mod dqn;
pub use dqn::{compute_target, polyak_blend, DqnAgent, ReplayOutcome};
