use log::{debug, info};
use ndarray::{Array1, Array3, ArrayD, ArrayView1, ArrayView3, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{AgentConfig, ArtifactPaths};
use crate::env::{Discrete, ObservationShape};
use crate::error::{DqnError, Result};
use crate::exploration::EpsilonGreedy;
use crate::network::{argmax, ConvQNetwork, QNetwork};
use crate::replay_buffer::{ReplayMemory, Transition};

/// What a call to [`DqnAgent::replay`] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReplayOutcome {
    /// Memory held fewer transitions than one batch; nothing was trained.
    Skipped { available: usize, required: usize },
    Trained { samples: usize, mean_loss: f32 },
}

impl ReplayOutcome {
    pub fn mean_loss(&self) -> Option<f32> {
        match self {
            ReplayOutcome::Trained { mean_loss, .. } => Some(*mean_loss),
            ReplayOutcome::Skipped { .. } => None,
        }
    }
}

/// Deep Q-Network agent with a replay memory and a softly updated target network.
///
/// The policy network picks actions and is trained by gradient descent. The
/// target network only provides bootstrap values and follows the policy through
/// Polyak averaging in [`DqnAgent::soft_update_target`].
///
/// # Example
///
/// ```rust,no_run
/// use territory_dqn::agent::DqnAgent;
/// use territory_dqn::config::AgentConfig;
/// use territory_dqn::env::{Discrete, ObservationShape};
/// use ndarray::Array3;
///
/// let config = AgentConfig { seed: Some(7), ..AgentConfig::default() };
/// let mut agent = DqnAgent::new(&config, ObservationShape::new(1, 20, 20), Discrete::new(5)).unwrap();
///
/// let state = Array3::<f32>::zeros((1, 20, 20));
/// let action = agent.act(state.view()).unwrap();
/// agent.remember(state.clone(), action, 1.0, state, false).unwrap();
/// agent.replay().unwrap();
/// agent.soft_update_target().unwrap();
/// ```
pub struct DqnAgent<N: QNetwork = ConvQNetwork> {
    policy: N,
    target: N,
    memory: ReplayMemory,
    exploration: EpsilonGreedy,
    action_space: Discrete,
    gamma: f32,
    tau: f32,
    batch_size: usize,
    artifacts: ArtifactPaths,
    rng: StdRng,
    train_steps: usize,
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

impl DqnAgent<ConvQNetwork> {
    /// Build an agent with freshly initialized convolutional networks.
    ///
    /// With `config.reuse_model` set, both networks are restored from
    /// `config.artifacts` instead. Any load failure is returned as
    /// [`DqnError::ArtifactLoad`]; there is no fallback to random weights.
    pub fn new(config: &AgentConfig, observation_shape: ObservationShape, action_space: Discrete) -> Result<Self> {
        config.validate()?;
        let mut rng = seeded_rng(config.seed);
        let mut policy = ConvQNetwork::new(observation_shape, action_space.n, &config.network, &mut rng)?;
        let mut target = ConvQNetwork::new(observation_shape, action_space.n, &config.network, &mut rng)?;

        if config.reuse_model {
            policy.load_weights(&config.artifacts.policy)?;
            target.load_weights(&config.artifacts.target)?;
            info!(
                "Restored networks from {} and {}",
                config.artifacts.policy.display(),
                config.artifacts.target.display()
            );
        }

        Self::assemble(config, policy, target, rng)
    }
}

impl<N: QNetwork> DqnAgent<N> {
    /// Build an agent around networks constructed by the caller.
    pub fn with_networks(config: &AgentConfig, policy: N, target: N) -> Result<Self> {
        config.validate()?;
        Self::assemble(config, policy, target, seeded_rng(config.seed))
    }

    fn assemble(config: &AgentConfig, policy: N, target: N, rng: StdRng) -> Result<Self> {
        if policy.num_actions() == 0 {
            return Err(DqnError::invalid_parameter("num_actions", "networks must score at least one action"));
        }
        if policy.input_shape() != target.input_shape() || policy.num_actions() != target.num_actions() {
            return Err(DqnError::dimension_mismatch(
                format!("target network {:?} -> {}", policy.input_shape().dims(), policy.num_actions()),
                format!("target network {:?} -> {}", target.input_shape().dims(), target.num_actions()),
            ));
        }

        Ok(DqnAgent {
            action_space: Discrete::new(policy.num_actions()),
            policy,
            target,
            memory: ReplayMemory::try_new(config.memory_capacity)?,
            exploration: EpsilonGreedy::new(config.epsilon, config.epsilon_min, config.epsilon_decay)?,
            gamma: config.gamma,
            tau: config.tau,
            batch_size: config.batch_size,
            artifacts: config.artifacts.clone(),
            rng,
            train_steps: 0,
        })
    }

    /// Choose an action epsilon-greedily.
    ///
    /// Every call first decays epsilon by one step (floored at `epsilon_min`),
    /// then explores with the decayed probability. Use
    /// [`DqnAgent::greedy_action`] to query the policy without side effects on
    /// the schedule.
    pub fn act(&mut self, state: ArrayView3<f32>) -> Result<usize> {
        self.exploration.decay();
        if self.exploration.should_explore(&mut self.rng) {
            return Ok(self.action_space.sample(&mut self.rng));
        }
        self.greedy_action(state)
    }

    /// Highest-valued action under the policy network, first index on ties.
    pub fn greedy_action(&mut self, state: ArrayView3<f32>) -> Result<usize> {
        let values = self.policy.predict(state)?;
        argmax(values.view())
            .ok_or_else(|| DqnError::TrainingError(format!("no comparable action value in {:?}", values)))
    }

    /// Store a transition in replay memory.
    pub fn remember(
        &mut self,
        state: Array3<f32>,
        action: usize,
        reward: f32,
        next_state: Array3<f32>,
        done: bool,
    ) -> Result<()> {
        if !self.action_space.contains(action) {
            return Err(DqnError::InvalidAction { action, num_actions: self.action_space.n });
        }
        let shape = self.policy.input_shape();
        shape.check(&state)?;
        shape.check(&next_state)?;
        self.memory.push(Transition { state, action, reward, next_state, done });
        Ok(())
    }

    /// Train the policy network on one uniformly sampled batch.
    ///
    /// Returns [`ReplayOutcome::Skipped`] while memory holds less than one batch.
    /// Bootstrap targets for the whole batch come from the target network as it
    /// was before this call; the policy is then fitted one sample at a time.
    pub fn replay(&mut self) -> Result<ReplayOutcome> {
        let batch = match self.memory.sample_with(&mut self.rng, self.batch_size) {
            Ok(batch) => batch,
            Err(DqnError::InsufficientData { requested, available }) => {
                debug!("Replay skipped: {} of {} transitions in memory", available, requested);
                return Ok(ReplayOutcome::Skipped { available, required: requested });
            }
            Err(e) => return Err(e),
        };

        let states: Vec<ArrayView3<f32>> = batch.iter().map(|t| t.state.view()).collect();
        let next_states: Vec<ArrayView3<f32>> = batch.iter().map(|t| t.next_state.view()).collect();
        let states = ndarray::stack(Axis(0), &states)
            .map_err(|e| DqnError::TrainingError(e.to_string()))?;
        let next_states = ndarray::stack(Axis(0), &next_states)
            .map_err(|e| DqnError::TrainingError(e.to_string()))?;

        let current = self.target.predict_batch(states.view())?;
        let future = self.target.predict_batch(next_states.view())?;

        let mut targets = Vec::with_capacity(batch.len());
        for (i, transition) in batch.iter().enumerate() {
            targets.push(compute_target(
                current.row(i).to_owned(),
                future.row(i),
                transition.action,
                transition.reward,
                transition.done,
                self.gamma,
            )?);
        }

        let mut total_loss = 0.0;
        for (transition, target) in batch.iter().zip(targets.iter()) {
            total_loss += self.policy.fit(transition.state.view(), target.view())?;
        }

        self.train_steps += 1;
        let samples = batch.len();
        Ok(ReplayOutcome::Trained {
            samples,
            mean_loss: total_loss / samples as f32,
        })
    }

    /// Move every target weight `tau` of the way toward the policy weight.
    pub fn soft_update_target(&mut self) -> Result<()> {
        let blended = polyak_blend(&self.policy.get_weights(), &self.target.get_weights(), self.tau)?;
        self.target.set_weights(blended)
    }

    /// Write both networks to their artifact paths, replacing previous files.
    pub fn save_models(&self) -> Result<()> {
        self.policy.save_weights(&self.artifacts.policy)?;
        self.target.save_weights(&self.artifacts.target)
    }

    /// Restore both networks from their artifact paths.
    pub fn load_models(&mut self) -> Result<()> {
        self.policy.load_weights(&self.artifacts.policy)?;
        self.target.load_weights(&self.artifacts.target)
    }

    pub fn epsilon(&self) -> f32 {
        self.exploration.epsilon()
    }

    pub fn exploration(&self) -> &EpsilonGreedy {
        &self.exploration
    }

    pub fn memory(&self) -> &ReplayMemory {
        &self.memory
    }

    pub fn policy(&self) -> &N {
        &self.policy
    }

    pub fn target(&self) -> &N {
        &self.target
    }

    pub fn action_space(&self) -> Discrete {
        self.action_space
    }

    pub fn artifacts(&self) -> &ArtifactPaths {
        &self.artifacts
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of replays that actually trained.
    pub fn train_steps(&self) -> usize {
        self.train_steps
    }
}

/// Regression target for one transition.
///
/// `values` are the target network's estimates for the state; only the taken
/// action's entry is replaced, by `reward` on terminal transitions and by
/// `reward + gamma * max(next_values)` otherwise.
pub fn compute_target(
    mut values: Array1<f32>,
    next_values: ArrayView1<f32>,
    action: usize,
    reward: f32,
    done: bool,
    gamma: f32,
) -> Result<Array1<f32>> {
    let num_actions = values.len();
    let slot = values
        .get_mut(action)
        .ok_or(DqnError::InvalidAction { action, num_actions })?;
    *slot = if done {
        reward
    } else {
        let best = next_values.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        reward + gamma * best
    };
    Ok(values)
}

/// `tau * policy + (1 - tau) * target`, tensor by tensor.
pub fn polyak_blend(policy: &[ArrayD<f32>], target: &[ArrayD<f32>], tau: f32) -> Result<Vec<ArrayD<f32>>> {
    if policy.len() != target.len() {
        return Err(DqnError::dimension_mismatch(
            format!("{} tensors", target.len()),
            format!("{} tensors", policy.len()),
        ));
    }
    policy
        .iter()
        .zip(target.iter())
        .map(|(p, t)| {
            if p.shape() != t.shape() {
                return Err(DqnError::dimension_mismatch(
                    format!("{:?}", t.shape()),
                    format!("{:?}", p.shape()),
                ));
            }
            let mut blended = t.clone();
            blended.zip_mut_with(p, |t, &w| *t = tau * w + (1.0 - tau) * *t);
            Ok(blended)
        })
        .collect()
}
