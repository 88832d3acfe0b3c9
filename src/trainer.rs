//! The episode loop.
//!
//! Each trial resets the environment, plays up to `trial_len` steps while
//! filling replay memory, then runs one replay and one soft target update
//! before saving both networks. There is no early stopping.

use log::{info, warn};
use ndarray::Array3;
use std::time::Instant;

use crate::agent::DqnAgent;
use crate::config::{TrainerConfig, TrainingConfig};
use crate::env::Environment;
use crate::error::{DqnError, Result};
use crate::metrics::{EpisodeReport, MetricsTracker};
use crate::network::{ConvQNetwork, QNetwork};

/// What [`Trainer::run`] accomplished.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSummary {
    pub episodes: usize,
    pub total_steps: usize,
    /// The most recent episode reports, oldest first
    pub reports: Vec<EpisodeReport>,
}

pub struct Trainer<E: Environment, N: QNetwork = ConvQNetwork> {
    env: E,
    agent: DqnAgent<N>,
    config: TrainerConfig,
    metrics: MetricsTracker,
}

impl<E: Environment> Trainer<E> {
    /// Build the agent for `env` from a full training configuration.
    pub fn from_config(env: E, config: &TrainingConfig) -> Result<Self> {
        config.validate()?;
        let agent = DqnAgent::new(&config.agent, env.observation_shape(), env.action_space())?;
        Self::new(env, agent, config.trainer.clone())
    }
}

impl<E: Environment, N: QNetwork> Trainer<E, N> {
    pub fn new(env: E, agent: DqnAgent<N>, config: TrainerConfig) -> Result<Self> {
        config.validate()?;
        if env.action_space() != agent.action_space() {
            return Err(DqnError::dimension_mismatch(
                format!("{} actions", agent.action_space().n),
                format!("{} actions", env.action_space().n),
            ));
        }
        if env.observation_shape() != agent.policy().input_shape() {
            return Err(DqnError::dimension_mismatch(
                format!("observation of shape {:?}", agent.policy().input_shape().dims()),
                format!("observation of shape {:?}", env.observation_shape().dims()),
            ));
        }

        Ok(Trainer {
            env,
            agent,
            metrics: MetricsTracker::new(config.history),
            config,
        })
    }

    /// Run all configured trials. The first error aborts the run.
    pub fn run(&mut self) -> Result<TrainingSummary> {
        let mut total_steps = 0;
        for trial in 0..self.config.trials {
            let report = self.run_episode(trial)?;
            total_steps += report.steps;
        }
        Ok(TrainingSummary {
            episodes: self.config.trials,
            total_steps,
            reports: self.metrics.reports().copied().collect(),
        })
    }

    /// Play one episode, then train and persist.
    pub fn run_episode(&mut self, trial: usize) -> Result<EpisodeReport> {
        let started = Instant::now();
        let played = self.play(trial);
        self.env.close();
        let (steps, score) = played?;

        let seconds_per_step = started.elapsed().as_secs_f64() / steps.max(1) as f64;
        info!(
            "Trial {} : final score {} in {} steps ({:.3}s per step)",
            trial, score, steps, seconds_per_step
        );

        let training_started = Instant::now();
        let outcome = self.agent.replay()?;
        self.agent.soft_update_target()?;
        let training_secs = training_started.elapsed().as_secs_f64();
        info!("Trial {} : training took {:.3}s", trial, training_secs);
        self.agent.save_models()?;

        let report = EpisodeReport {
            trial,
            score,
            steps,
            seconds_per_step,
            training_secs,
            loss: outcome.mean_loss(),
            epsilon: self.agent.epsilon(),
        };
        self.metrics.record_episode(report);
        Ok(report)
    }

    /// Step loop of one episode; returns (steps taken, final score).
    fn play(&mut self, trial: usize) -> Result<(usize, f64)> {
        let mut state = self.env.reset()?;
        self.check_observation(trial, &state)?;

        let mut steps = 0;
        let mut score = 0.0;
        for _ in 0..self.config.trial_len {
            let action = self.agent.act(state.view())?;
            let step = self.env.step(action)?;
            self.check_observation(trial, &step.observation)?;

            steps += 1;
            score = step.info.score;
            self.agent
                .remember(state, action, step.reward, step.observation.clone(), step.done)?;
            state = step.observation;
            if step.done {
                break;
            }
        }
        Ok((steps, score))
    }

    fn check_observation(&self, trial: usize, observation: &Array3<f32>) -> Result<()> {
        self.env.observation_shape().check(observation).map_err(|e| {
            warn!("Trial {} : {}", trial, e);
            e
        })
    }

    pub fn agent(&self) -> &DqnAgent<N> {
        &self.agent
    }

    pub fn agent_mut(&mut self) -> &mut DqnAgent<N> {
        &mut self.agent
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn metrics(&self) -> &MetricsTracker {
        &self.metrics
    }

    pub fn into_parts(self) -> (E, DqnAgent<N>) {
        (self.env, self.agent)
    }
}
