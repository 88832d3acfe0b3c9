use territory_dqn::{
    config::{ArtifactPaths, NetworkConfig, TrainingConfig},
    env::{Discrete, Environment, ObservationShape, Step, StepInfo},
    error::DqnError,
    network::QNetwork,
    trainer::Trainer,
};
use ndarray::Array3;

/// A 1x6x6 board where the agent walks a marker around; the episode ends
/// after `episode_len` steps.
struct MarkerEnv {
    episode_len: usize,
    fail_at: Option<usize>,
    malformed_at: Option<usize>,
    position: usize,
    steps: usize,
    resets: usize,
    closes: usize,
}

impl MarkerEnv {
    fn new(episode_len: usize) -> Self {
        MarkerEnv {
            episode_len,
            fail_at: None,
            malformed_at: None,
            position: 0,
            steps: 0,
            resets: 0,
            closes: 0,
        }
    }

    fn observation(&self) -> Array3<f32> {
        let mut board = Array3::zeros((1, 6, 6));
        board[[0, self.position / 6, self.position % 6]] = 1.0;
        board
    }
}

impl Environment for MarkerEnv {
    fn reset(&mut self) -> territory_dqn::Result<Array3<f32>> {
        self.position = 0;
        self.steps = 0;
        self.resets += 1;
        Ok(self.observation())
    }

    fn step(&mut self, action: usize) -> territory_dqn::Result<Step> {
        self.steps += 1;
        if self.fail_at == Some(self.steps) {
            return Err(DqnError::Environment("game server went away".to_string()));
        }
        self.position = (self.position + action + 1) % 36;
        let observation = if self.malformed_at == Some(self.steps) {
            Array3::zeros((1, 5, 6))
        } else {
            self.observation()
        };
        Ok(Step {
            observation,
            reward: if action == 0 { 1.0 } else { -0.1 },
            done: self.steps >= self.episode_len,
            info: StepInfo { score: self.steps as f64 * 10.0 },
        })
    }

    fn action_space(&self) -> Discrete {
        Discrete::new(3)
    }

    fn observation_shape(&self) -> ObservationShape {
        ObservationShape::new(1, 6, 6)
    }

    fn close(&mut self) {
        self.closes += 1;
    }
}

fn training_config(dir: &std::path::Path, trials: usize, trial_len: usize) -> TrainingConfig {
    let mut config = TrainingConfig::default();
    config.agent.seed = Some(5);
    config.agent.network = NetworkConfig {
        filters: 2,
        kernel_size: 3,
        hidden_units: 4,
        ..NetworkConfig::default()
    };
    config.agent.artifacts = ArtifactPaths::in_dir(dir);
    config.trainer.trials = trials;
    config.trainer.trial_len = trial_len;
    config
}

#[test]
fn test_training_run_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let config = training_config(dir.path(), 3, 500);
    let mut trainer = Trainer::from_config(MarkerEnv::new(20), &config).unwrap();

    let summary = trainer.run().unwrap();
    assert_eq!(summary.episodes, 3);
    assert_eq!(summary.total_steps, 60);
    assert_eq!(summary.reports.len(), 3);

    // 20 transitions after the first episode is less than a batch
    assert!(!summary.reports[0].trained());
    assert!(summary.reports[1].trained());
    assert!(summary.reports[2].trained());
    assert_eq!(summary.reports[2].score, 200.0);

    assert_eq!(trainer.agent().memory().len(), 60);
    assert_eq!(trainer.agent().train_steps(), 2);
    assert_eq!(trainer.env().resets, 3);
    assert_eq!(trainer.env().closes, 3);
    assert!(config.agent.artifacts.policy.exists());
    assert!(config.agent.artifacts.target.exists());
    assert_eq!(trainer.metrics().episode_count(), 3);
}

#[test]
fn test_episode_stops_at_trial_len() {
    let dir = tempfile::tempdir().unwrap();
    let config = training_config(dir.path(), 2, 7);
    let mut trainer = Trainer::from_config(MarkerEnv::new(1000), &config).unwrap();

    let summary = trainer.run().unwrap();
    assert!(summary.reports.iter().all(|r| r.steps == 7));
    assert_eq!(summary.total_steps, 14);
}

#[test]
fn test_saved_models_resume_training() {
    let dir = tempfile::tempdir().unwrap();
    let config = training_config(dir.path(), 2, 500);
    let mut trainer = Trainer::from_config(MarkerEnv::new(20), &config).unwrap();
    trainer.run().unwrap();
    let (_, agent) = trainer.into_parts();

    let mut resumed = config.clone();
    resumed.agent.reuse_model = true;
    resumed.agent.seed = Some(123);
    let trainer = Trainer::from_config(MarkerEnv::new(20), &resumed).unwrap();
    assert_eq!(trainer.agent().policy().get_weights(), agent.policy().get_weights());
    assert_eq!(trainer.agent().target().get_weights(), agent.target().get_weights());
}

#[test]
fn test_missing_artifacts_abort_startup() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = training_config(dir.path(), 1, 10);
    config.agent.reuse_model = true;
    match Trainer::from_config(MarkerEnv::new(5), &config) {
        Err(DqnError::ArtifactLoad { .. }) => {}
        Err(other) => panic!("expected ArtifactLoad, got {}", other),
        Ok(_) => panic!("training started without artifacts"),
    }
}

#[test]
fn test_unwritable_artifacts_abort_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = training_config(dir.path(), 3, 10);
    config.agent.artifacts = ArtifactPaths::in_dir(dir.path().join("missing_dir"));
    let mut trainer = Trainer::from_config(MarkerEnv::new(5), &config).unwrap();

    match trainer.run() {
        Err(DqnError::IoError(_)) => {}
        Err(other) => panic!("expected IoError, got {}", other),
        Ok(_) => panic!("training finished without saving its networks"),
    }
    // The failing save aborts the first episode before it is recorded
    assert_eq!(trainer.env().resets, 1);
    assert_eq!(trainer.metrics().reports().count(), 0);
    assert!(!config.agent.artifacts.policy.exists());
}

#[test]
fn test_environment_errors_abort_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = training_config(dir.path(), 5, 100);
    let mut env = MarkerEnv::new(10);
    env.fail_at = Some(4);
    let mut trainer = Trainer::from_config(env, &config).unwrap();

    assert!(matches!(trainer.run(), Err(DqnError::Environment(_))));
    assert_eq!(trainer.env().resets, 1);
    // The episode is still closed before the error surfaces
    assert_eq!(trainer.env().closes, 1);
    // Nothing was persisted for the aborted episode
    assert!(!config.agent.artifacts.policy.exists());
}

#[test]
fn test_malformed_observation_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = training_config(dir.path(), 1, 100);
    let mut env = MarkerEnv::new(10);
    env.malformed_at = Some(2);
    let mut trainer = Trainer::from_config(env, &config).unwrap();

    assert!(matches!(trainer.run(), Err(DqnError::Environment(_))));
    assert_eq!(trainer.agent().memory().len(), 1);
}

#[test]
fn test_config_file_drives_training() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("training.json");
    training_config(dir.path(), 1, 3).to_json_file(&path).unwrap();

    let config = TrainingConfig::from_json_file(&path).unwrap();
    let mut trainer = Trainer::from_config(MarkerEnv::new(50), &config).unwrap();
    let summary = trainer.run().unwrap();
    assert_eq!(summary.total_steps, 3);
}
