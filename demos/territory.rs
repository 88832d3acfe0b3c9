//! Train a DQN agent on a small single-player territory game.
//!
//! The player moves on a square board. Leaving its own territory draws a
//! trail; coming back home claims the trail and everything it encloses.
//! Running into the trail or off the board ends the episode.
//!
//! Progress is appended to `training_steps.log`. When `training.json` exists in
//! the working directory it is used as the training configuration.

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use ndarray::Array3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use territory_dqn::config::TrainingConfig;
use territory_dqn::env::{Discrete, Environment, ObservationShape, Step, StepInfo};
use territory_dqn::trainer::Trainer;
use territory_dqn::DqnError;

const SIZE: usize = 20;
const TERRITORY: usize = 0;
const TRAIL: usize = 1;
const HEAD: usize = 2;
const MOVES: [(isize, isize); 4] = [(-1, 0), (0, 1), (1, 0), (0, -1)];

struct TerritoryGame {
    board: Array3<f32>,
    row: usize,
    col: usize,
    rng: StdRng,
}

impl TerritoryGame {
    fn new(seed: u64) -> Self {
        TerritoryGame {
            board: Array3::zeros((3, SIZE, SIZE)),
            row: 0,
            col: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn owned(&self) -> usize {
        self.board.index_axis(ndarray::Axis(0), TERRITORY).iter().filter(|&&v| v > 0.0).count()
    }

    /// Turn the trail into territory, plus every cell the border cannot reach.
    fn claim(&mut self) -> usize {
        let before = self.owned();
        let mut outside = vec![vec![false; SIZE]; SIZE];
        let mut queue = VecDeque::new();
        let blocked = |board: &Array3<f32>, r: usize, c: usize| board[[TERRITORY, r, c]] > 0.0 || board[[TRAIL, r, c]] > 0.0;

        for i in 0..SIZE {
            for &(r, c) in &[(0, i), (SIZE - 1, i), (i, 0), (i, SIZE - 1)] {
                if !outside[r][c] && !blocked(&self.board, r, c) {
                    outside[r][c] = true;
                    queue.push_back((r, c));
                }
            }
        }
        while let Some((r, c)) = queue.pop_front() {
            for (dr, dc) in MOVES {
                let (nr, nc) = (r as isize + dr, c as isize + dc);
                if nr < 0 || nc < 0 || nr >= SIZE as isize || nc >= SIZE as isize {
                    continue;
                }
                let (nr, nc) = (nr as usize, nc as usize);
                if !outside[nr][nc] && !blocked(&self.board, nr, nc) {
                    outside[nr][nc] = true;
                    queue.push_back((nr, nc));
                }
            }
        }

        for r in 0..SIZE {
            for c in 0..SIZE {
                if !outside[r][c] {
                    self.board[[TERRITORY, r, c]] = 1.0;
                    self.board[[TRAIL, r, c]] = 0.0;
                }
            }
        }
        self.owned() - before
    }

    fn step_result(&self, reward: f32, done: bool) -> Step {
        Step {
            observation: self.board.clone(),
            reward,
            done,
            info: StepInfo { score: self.owned() as f64 },
        }
    }
}

impl Environment for TerritoryGame {
    fn reset(&mut self) -> territory_dqn::Result<Array3<f32>> {
        self.board.fill(0.0);
        self.row = self.rng.gen_range(2..SIZE - 2);
        self.col = self.rng.gen_range(2..SIZE - 2);
        for r in self.row - 1..=self.row + 1 {
            for c in self.col - 1..=self.col + 1 {
                self.board[[TERRITORY, r, c]] = 1.0;
            }
        }
        self.board[[HEAD, self.row, self.col]] = 1.0;
        Ok(self.board.clone())
    }

    fn step(&mut self, action: usize) -> territory_dqn::Result<Step> {
        let (dr, dc) = *MOVES
            .get(action)
            .ok_or_else(|| DqnError::Environment(format!("unknown move {}", action)))?;
        let (r, c) = (self.row as isize + dr, self.col as isize + dc);
        if r < 0 || c < 0 || r >= SIZE as isize || c >= SIZE as isize {
            return Ok(self.step_result(-10.0, true));
        }
        let (r, c) = (r as usize, c as usize);
        if self.board[[TRAIL, r, c]] > 0.0 {
            return Ok(self.step_result(-10.0, true));
        }

        self.board[[HEAD, self.row, self.col]] = 0.0;
        if self.board[[TERRITORY, self.row, self.col]] == 0.0 {
            self.board[[TRAIL, self.row, self.col]] = 1.0;
        }
        self.row = r;
        self.col = c;
        self.board[[HEAD, r, c]] = 1.0;

        let reward = if self.board[[TERRITORY, r, c]] > 0.0 {
            self.claim() as f32
        } else {
            0.0
        };
        Ok(self.step_result(reward, false))
    }

    fn action_space(&self) -> Discrete {
        Discrete::new(MOVES.len())
    }

    fn observation_shape(&self) -> ObservationShape {
        ObservationShape::new(3, SIZE, SIZE)
    }
}

fn main() -> territory_dqn::Result<()> {
    let log_file = OpenOptions::new().create(true).append(true).open("training_steps.log")?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .format(|buf, record| writeln!(buf, "{} {}", buf.timestamp(), record.args()))
        .init();
    log::info!("Launching Training");

    let config = if Path::new("training.json").exists() {
        TrainingConfig::from_json_file("training.json")?
    } else {
        let mut config = TrainingConfig::default();
        config.trainer.trials = 200;
        config
    };

    let mut trainer = Trainer::from_config(TerritoryGame::new(0), &config)?;
    let summary = trainer.run()?;
    println!(
        "Finished {} episodes ({} steps), average score over the last 100: {:.1}",
        summary.episodes,
        summary.total_steps,
        trainer.metrics().avg_score(100).unwrap_or(0.0)
    );
    trainer.metrics().save("training_metrics.json")
}
