use ndarray::Array3;
use rand::Rng;
use std::collections::VecDeque;

use crate::error::{DqnError, Result};

/// One recorded interaction with the environment.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub state: Array3<f32>,
    pub action: usize,
    pub reward: f32,
    pub next_state: Array3<f32>,
    pub done: bool,
}

/// Fixed-capacity FIFO memory of past transitions.
///
/// Once full, every push evicts the oldest transition. Stored transitions are
/// only ever handed out by shared reference.
#[derive(Clone, Debug)]
pub struct ReplayMemory {
    buffer: VecDeque<Transition>,
    capacity: usize,
}

impl ReplayMemory {
    /// Create a memory holding at most `capacity` transitions; zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        ReplayMemory {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Like [`ReplayMemory::new`], rejecting a zero capacity.
    pub fn try_new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(DqnError::invalid_parameter("capacity", "replay memory capacity must be positive"));
        }
        Ok(Self::new(capacity))
    }

    pub fn push(&mut self, transition: Transition) {
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(transition);
    }

    /// Draw `batch_size` distinct transitions uniformly at random.
    pub fn sample(&self, batch_size: usize) -> Result<Vec<&Transition>> {
        self.sample_with(&mut rand::thread_rng(), batch_size)
    }

    /// Same as [`ReplayMemory::sample`] with a caller-provided random source.
    pub fn sample_with<R: Rng + ?Sized>(&self, rng: &mut R, batch_size: usize) -> Result<Vec<&Transition>> {
        if self.buffer.len() < batch_size {
            return Err(DqnError::InsufficientData {
                requested: batch_size,
                available: self.buffer.len(),
            });
        }
        Ok(rand::seq::index::sample(rng, self.buffer.len(), batch_size)
            .into_iter()
            .map(|i| &self.buffer[i])
            .collect())
    }

    /// Whether a batch of `batch_size` can be sampled.
    pub fn is_ready(&self, batch_size: usize) -> bool {
        self.buffer.len() >= batch_size
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate from the oldest to the newest stored transition.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.buffer.iter()
    }
}
