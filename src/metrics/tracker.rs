use std::collections::VecDeque;
use std::path::Path;
use serde::{Serialize, Deserialize};

/// Summary of one finished episode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpisodeReport {
    pub trial: usize,
    /// Score reported by the environment at the last step
    pub score: f64,
    pub steps: usize,
    pub seconds_per_step: f64,
    /// Wall time spent in replay and the soft update
    pub training_secs: f64,
    /// Mean replay loss, absent when the replay was skipped
    pub loss: Option<f32>,
    pub epsilon: f32,
}

impl EpisodeReport {
    pub fn trained(&self) -> bool {
        self.loss.is_some()
    }
}

/// Bounded histories of training metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub episode_scores: VecDeque<f64>,
    pub episode_lengths: VecDeque<usize>,
    /// Mean replay loss per trained episode
    pub losses: VecDeque<f32>,
    /// Exploration rate at the end of each episode
    pub epsilons: VecDeque<f32>,
}

impl TrainingMetrics {
    pub fn new(history_size: usize) -> Self {
        TrainingMetrics {
            episode_scores: VecDeque::with_capacity(history_size),
            episode_lengths: VecDeque::with_capacity(history_size),
            losses: VecDeque::with_capacity(history_size),
            epsilons: VecDeque::with_capacity(history_size),
        }
    }
}

fn push_bounded<T>(history: &mut VecDeque<T>, value: T, limit: usize) {
    if history.len() >= limit {
        history.pop_front();
    }
    history.push_back(value);
}

fn recent_mean<I: DoubleEndedIterator<Item = f64>>(values: I, len: usize, window: usize) -> Option<f64> {
    let n = window.min(len);
    if n == 0 {
        return None;
    }
    let sum: f64 = values.rev().take(n).sum();
    Some(sum / n as f64)
}

/// Tracks metrics during training
#[derive(Debug, Clone)]
pub struct MetricsTracker {
    metrics: TrainingMetrics,
    reports: VecDeque<EpisodeReport>,
    history_size: usize,
    episode_count: usize,
    total_steps: usize,
}

impl MetricsTracker {
    pub fn new(history_size: usize) -> Self {
        let history_size = history_size.max(1);
        MetricsTracker {
            metrics: TrainingMetrics::new(history_size),
            reports: VecDeque::with_capacity(history_size),
            history_size,
            episode_count: 0,
            total_steps: 0,
        }
    }

    /// Record a finished episode
    pub fn record_episode(&mut self, report: EpisodeReport) {
        let limit = self.history_size;
        push_bounded(&mut self.metrics.episode_scores, report.score, limit);
        push_bounded(&mut self.metrics.episode_lengths, report.steps, limit);
        push_bounded(&mut self.metrics.epsilons, report.epsilon, limit);
        if let Some(loss) = report.loss {
            push_bounded(&mut self.metrics.losses, loss, limit);
        }
        push_bounded(&mut self.reports, report, limit);

        self.episode_count += 1;
        self.total_steps += report.steps;
    }

    pub fn metrics(&self) -> &TrainingMetrics {
        &self.metrics
    }

    /// Most recent reports, oldest first
    pub fn reports(&self) -> impl Iterator<Item = &EpisodeReport> {
        self.reports.iter()
    }

    pub fn episode_count(&self) -> usize {
        self.episode_count
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// Mean score over the last `window` episodes
    pub fn avg_score(&self, window: usize) -> Option<f64> {
        let scores = &self.metrics.episode_scores;
        recent_mean(scores.iter().copied(), scores.len(), window)
    }

    /// Mean replay loss over the last `window` trained episodes
    pub fn avg_loss(&self, window: usize) -> Option<f32> {
        let losses = &self.metrics.losses;
        recent_mean(losses.iter().map(|&l| l as f64), losses.len(), window).map(|m| m as f32)
    }

    pub fn clear(&mut self) {
        self.metrics = TrainingMetrics::new(self.history_size);
        self.reports.clear();
        self.episode_count = 0;
        self.total_steps = 0;
    }

    /// Save the metric histories as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> crate::error::Result<()> {
        let serialized = serde_json::to_string_pretty(&self.metrics)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> crate::error::Result<()> {
        let data = std::fs::read_to_string(path)?;
        self.metrics = serde_json::from_str(&data)?;
        Ok(())
    }
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(trial: usize, score: f64, loss: Option<f32>) -> EpisodeReport {
        EpisodeReport {
            trial,
            score,
            steps: 10,
            seconds_per_step: 0.0,
            training_secs: 0.0,
            loss,
            epsilon: 0.5,
        }
    }

    #[test]
    fn test_history_is_bounded() {
        let mut tracker = MetricsTracker::new(3);
        for trial in 0..5 {
            tracker.record_episode(report(trial, trial as f64, Some(1.0)));
        }
        assert_eq!(tracker.episode_count(), 5);
        assert_eq!(tracker.total_steps(), 50);
        assert_eq!(tracker.metrics().episode_scores.len(), 3);
        let trials: Vec<usize> = tracker.reports().map(|r| r.trial).collect();
        assert_eq!(trials, vec![2, 3, 4]);
    }

    #[test]
    fn test_averages() {
        let mut tracker = MetricsTracker::new(10);
        assert_eq!(tracker.avg_score(5), None);
        tracker.record_episode(report(0, 1.0, None));
        tracker.record_episode(report(1, 3.0, Some(2.0)));
        tracker.record_episode(report(2, 5.0, Some(4.0)));
        assert_eq!(tracker.avg_score(2), Some(4.0));
        assert_eq!(tracker.avg_score(100), Some(3.0));
        assert_eq!(tracker.avg_loss(10), Some(3.0));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        let mut tracker = MetricsTracker::new(10);
        tracker.record_episode(report(0, 2.5, Some(0.5)));
        tracker.save(&path).unwrap();

        let mut restored = MetricsTracker::default();
        restored.load(&path).unwrap();
        assert_eq!(restored.metrics().episode_scores, vec![2.5]);
        assert_eq!(restored.metrics().losses, vec![0.5]);
    }
}
