//! Per-episode reporting for metrics collaborators.

/// Everything a metrics collaborator learns about a completed episode.
#[derive(Debug, Clone)]
pub struct EpisodeReport {
    /// 1-based episode index within the current run.
    pub episode: usize,
    /// Total (undiscounted) reward collected in the episode.
    pub reward: f32,
    /// Steps taken before termination or the step cap.
    pub steps: usize,
    /// Rolling average over the most recent window of episodes.
    pub average_reward: f32,
    /// Loss realized by the policy update, when one happened.
    pub loss: Option<f32>,
}

/// Consumer of per-episode reports. Purely observational.
pub trait MetricsSink {
    fn on_episode(&mut self, report: &EpisodeReport);
}

/// Sink that discards every report.
#[derive(Default)]
pub struct NullSink;

impl MetricsSink for NullSink {
    fn on_episode(&mut self, _report: &EpisodeReport) {}
}

/// Full reward history with a rolling average over the most recent `window`
/// entries. The full history is retained so a plotting collaborator can read
/// it back.
pub struct RewardWindow {
    window: usize,
    history: Vec<f32>,
}

impl RewardWindow {
    #[must_use]
    pub fn new(window: usize) -> Self {
        assert!(window > 0);
        Self { window, history: Vec::new() }
    }

    pub fn push(&mut self, reward: f32) {
        self.history.push(reward);
    }

    /// Mean of the most recent `window` rewards, 0 when empty.
    #[must_use]
    pub fn average(&self) -> f32 {
        let tail_start = self.history.len().saturating_sub(self.window);
        let tail = &self.history[tail_start..];
        if tail.is_empty() {
            0.0
        } else {
            tail.iter().sum::<f32>() / tail.len() as f32
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    #[must_use]
    pub fn history(&self) -> &[f32] {
        &self.history
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}
