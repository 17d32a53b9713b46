/// Training-loop parameters. Grid construction has its own config in the
/// `gridworld` crate; this struct only concerns the trainer.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub max_episodes: usize,
    /// Per-episode step cap enforced by the trainer, not the environment.
    pub max_steps: usize,
    pub learning_rate: f32,
    /// Discount factor applied to future rewards.
    pub gamma: f32,
    /// Number of most recent episodes in the rolling reward average.
    pub reward_window: usize,
    /// Rolling average above which the run is reported as performing well.
    pub well_performing_threshold: f32,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            max_episodes: 2000,
            max_steps: 100,
            learning_rate: 0.002,
            gamma: 0.99,
            reward_window: 100,
            // goal reward minus the step cost of wandering for half the cap
            well_performing_threshold: 10.0 - (100.0 / 2.0) * 0.05,
        }
    }
}
