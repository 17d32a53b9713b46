pub mod config;
pub mod episode;
pub mod metrics;
pub mod trainer;

pub use config::TrainConfig;
pub use episode::{discounted_returns, Episode, EpisodeBuffer};
pub use metrics::{EpisodeReport, MetricsSink, NullSink, RewardWindow};
pub use trainer::{ControlError, NullObserver, StepObserver, StopSignal, Trainer, TrainerState};
