#![deny(clippy::all, clippy::pedantic)]

mod observe;

use anyhow::Result;

use gridworld::{GridConfig, GridWorld};
use policy::store::ModelStore;
use policy::PolicyNetwork;
use trainer::{StopSignal, TrainConfig, Trainer};

use observe::{GridPrinter, LogSink};

const MODEL_KEY: &str = "gridworld-agent-v2";
const MODEL_ROOT: &str = "models";
const DEMO_EPISODES: usize = 3;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let grid_config = GridConfig::default();
    let train_config = TrainConfig::default();
    let state_size = grid_config.width * grid_config.height;
    tracing::info!(
        width = grid_config.width,
        height = grid_config.height,
        episodes = train_config.max_episodes,
        "initializing grid world training"
    );

    let env = GridWorld::new(grid_config)?;
    let learning_rate = train_config.learning_rate;
    let mut trainer =
        Trainer::new(env, train_config, move |s, a| PolicyNetwork::new(s, a, learning_rate));

    // Resume from a previous run when a compatible snapshot exists; a failed
    // load never disturbs the fresh trainer.
    let store = ModelStore::new(MODEL_ROOT);
    match store.load(MODEL_KEY, state_size, gridworld::Action::COUNT, learning_rate) {
        Ok(saved) => {
            trainer.install_policy(saved)?;
            tracing::info!(key = MODEL_KEY, "resuming from saved policy");
        }
        Err(e) => tracing::warn!(error = %e, "no usable saved policy, training from scratch"),
    }

    let stop = StopSignal::default();
    let mut printer = GridPrinter::default();
    let mut metrics = LogSink::new(100);

    trainer.start()?;
    let outcome = trainer.run(&stop, &mut printer, &mut metrics);
    tracing::info!(?outcome, episodes = trainer.episode(), "training finished");

    let demo_rewards = trainer.demonstrate(DEMO_EPISODES, &mut printer)?;
    tracing::info!(rewards = ?demo_rewards, "demonstration finished");

    if let Some(policy) = trainer.policy() {
        store.save(policy, MODEL_KEY)?;
        tracing::info!(key = MODEL_KEY, root = ?store.root(), "policy saved");
    }

    Ok(())
}
