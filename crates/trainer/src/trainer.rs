//! Episode-driven REINFORCE training loop.
//!
//! The trainer exclusively owns the environment, the episode buffer and the
//! policy; everything runs on one logical thread. External collaborators
//! plug in at three seams: a [`StopSignal`] checked at episode boundaries, a
//! [`StepObserver`] invoked between steps (the cooperative yield point for
//! rendering and cancellation), and a [`MetricsSink`] fed once per episode.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use gridworld::Env;
use policy::Policy;

use crate::config::TrainConfig;
use crate::episode::EpisodeBuffer;
use crate::metrics::{EpisodeReport, MetricsSink, RewardWindow};

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("training is in progress")]
    TrainingInProgress,
    #[error("a demonstration is in progress")]
    DemonstrationInProgress,
    #[error("no trained policy is available")]
    NoPolicy,
    #[error("policy is {policy_in}x{policy_out} but the environment needs {env_in}x{env_out}")]
    IncompatiblePolicy { policy_in: usize, policy_out: usize, env_in: usize, env_out: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerState {
    Idle,
    Running,
    Stopped,
    Completed,
    Demonstrating,
}

/// Shared stop request. Advisory: the trainer honors it at the next episode
/// boundary, never mid-step.
#[derive(Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Observer invoked between environment steps and at episode end. This is
/// the yield point where a renderer may inspect the environment; the default
/// methods make a pure-training caller free of boilerplate.
pub trait StepObserver<E> {
    fn on_step(&mut self, _env: &E, _step: usize) {}
    fn on_episode_end(&mut self, _env: &E) {}
}

/// Observer that ignores everything.
#[derive(Default)]
pub struct NullObserver;

impl<E> StepObserver<E> for NullObserver {}

/// REINFORCE trainer state machine.
///
/// Generic over the environment and the policy capability; the policy is
/// produced by a factory closure so the trainer can recreate it when the
/// environment's dimensionality changes between runs.
pub struct Trainer<E: Env, P: Policy> {
    env: E,
    config: TrainConfig,
    make_policy: Box<dyn FnMut(usize, usize) -> P>,
    policy: Option<P>,
    buffer: EpisodeBuffer,
    window: RewardWindow,
    episode: usize,
    state: TrainerState,
    well_logged: bool,
}

impl<E: Env, P: Policy> Trainer<E, P> {
    pub fn new(
        env: E,
        config: TrainConfig,
        make_policy: impl FnMut(usize, usize) -> P + 'static,
    ) -> Self {
        let window = RewardWindow::new(config.reward_window);
        Self {
            env,
            config,
            make_policy: Box::new(make_policy),
            policy: None,
            buffer: EpisodeBuffer::new(),
            window,
            episode: 0,
            state: TrainerState::Idle,
            well_logged: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> TrainerState {
        self.state
    }

    /// Episodes completed in the current run.
    #[must_use]
    pub fn episode(&self) -> usize {
        self.episode
    }

    /// Full per-episode reward history of the current run.
    #[must_use]
    pub fn reward_history(&self) -> &[f32] {
        self.window.history()
    }

    #[must_use]
    pub fn policy(&self) -> Option<&P> {
        self.policy.as_ref()
    }

    /// Whether the rolling average has crossed the configured threshold.
    /// Informational only; never gates a state transition.
    #[must_use]
    pub fn performing_well(&self) -> bool {
        self.window.len() > self.config.reward_window
            && self.window.average() > self.config.well_performing_threshold
    }

    /// Begins a training run: ensures a policy compatible with the current
    /// environment (recreating it on dimensionality mismatch), resets the
    /// episode counter and reward history, and enters `Running`. Idempotent
    /// while already running; rejected during a demonstration.
    pub fn start(&mut self) -> Result<(), ControlError> {
        match self.state {
            TrainerState::Demonstrating => Err(ControlError::DemonstrationInProgress),
            TrainerState::Running => Ok(()),
            _ => {
                let state_size = self.env.state_size();
                let action_size = self.env.action_size();
                let mismatched = self.policy.as_ref().map_or(true, |p| {
                    p.state_size() != state_size || p.action_size() != action_size
                });
                if mismatched {
                    tracing::info!(state_size, action_size, "creating a fresh policy");
                    self.policy = Some((self.make_policy)(state_size, action_size));
                } else {
                    tracing::info!("continuing with the existing policy");
                }
                self.episode = 0;
                self.window.clear();
                self.well_logged = false;
                self.state = TrainerState::Running;
                Ok(())
            }
        }
    }

    /// Runs episodes until the stop signal is raised or the episode cap is
    /// reached. Returns the terminal state (`Stopped` or `Completed`); a
    /// call in any state but `Running` returns the current state untouched.
    pub fn run(
        &mut self,
        stop: &StopSignal,
        observer: &mut dyn StepObserver<E>,
        metrics: &mut dyn MetricsSink,
    ) -> TrainerState {
        if self.state != TrainerState::Running {
            return self.state;
        }
        while self.episode < self.config.max_episodes {
            let Some(policy) = self.policy.as_mut() else {
                self.state = TrainerState::Idle;
                return self.state;
            };

            let (reward, steps) = run_episode(
                &mut self.env,
                policy,
                Some(&mut self.buffer),
                self.config.max_steps,
                observer,
            );
            let loss = match self.buffer.finalize(self.config.gamma) {
                Some(episode) => policy.update(&episode.states, &episode.actions, &episode.returns),
                None => None,
            };

            self.window.push(reward);
            self.episode += 1;
            let report = EpisodeReport {
                episode: self.episode,
                reward,
                steps,
                average_reward: self.window.average(),
                loss,
            };
            metrics.on_episode(&report);

            if !self.well_logged && self.performing_well() {
                self.well_logged = true;
                tracing::info!(
                    episode = self.episode,
                    average = self.window.average(),
                    "policy is consistently performing well"
                );
            }

            if stop.is_stopped() {
                self.state = TrainerState::Stopped;
                tracing::info!(episode = self.episode, "training stopped");
                return self.state;
            }
        }
        self.state = TrainerState::Completed;
        tracing::info!(episodes = self.episode, "training complete");
        self.state
    }

    /// Runs a fixed number of episodes with the trained policy, sampling
    /// actions but recording nothing and updating nothing. Mutually
    /// exclusive with training; the prior state is restored afterwards.
    pub fn demonstrate(
        &mut self,
        episodes: usize,
        observer: &mut dyn StepObserver<E>,
    ) -> Result<Vec<f32>, ControlError> {
        match self.state {
            TrainerState::Running => return Err(ControlError::TrainingInProgress),
            TrainerState::Demonstrating => return Err(ControlError::DemonstrationInProgress),
            _ => {}
        }
        let Some(policy) = self.policy.as_mut() else {
            return Err(ControlError::NoPolicy);
        };

        let previous = self.state;
        self.state = TrainerState::Demonstrating;
        let mut rewards = Vec::with_capacity(episodes);
        for index in 0..episodes {
            let (reward, steps) =
                run_episode(&mut self.env, policy, None, self.config.max_steps, observer);
            tracing::info!(demo = index + 1, reward, steps, "demonstration episode finished");
            rewards.push(reward);
        }
        self.state = previous;
        Ok(rewards)
    }

    /// Installs an externally loaded policy, resetting run progress the way
    /// a fresh load does. Rejected mid-run and for dimensionality mismatch;
    /// on rejection the previous policy is untouched.
    pub fn install_policy(&mut self, policy: P) -> Result<(), ControlError> {
        match self.state {
            TrainerState::Running => return Err(ControlError::TrainingInProgress),
            TrainerState::Demonstrating => return Err(ControlError::DemonstrationInProgress),
            _ => {}
        }
        let env_in = self.env.state_size();
        let env_out = self.env.action_size();
        if policy.state_size() != env_in || policy.action_size() != env_out {
            return Err(ControlError::IncompatiblePolicy {
                policy_in: policy.state_size(),
                policy_out: policy.action_size(),
                env_in,
                env_out,
            });
        }
        self.policy = Some(policy);
        self.episode = 0;
        self.window.clear();
        self.well_logged = false;
        self.state = TrainerState::Idle;
        Ok(())
    }

    /// Swaps the environment. A later [`start`] recreates the policy if the
    /// new environment's dimensionality disagrees with it.
    ///
    /// [`start`]: Trainer::start
    pub fn set_env(&mut self, env: E) -> Result<(), ControlError> {
        match self.state {
            TrainerState::Running => Err(ControlError::TrainingInProgress),
            TrainerState::Demonstrating => Err(ControlError::DemonstrationInProgress),
            _ => {
                self.env = env;
                Ok(())
            }
        }
    }
}

/// One rollout. Records into `buffer` when given one (training) and skips
/// recording otherwise (demonstration). Returns the episode's total reward
/// and step count.
fn run_episode<E: Env, P: Policy>(
    env: &mut E,
    policy: &mut P,
    mut buffer: Option<&mut EpisodeBuffer>,
    max_steps: usize,
    observer: &mut dyn StepObserver<E>,
) -> (f32, usize) {
    let mut state = env.reset();
    let mut total = 0.0;
    let mut steps = 0;
    for step in 0..max_steps {
        let probs = policy.predict(&state);
        let action = policy.sample_action(&probs);
        let (next_state, reward, done) = env.step(action);
        if let Some(buf) = buffer.as_deref_mut() {
            buf.record(state, action, reward);
        }
        state = next_state;
        total += reward;
        steps = step + 1;
        observer.on_step(env, steps);
        if done {
            break;
        }
    }
    observer.on_episode_end(env);
    (total, steps)
}
