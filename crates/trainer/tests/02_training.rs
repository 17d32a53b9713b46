use std::cell::Cell;
use std::rc::Rc;

use gridworld::{GridConfig, GridWorld};
use policy::{Policy, PolicyNetwork};
use trainer::{
    ControlError, EpisodeReport, MetricsSink, NullObserver, NullSink, StepObserver, StopSignal,
    TrainConfig, Trainer, TrainerState,
};

/// Fixed-distribution policy for exercising the trainer without learning.
struct ScriptedPolicy {
    state_size: usize,
    probs: Vec<f32>,
    updates: Rc<Cell<usize>>,
}

impl ScriptedPolicy {
    fn always_right(state_size: usize) -> (Self, Rc<Cell<usize>>) {
        let updates = Rc::new(Cell::new(0));
        let policy =
            Self { state_size, probs: vec![0.0, 0.0, 0.0, 1.0], updates: updates.clone() };
        (policy, updates)
    }
}

impl Policy for ScriptedPolicy {
    fn state_size(&self) -> usize {
        self.state_size
    }

    fn action_size(&self) -> usize {
        self.probs.len()
    }

    fn predict(&self, _state: &[f32]) -> Vec<f32> {
        self.probs.clone()
    }

    fn update(&mut self, states: &[Vec<f32>], _actions: &[usize], _returns: &[f32]) -> Option<f32> {
        if states.is_empty() {
            return None;
        }
        self.updates.set(self.updates.get() + 1);
        Some(0.0)
    }
}

#[derive(Default)]
struct CaptureSink {
    reports: Vec<EpisodeReport>,
}

impl MetricsSink for CaptureSink {
    fn on_episode(&mut self, report: &EpisodeReport) {
        self.reports.push(report.clone());
    }
}

struct StopOnFirstStep(StopSignal);

impl StepObserver<GridWorld> for StopOnFirstStep {
    fn on_step(&mut self, _env: &GridWorld, _step: usize) {
        self.0.stop();
    }
}

fn corridor() -> GridWorld {
    let config = GridConfig { width: 3, height: 1, wall_density: 0.0, ..GridConfig::default() };
    GridWorld::new(config).unwrap()
}

fn open_square(side: usize) -> GridWorld {
    let config =
        GridConfig { width: side, height: side, wall_density: 0.0, ..GridConfig::default() };
    GridWorld::new(config).unwrap()
}

#[test]
fn corridor_reaches_goal_in_two_steps() {
    let (policy, _updates) = ScriptedPolicy::always_right(3);
    let mut scripted = Some(policy);
    let config = TrainConfig { max_episodes: 1, ..TrainConfig::default() };
    let mut trainer = Trainer::new(corridor(), config, move |_s, _a| scripted.take().unwrap());

    let mut sink = CaptureSink::default();
    trainer.start().unwrap();
    let state = trainer.run(&StopSignal::default(), &mut NullObserver, &mut sink);

    assert_eq!(state, TrainerState::Completed);
    let report = &sink.reports[0];
    assert_eq!(report.episode, 1);
    assert_eq!(report.steps, 2);
    assert!((report.reward - 9.95).abs() < 1e-5, "reward {}", report.reward);
    assert_eq!(report.loss, Some(0.0));
}

#[test]
fn trainer_completes_at_max_episodes() {
    fastrand::seed(31);
    let config = TrainConfig { max_episodes: 3, max_steps: 20, ..TrainConfig::default() };
    let mut trainer =
        Trainer::new(open_square(2), config, |s, a| PolicyNetwork::new(s, a, 0.01));

    let mut sink = CaptureSink::default();
    trainer.start().unwrap();
    let state = trainer.run(&StopSignal::default(), &mut NullObserver, &mut sink);

    assert_eq!(state, TrainerState::Completed);
    assert_eq!(sink.reports.len(), 3);
    assert_eq!(sink.reports.iter().map(|r| r.episode).collect::<Vec<_>>(), vec![1, 2, 3]);

    let mean: f32 = sink.reports.iter().map(|r| r.reward).sum::<f32>() / 3.0;
    let last = sink.reports.last().unwrap();
    assert!((last.average_reward - mean).abs() < 1e-5);
    assert_eq!(trainer.reward_history().len(), 3);
}

#[test]
fn stop_signal_halts_at_the_episode_boundary() {
    let (policy, _updates) = ScriptedPolicy::always_right(3);
    let mut scripted = Some(policy);
    let config = TrainConfig { max_episodes: 100, ..TrainConfig::default() };
    let mut trainer = Trainer::new(corridor(), config, move |_s, _a| scripted.take().unwrap());

    let stop = StopSignal::default();
    let mut observer = StopOnFirstStep(stop.clone());
    let mut sink = CaptureSink::default();
    trainer.start().unwrap();
    let state = trainer.run(&stop, &mut observer, &mut sink);

    // The in-flight episode finishes; no new episode begins.
    assert_eq!(state, TrainerState::Stopped);
    assert_eq!(sink.reports.len(), 1);
}

#[test]
fn start_is_idempotent_while_running() {
    let (policy, _updates) = ScriptedPolicy::always_right(3);
    let mut scripted = Some(policy);
    let mut trainer =
        Trainer::new(corridor(), TrainConfig::default(), move |_s, _a| scripted.take().unwrap());

    trainer.start().unwrap();
    assert_eq!(trainer.state(), TrainerState::Running);
    trainer.start().unwrap();
    assert_eq!(trainer.state(), TrainerState::Running);
}

#[test]
fn demonstrate_is_rejected_while_training_is_active() {
    let (policy, _updates) = ScriptedPolicy::always_right(3);
    let mut scripted = Some(policy);
    let mut trainer =
        Trainer::new(corridor(), TrainConfig::default(), move |_s, _a| scripted.take().unwrap());

    trainer.start().unwrap();
    let err = trainer.demonstrate(1, &mut NullObserver).unwrap_err();
    assert!(matches!(err, ControlError::TrainingInProgress), "got {err}");
}

#[test]
fn demonstrate_without_a_policy_is_rejected() {
    let (policy, _updates) = ScriptedPolicy::always_right(3);
    let mut scripted = Some(policy);
    let mut trainer =
        Trainer::new(corridor(), TrainConfig::default(), move |_s, _a| scripted.take().unwrap());

    let err = trainer.demonstrate(1, &mut NullObserver).unwrap_err();
    assert!(matches!(err, ControlError::NoPolicy), "got {err}");
}

#[test]
fn demonstration_records_nothing_and_updates_nothing() {
    let (policy, updates) = ScriptedPolicy::always_right(3);
    let mut scripted = Some(policy);
    let config = TrainConfig { max_episodes: 1, ..TrainConfig::default() };
    let mut trainer = Trainer::new(corridor(), config, move |_s, _a| scripted.take().unwrap());

    trainer.start().unwrap();
    trainer.run(&StopSignal::default(), &mut NullObserver, &mut NullSink);
    assert_eq!(updates.get(), 1);

    let rewards = trainer.demonstrate(2, &mut NullObserver).unwrap();
    assert_eq!(rewards.len(), 2);
    for reward in &rewards {
        assert!((reward - 9.95).abs() < 1e-5);
    }
    assert_eq!(updates.get(), 1, "demonstration must not trigger updates");
    assert_eq!(trainer.reward_history().len(), 1, "demonstration must not extend the history");
    assert_eq!(trainer.state(), TrainerState::Completed);
}

#[test]
fn install_policy_validates_dimensions_and_resets_progress() {
    fastrand::seed(33);
    let config = TrainConfig { max_episodes: 2, max_steps: 10, ..TrainConfig::default() };
    let mut trainer =
        Trainer::new(open_square(2), config, |s, a| PolicyNetwork::new(s, a, 0.01));
    trainer.start().unwrap();
    trainer.run(&StopSignal::default(), &mut NullObserver, &mut NullSink);
    assert_eq!(trainer.episode(), 2);

    let wrong = PolicyNetwork::new(9, 4, 0.01);
    let err = trainer.install_policy(wrong).unwrap_err();
    assert!(matches!(err, ControlError::IncompatiblePolicy { policy_in: 9, env_in: 4, .. }));
    assert_eq!(trainer.episode(), 2, "a rejected install must leave the trainer untouched");

    let right = PolicyNetwork::new(4, 4, 0.01);
    trainer.install_policy(right).unwrap();
    assert_eq!(trainer.episode(), 0);
    assert!(trainer.reward_history().is_empty());
    assert_eq!(trainer.state(), TrainerState::Idle);
}

#[test]
fn policy_is_recreated_on_dimension_mismatch() {
    fastrand::seed(34);
    let created = Rc::new(Cell::new(0));
    let counter = created.clone();
    let config = TrainConfig { max_episodes: 1, max_steps: 5, ..TrainConfig::default() };
    let mut trainer = Trainer::new(open_square(2), config, move |s, a| {
        counter.set(counter.get() + 1);
        PolicyNetwork::new(s, a, 0.01)
    });

    trainer.start().unwrap();
    trainer.run(&StopSignal::default(), &mut NullObserver, &mut NullSink);
    assert_eq!(created.get(), 1);

    // Same dimensionality: the policy is reused.
    trainer.set_env(open_square(2)).unwrap();
    trainer.start().unwrap();
    trainer.run(&StopSignal::default(), &mut NullObserver, &mut NullSink);
    assert_eq!(created.get(), 1);

    // New dimensionality: the factory runs again.
    trainer.set_env(open_square(3)).unwrap();
    trainer.start().unwrap();
    trainer.run(&StopSignal::default(), &mut NullObserver, &mut NullSink);
    assert_eq!(created.get(), 2);
}

#[test]
#[ignore]
fn reinforce_learns_an_open_grid() {
    fastrand::seed(3);
    let config = TrainConfig {
        max_episodes: 800,
        max_steps: 60,
        learning_rate: 0.01,
        ..TrainConfig::default()
    };
    let mut trainer =
        Trainer::new(open_square(4), config, |s, a| PolicyNetwork::new(s, a, 0.01));

    let mut sink = CaptureSink::default();
    trainer.start().unwrap();
    trainer.run(&StopSignal::default(), &mut NullObserver, &mut sink);

    let best = sink.reports.iter().map(|r| r.reward).fold(f32::MIN, f32::max);
    eprintln!("best episode reward {best}");
    assert!(best > 8.0, "best {best}");

    let early: f32 = sink.reports[..100].iter().map(|r| r.reward).sum::<f32>() / 100.0;
    let late: f32 =
        sink.reports[700..].iter().map(|r| r.reward).sum::<f32>() / 100.0;
    eprintln!("early avg {early} late avg {late}");
    assert!(late > early, "policy should improve: early {early} late {late}");
}
