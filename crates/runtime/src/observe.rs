use gridworld::{GridSnapshot, GridWorld, Position};
use trainer::{EpisodeReport, MetricsSink, StepObserver};

/// Metrics sink that narrates training progress through tracing. Logs the
/// first episode and then one line per `every` episodes.
pub struct LogSink {
    every: usize,
}

impl LogSink {
    pub fn new(every: usize) -> Self {
        Self { every: every.max(1) }
    }
}

impl MetricsSink for LogSink {
    fn on_episode(&mut self, report: &EpisodeReport) {
        if report.episode == 1 || report.episode % self.every == 0 {
            tracing::info!(
                episode = report.episode,
                reward = report.reward,
                steps = report.steps,
                average = report.average_reward,
                loss = report.loss,
                "episode finished"
            );
        }
    }
}

/// Draws the grid as ASCII art at debug level after each episode.
#[derive(Default)]
pub struct GridPrinter;

impl StepObserver<GridWorld> for GridPrinter {
    fn on_episode_end(&mut self, env: &GridWorld) {
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!("grid state\n{}", draw(&env.snapshot()));
        }
    }
}

fn draw(snapshot: &GridSnapshot) -> String {
    let mut out = String::new();
    for y in 0..snapshot.height {
        for x in 0..snapshot.width {
            let pos = Position::new(x as i32, y as i32);
            let cell = if pos == snapshot.agent {
                'A'
            } else if pos == snapshot.goal {
                'G'
            } else if pos == snapshot.start {
                'S'
            } else if snapshot.walls.contains(&pos) {
                '#'
            } else {
                '.'
            };
            out.push(cell);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::draw;
    use gridworld::{Env, GridConfig, GridWorld, Position};

    #[test]
    fn draw_marks_every_cell_kind() {
        let config = GridConfig { width: 3, height: 2, ..GridConfig::default() };
        let mut world = GridWorld::with_walls(config, [Position::new(1, 0)]).unwrap();
        world.reset();
        assert_eq!(draw(&world.snapshot()), "A#.\n..G\n");
    }
}
