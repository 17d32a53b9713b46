use std::collections::HashSet;

use thiserror::Error;

use crate::env::Env;

#[derive(Error, Debug)]
pub enum GridError {
    #[error("grid {width}x{height} is too small for distinct start and goal cells")]
    TooSmall { width: usize, height: usize },
    #[error("wall at ({x}, {y}) conflicts with the grid bounds, start or goal")]
    WallConflict { x: i32, y: i32 },
}

/// A cell coordinate. `(0, 0)` is the top-left corner; `y` grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    #[must_use]
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// One of the four unit moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Up,
    Down,
    Left,
    Right,
}

impl Action {
    pub const COUNT: usize = 4;
    pub const ALL: [Action; 4] = [Action::Up, Action::Down, Action::Left, Action::Right];

    /// Maps a policy output index to an action. Index order is the one the
    /// policy head is trained against; changing it invalidates saved models.
    #[must_use]
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => Action::Up,
            1 => Action::Down,
            2 => Action::Left,
            3 => Action::Right,
            _ => panic!("action index out of range: {index}"),
        }
    }

    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Action::Up => 0,
            Action::Down => 1,
            Action::Left => 2,
            Action::Right => 3,
        }
    }

    #[must_use]
    pub fn delta(self) -> (i32, i32) {
        match self {
            Action::Up => (0, -1),
            Action::Down => (0, 1),
            Action::Left => (-1, 0),
            Action::Right => (1, 0),
        }
    }
}

/// Construction parameters for a [`GridWorld`].
#[derive(Debug, Clone)]
pub struct GridConfig {
    pub width: usize,
    pub height: usize,
    /// Fraction of cells turned into walls, before the attempt cap.
    pub wall_density: f32,
    /// Reward for a valid non-goal move.
    pub step_penalty: f32,
    /// Reward for a move rejected by a wall or the grid boundary.
    pub invalid_penalty: f32,
    /// Reward on reaching the goal; overrides the move reward.
    pub goal_reward: f32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 7,
            height: 7,
            wall_density: 0.1,
            step_penalty: -0.05,
            invalid_penalty: -0.75,
            goal_reward: 10.0,
        }
    }
}

/// Outcome of one environment step.
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: Vec<f32>,
    pub reward: f32,
    pub done: bool,
}

/// Immutable view of the grid for rendering collaborators.
#[derive(Debug, Clone)]
pub struct GridSnapshot {
    pub width: usize,
    pub height: usize,
    pub start: Position,
    pub goal: Position,
    pub walls: Vec<Position>,
    pub agent: Position,
}

/// Deterministic grid world with a randomized wall layout.
///
/// The agent starts in the top-left corner and must reach the bottom-right
/// corner. Invalid moves are rejected rather than clamped: the agent keeps
/// its position and collects the invalid-move penalty. State is a one-hot
/// encoding of the agent's linear cell index.
pub struct GridWorld {
    width: i32,
    height: i32,
    start: Position,
    goal: Position,
    walls: HashSet<Position>,
    agent: Position,
    steps: u32,
    step_penalty: f32,
    invalid_penalty: f32,
    goal_reward: f32,
}

impl GridWorld {
    /// Builds a grid with randomly placed walls drawn from the global RNG.
    pub fn new(config: GridConfig) -> Result<Self, GridError> {
        let mut world = Self::empty(&config)?;
        world.walls = generate_walls(world.width, world.height, config.wall_density, world.start, world.goal);
        Ok(world)
    }

    /// Builds a grid with an explicit wall layout.
    pub fn with_walls(
        config: GridConfig,
        walls: impl IntoIterator<Item = Position>,
    ) -> Result<Self, GridError> {
        let mut world = Self::empty(&config)?;
        for wall in walls {
            if !world.in_bounds(wall) || wall == world.start || wall == world.goal {
                return Err(GridError::WallConflict { x: wall.x, y: wall.y });
            }
            world.walls.insert(wall);
        }
        Ok(world)
    }

    fn empty(config: &GridConfig) -> Result<Self, GridError> {
        if config.width == 0 || config.height == 0 || config.width * config.height < 2 {
            return Err(GridError::TooSmall { width: config.width, height: config.height });
        }
        let width = config.width as i32;
        let height = config.height as i32;
        let start = Position::new(0, 0);
        let goal = Position::new(width - 1, height - 1);
        Ok(Self {
            width,
            height,
            start,
            goal,
            walls: HashSet::new(),
            agent: start,
            steps: 0,
            step_penalty: config.step_penalty,
            invalid_penalty: config.invalid_penalty,
            goal_reward: config.goal_reward,
        })
    }

    fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.x < self.width && pos.y >= 0 && pos.y < self.height
    }

    /// One-hot state vector for the agent's current cell.
    #[must_use]
    pub fn state(&self) -> Vec<f32> {
        let mut state = vec![0.0; (self.width * self.height) as usize];
        state[(self.agent.y * self.width + self.agent.x) as usize] = 1.0;
        state
    }

    /// Applies one action. The move is rejected (position unchanged) when the
    /// candidate cell is out of bounds or a wall; reaching the goal overrides
    /// the move reward and terminates the episode.
    pub fn apply(&mut self, action: Action) -> Transition {
        let (dx, dy) = action.delta();
        let candidate = Position::new(self.agent.x + dx, self.agent.y + dy);

        let mut reward = self.step_penalty;
        if !self.in_bounds(candidate) || self.walls.contains(&candidate) {
            reward = self.invalid_penalty;
        } else {
            self.agent = candidate;
        }

        let mut done = false;
        if self.agent == self.goal {
            reward = self.goal_reward;
            done = true;
        }

        self.steps += 1;
        Transition { state: self.state(), reward, done }
    }

    #[must_use]
    pub fn steps(&self) -> u32 {
        self.steps
    }

    #[must_use]
    pub fn snapshot(&self) -> GridSnapshot {
        let mut walls: Vec<Position> = self.walls.iter().copied().collect();
        walls.sort_by_key(|p| (p.y, p.x));
        GridSnapshot {
            width: self.width as usize,
            height: self.height as usize,
            start: self.start,
            goal: self.goal,
            walls,
            agent: self.agent,
        }
    }
}

impl Env for GridWorld {
    fn step(&mut self, action: usize) -> (Vec<f32>, f32, bool) {
        let t = self.apply(Action::from_index(action));
        (t.state, t.reward, t.done)
    }

    fn reset(&mut self) -> Vec<f32> {
        self.agent = self.start;
        self.steps = 0;
        self.state()
    }

    fn state_size(&self) -> usize {
        (self.width * self.height) as usize
    }

    fn action_size(&self) -> usize {
        Action::COUNT
    }
}

/// Draws `floor(cells * density)` wall positions uniformly, skipping start,
/// goal and duplicates. The draw is attempt-capped: a layout that cannot be
/// filled within the cap keeps however many walls were placed.
fn generate_walls(
    width: i32,
    height: i32,
    density: f32,
    start: Position,
    goal: Position,
) -> HashSet<Position> {
    let cells = (width * height) as usize;
    let target = ((cells as f32) * density).floor() as usize;
    let target = target.min(cells.saturating_sub(2));

    let mut walls = HashSet::with_capacity(target);
    let max_attempts = cells * 16 + 64;
    let mut attempts = 0;
    while walls.len() < target && attempts < max_attempts {
        attempts += 1;
        let pos = Position::new(fastrand::i32(0..width), fastrand::i32(0..height));
        if pos == start || pos == goal {
            continue;
        }
        walls.insert(pos);
    }
    if walls.len() < target {
        tracing::warn!(
            placed = walls.len(),
            target,
            "wall placement exhausted its attempt cap, continuing with fewer walls"
        );
    }
    walls
}
