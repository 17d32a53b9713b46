//! Single-episode trajectory storage and return estimation.

/// Guards the normalization against a zero-variance return series.
const RETURN_EPS: f32 = 1e-8;

/// One finalized episode: the recorded steps with their normalized
/// discounted returns, ready for a policy update.
pub struct Episode {
    pub states: Vec<Vec<f32>>,
    pub actions: Vec<usize>,
    pub returns: Vec<f32>,
}

/// Accumulates one episode's `(state, action, reward)` triples.
///
/// The buffer lives for exactly one episode: [`finalize`] drains it
/// unconditionally, whether or not the caller follows through with an
/// update.
///
/// [`finalize`]: EpisodeBuffer::finalize
#[derive(Default)]
pub struct EpisodeBuffer {
    states: Vec<Vec<f32>>,
    actions: Vec<usize>,
    rewards: Vec<f32>,
}

impl EpisodeBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, state: Vec<f32>, action: usize, reward: f32) {
        self.states.push(state);
        self.actions.push(action);
        self.rewards.push(reward);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    pub fn clear(&mut self) {
        self.states.clear();
        self.actions.clear();
        self.rewards.clear();
    }

    /// Converts the recorded rewards into normalized discounted returns and
    /// drains the buffer. Returns `None` when nothing was recorded.
    pub fn finalize(&mut self, gamma: f32) -> Option<Episode> {
        if self.is_empty() {
            return None;
        }
        let mut returns = discounted_returns(&self.rewards, gamma);
        normalize(&mut returns);
        let episode = Episode {
            states: std::mem::take(&mut self.states),
            actions: std::mem::take(&mut self.actions),
            returns,
        };
        self.rewards.clear();
        Some(episode)
    }
}

/// Total discounted future reward per step, accumulated strictly backward:
/// `G[T-1] = r[T-1]`, `G[t] = r[t] + gamma * G[t+1]`.
#[must_use]
pub fn discounted_returns(rewards: &[f32], gamma: f32) -> Vec<f32> {
    let mut returns = vec![0.0; rewards.len()];
    let mut running = 0.0;
    for t in (0..rewards.len()).rev() {
        running = rewards[t] + gamma * running;
        returns[t] = running;
    }
    returns
}

/// Shifts and scales the series to zero mean and unit variance, computed
/// from this series alone. The epsilon keeps a zero-variance series (e.g. a
/// single-step episode) finite.
fn normalize(returns: &mut [f32]) {
    let n = returns.len() as f32;
    let mean = returns.iter().sum::<f32>() / n;
    let variance = returns.iter().map(|g| (g - mean).powi(2)).sum::<f32>() / n;
    let std = variance.sqrt();
    for g in returns.iter_mut() {
        *g = (*g - mean) / (std + RETURN_EPS);
    }
}
