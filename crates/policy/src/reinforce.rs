use crate::nn::{Dense, Relu, Softmax};
use crate::optim::Adam;
use crate::store::{SavedDense, SavedPolicy};
use crate::Tensor;

/// Guards `ln` against a zero probability in the policy-gradient loss.
const PROB_EPS: f32 = 1e-8;

const HIDDEN_ONE: usize = 64;
const HIDDEN_TWO: usize = 32;

/// Capability contract for a trainable stochastic action policy.
///
/// The trainer only depends on this trait: any implementation that produces a
/// probability distribution per state and learns from `(state, action,
/// return)` batches is interchangeable with [`PolicyNetwork`].
pub trait Policy {
    /// Length of the state vector this policy was built for.
    fn state_size(&self) -> usize;

    /// Number of discrete actions in the output distribution.
    fn action_size(&self) -> usize;

    /// Probability distribution over actions for the given state. Entries
    /// are non-negative and sum to 1.
    fn predict(&self, state: &[f32]) -> Vec<f32>;

    /// Draws one action index proportionally to `probs`. Stochastic:
    /// exploration depends on this being a draw, not an argmax.
    fn sample_action(&self, probs: &[f32]) -> usize {
        categorical(probs)
    }

    /// One policy-gradient step over a completed episode. An empty batch is
    /// a no-op returning `None`; otherwise returns the realized loss.
    fn update(&mut self, states: &[Vec<f32>], actions: &[usize], returns: &[f32]) -> Option<f32>;
}

/// Categorical draw from the global RNG over a probability vector.
#[must_use]
pub fn categorical(probs: &[f32]) -> usize {
    assert!(!probs.is_empty());
    let draw = fastrand::f32();
    let mut cumulative = 0.0;
    for (i, &p) in probs.iter().enumerate() {
        cumulative += p;
        if draw < cumulative {
            return i;
        }
    }
    probs.len() - 1
}

/// The dense stack, with per-step activation caches for the backward pass.
#[derive(Debug)]
struct Net {
    l1: Dense,
    l2: Dense,
    head: Dense,
}

struct Forward {
    z1: Tensor,
    a1: Tensor,
    z2: Tensor,
    a2: Tensor,
    z3: Tensor,
    probs: Tensor,
}

impl Net {
    fn forward(&self, x: &Tensor) -> Forward {
        let relu = Relu;
        let softmax = Softmax;
        let z1 = self.l1.forward(x);
        let a1 = relu.forward(&z1);
        let z2 = self.l2.forward(&a1);
        let a2 = relu.forward(&z2);
        let z3 = self.head.forward(&a2);
        let probs = softmax.forward(&z3);
        Forward { z1, a1, z2, a2, z3, probs }
    }

    /// Gradients in the same order as [`Net::params_mut`].
    fn backward(&self, x: &Tensor, fwd: &Forward, dprobs: &Tensor) -> Vec<Tensor> {
        let relu = Relu;
        let softmax = Softmax;
        let g3 = softmax.backward(&fwd.z3, dprobs);
        let (da2, dw3, db3) = self.head.backward(&fwd.a2, &g3);
        let g2 = relu.backward(&fwd.z2, &da2);
        let (da1, dw2, db2) = self.l2.backward(&fwd.a1, &g2);
        let g1 = relu.backward(&fwd.z1, &da1);
        let (_, dw1, db1) = self.l1.backward(x, &g1);
        vec![dw1, db1, dw2, db2, dw3, db3]
    }

    fn params_mut(&mut self) -> Vec<&mut Tensor> {
        vec![
            &mut self.l1.w,
            &mut self.l1.b,
            &mut self.l2.w,
            &mut self.l2.b,
            &mut self.head.w,
            &mut self.head.b,
        ]
    }
}

/// REINFORCE policy: two hidden ReLU layers and a softmax head, trained with
/// one Adam step per completed episode on the Monte-Carlo policy-gradient
/// loss `-Σ_t ln(π(a_t|s_t)) · G_t`.
#[derive(Debug)]
pub struct PolicyNetwork {
    net: Net,
    optimizer: Adam,
    state_size: usize,
    action_size: usize,
}

impl PolicyNetwork {
    /// Fresh Glorot-initialized network drawing from the global RNG.
    #[must_use]
    pub fn new(state_size: usize, action_size: usize, learning_rate: f32) -> Self {
        Self {
            net: Net {
                l1: Dense::xavier(state_size, HIDDEN_ONE),
                l2: Dense::xavier(HIDDEN_ONE, HIDDEN_TWO),
                head: Dense::xavier(HIDDEN_TWO, action_size),
            },
            optimizer: Adam::new(learning_rate),
            state_size,
            action_size,
        }
    }

    /// Serializable weight snapshot. Optimizer state is not captured; a
    /// reloaded network starts with fresh Adam moments.
    #[must_use]
    pub fn to_saved(&self) -> SavedPolicy {
        let layers = [&self.net.l1, &self.net.l2, &self.net.head]
            .iter()
            .map(|d| SavedDense {
                weights: d.w.data.clone(),
                bias: d.b.data.clone(),
                in_dim: d.in_dim,
                out_dim: d.out_dim,
            })
            .collect();
        SavedPolicy { state_size: self.state_size, action_size: self.action_size, layers }
    }

    /// Rebuilds a network from a snapshot, validating the layer chain.
    /// Returns `None` when the snapshot is internally inconsistent.
    #[must_use]
    pub fn from_saved(saved: SavedPolicy, learning_rate: f32) -> Option<Self> {
        let SavedPolicy { state_size, action_size, layers } = saved;
        let [d1, d2, d3]: [SavedDense; 3] = layers.try_into().ok()?;
        let chained = d1.in_dim == state_size
            && d1.out_dim == d2.in_dim
            && d2.out_dim == d3.in_dim
            && d3.out_dim == action_size;
        let sized = [&d1, &d2, &d3]
            .iter()
            .all(|d| d.weights.len() == d.in_dim * d.out_dim && d.bias.len() == d.out_dim);
        if !chained || !sized {
            return None;
        }
        Some(Self {
            net: Net {
                l1: Dense::new(d1.weights, d1.bias, d1.in_dim, d1.out_dim),
                l2: Dense::new(d2.weights, d2.bias, d2.in_dim, d2.out_dim),
                head: Dense::new(d3.weights, d3.bias, d3.in_dim, d3.out_dim),
            },
            optimizer: Adam::new(learning_rate),
            state_size,
            action_size,
        })
    }
}

impl Policy for PolicyNetwork {
    fn state_size(&self) -> usize {
        self.state_size
    }

    fn action_size(&self) -> usize {
        self.action_size
    }

    fn predict(&self, state: &[f32]) -> Vec<f32> {
        assert_eq!(state.len(), self.state_size);
        let x = Tensor::from_vec(vec![self.state_size], state.to_vec());
        self.net.forward(&x).probs.data
    }

    fn update(&mut self, states: &[Vec<f32>], actions: &[usize], returns: &[f32]) -> Option<f32> {
        if states.is_empty() {
            return None;
        }
        assert_eq!(states.len(), actions.len());
        assert_eq!(actions.len(), returns.len());

        let mut total_loss = 0.0;
        let mut acc: Vec<Tensor> = Vec::new();
        for ((state, &action), &ret) in states.iter().zip(actions).zip(returns) {
            assert_eq!(state.len(), self.state_size);
            let x = Tensor::from_vec(vec![self.state_size], state.clone());
            let fwd = self.net.forward(&x);
            let taken = fwd.probs.data[action];
            total_loss += -(taken + PROB_EPS).ln() * ret;

            // d(-ln(p_a + eps) * G)/dp is nonzero only at the taken action.
            let mut dprobs = vec![0.0; self.action_size];
            dprobs[action] = -ret / (taken + PROB_EPS);
            let dprobs = Tensor::from_vec(vec![self.action_size], dprobs);

            let grads = self.net.backward(&x, &fwd, &dprobs);
            if acc.is_empty() {
                acc = grads;
            } else {
                for (a, g) in acc.iter_mut().zip(&grads) {
                    for (av, &gv) in a.data.iter_mut().zip(&g.data) {
                        *av += gv;
                    }
                }
            }
        }

        let mut pairs: Vec<(&mut Tensor, &Tensor)> =
            self.net.params_mut().into_iter().zip(acc.iter()).collect();
        self.optimizer.step(&mut pairs);
        Some(total_loss)
    }
}
