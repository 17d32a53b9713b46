use crate::Tensor;

/// A fully connected layer with manually derived gradients.
#[derive(Clone, Debug)]
pub struct Dense {
    /// The weight matrix, row-major `[out_dim, in_dim]`.
    pub w: Tensor,
    /// The bias vector.
    pub b: Tensor,
    pub in_dim: usize,
    pub out_dim: usize,
}

impl Dense {
    /// Creates a new `Dense` layer with the given weights and biases.
    pub fn new(weights: Vec<f32>, bias: Vec<f32>, in_dim: usize, out_dim: usize) -> Self {
        assert_eq!(weights.len(), in_dim * out_dim);
        assert_eq!(bias.len(), out_dim);
        Self {
            w: Tensor::from_vec(vec![out_dim, in_dim], weights),
            b: Tensor::from_vec(vec![out_dim], bias),
            in_dim,
            out_dim,
        }
    }

    /// Glorot-uniform initialization from the global RNG.
    #[must_use]
    pub fn xavier(in_dim: usize, out_dim: usize) -> Self {
        let limit = (6.0 / (in_dim + out_dim) as f32).sqrt();
        let weights = (0..in_dim * out_dim)
            .map(|_| fastrand::f32() * 2.0 * limit - limit)
            .collect();
        let bias = vec![0.0; out_dim];
        Self::new(weights, bias, in_dim, out_dim)
    }

    pub fn forward(&self, x: &Tensor) -> Tensor {
        let mut y = vec![0.0; self.out_dim];
        for o in 0..self.out_dim {
            let mut sum = self.b.data[o];
            for i in 0..self.in_dim {
                sum += self.w.data[o * self.in_dim + i] * x.data[i];
            }
            y[o] = sum;
        }
        Tensor::from_vec(vec![self.out_dim], y)
    }

    /// Returns `(grad_input, grad_w, grad_b)` for the upstream gradient
    /// `grad` at input `x`.
    pub fn backward(&self, x: &Tensor, grad: &Tensor) -> (Tensor, Tensor, Tensor) {
        let mut grad_input = vec![0.0; self.in_dim];
        let mut grad_w = vec![0.0; self.in_dim * self.out_dim];
        let mut grad_b = vec![0.0; self.out_dim];
        for o in 0..self.out_dim {
            let go = grad.data[o];
            for i in 0..self.in_dim {
                grad_w[o * self.in_dim + i] += go * x.data[i];
                grad_input[i] += self.w.data[o * self.in_dim + i] * go;
            }
            grad_b[o] += go;
        }
        (
            Tensor::from_vec(vec![self.in_dim], grad_input),
            Tensor::from_vec(vec![self.out_dim, self.in_dim], grad_w),
            Tensor::from_vec(vec![self.out_dim], grad_b),
        )
    }
}

#[derive(Default)]
pub struct Relu;

impl Relu {
    pub fn forward(&self, x: &Tensor) -> Tensor {
        let data: Vec<f32> = x.data.iter().map(|&v| v.max(0.0)).collect();
        Tensor::from_vec(x.shape.clone(), data)
    }

    pub fn backward(&self, x: &Tensor, grad: &Tensor) -> Tensor {
        let data: Vec<f32> = x
            .data
            .iter()
            .zip(&grad.data)
            .map(|(&v, &g)| if v > 0.0 { g } else { 0.0 })
            .collect();
        Tensor::from_vec(x.shape.clone(), data)
    }
}

#[derive(Default)]
pub struct Softmax;

impl Softmax {
    pub fn forward(&self, x: &Tensor) -> Tensor {
        let m = x.data.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let exp: Vec<f32> = x.data.iter().map(|&v| (v - m).exp()).collect();
        let sum: f32 = exp.iter().sum();
        let data: Vec<f32> = exp.iter().map(|&e| e / sum).collect();
        Tensor::from_vec(x.shape.clone(), data)
    }

    /// Full-Jacobian backward through the normalized exponential.
    pub fn backward(&self, x: &Tensor, grad: &Tensor) -> Tensor {
        let sm = self.forward(x);
        let n = sm.data.len();
        let mut result = vec![0.0; n];
        for i in 0..n {
            for j in 0..n {
                let delta = if i == j { 1.0 } else { 0.0 };
                result[j] += grad.data[i] * sm.data[i] * (delta - sm.data[j]);
            }
        }
        Tensor::from_vec(x.shape.clone(), result)
    }
}
