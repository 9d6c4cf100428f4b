//! LSTM(units) -> Dense(relu) -> Dense(1) regressor over a univariate window
//!
//! Gate pre-activations are laid out as four consecutive blocks of `units`
//! values in the order input, forget, cell, output.

use crate::error::{ForecastError, Result};
use crate::models::scaler::MinMaxScaler;
use crate::models::SequenceModel;
use rand::Rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

/// Layer sizes of the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LstmShape {
    /// Input window length
    pub window: usize,
    /// Hidden width of the recurrent layer
    pub lstm_units: usize,
    /// Width of the dense hidden layer
    pub dense_units: usize,
}

/// All trainable tensors, stored flat and row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    /// Input kernel, one weight per gate unit
    pub(crate) kernel: Vec<f64>,
    /// Recurrent kernel, `4 * units` rows of `units`
    pub(crate) recurrent: Vec<f64>,
    pub(crate) bias: Vec<f64>,
    /// Dense kernel, `dense_units` rows of `units`
    pub(crate) dense: Vec<f64>,
    pub(crate) dense_bias: Vec<f64>,
    pub(crate) output: Vec<f64>,
    pub(crate) output_bias: Vec<f64>,
}

impl Weights {
    pub(crate) fn zeros(shape: &LstmShape) -> Self {
        let n = shape.lstm_units;
        let d = shape.dense_units;
        Self {
            kernel: vec![0.0; 4 * n],
            recurrent: vec![0.0; 4 * n * n],
            bias: vec![0.0; 4 * n],
            dense: vec![0.0; d * n],
            dense_bias: vec![0.0; d],
            output: vec![0.0; d],
            output_bias: vec![0.0; 1],
        }
    }

    pub(crate) fn tensors(&self) -> [&[f64]; 7] {
        [
            &self.kernel,
            &self.recurrent,
            &self.bias,
            &self.dense,
            &self.dense_bias,
            &self.output,
            &self.output_bias,
        ]
    }

    pub(crate) fn tensors_mut(&mut self) -> [&mut [f64]; 7] {
        [
            &mut self.kernel,
            &mut self.recurrent,
            &mut self.bias,
            &mut self.dense,
            &mut self.dense_bias,
            &mut self.output,
            &mut self.output_bias,
        ]
    }

    pub(crate) fn fill_zero(&mut self) {
        for tensor in self.tensors_mut() {
            tensor.iter_mut().for_each(|v| *v = 0.0);
        }
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.tensors()
            .iter()
            .all(|tensor| tensor.iter().all(|v| v.is_finite()))
    }

    fn matches(&self, shape: &LstmShape) -> bool {
        let expected = Weights::zeros(shape);
        self.tensors()
            .iter()
            .zip(expected.tensors().iter())
            .all(|(actual, want)| actual.len() == want.len())
    }
}

/// Per-timestep activations kept for backpropagation through time.
#[derive(Debug, Clone)]
struct Step {
    x: f64,
    h_prev: Vec<f64>,
    c_prev: Vec<f64>,
    input_gate: Vec<f64>,
    forget_gate: Vec<f64>,
    candidate: Vec<f64>,
    output_gate: Vec<f64>,
    cell: Vec<f64>,
}

/// Forward pass record for one window.
#[derive(Debug, Clone)]
pub(crate) struct Trace {
    steps: Vec<Step>,
    hidden: Vec<f64>,
    dense_pre: Vec<f64>,
    dense_act: Vec<f64>,
    pub(crate) output: f64,
}

/// Trained (or freshly initialised) LSTM regressor for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmRegressor {
    shape: LstmShape,
    scaler: MinMaxScaler,
    pub(crate) weights: Weights,
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn glorot<R: Rng + ?Sized>(tensor: &mut [f64], fan_in: usize, fan_out: usize, rng: &mut R) {
    let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
    let dist = Uniform::new_inclusive(-limit, limit);
    for v in tensor.iter_mut() {
        *v = dist.sample(rng);
    }
}

impl LstmRegressor {
    /// Create a network with Glorot-uniform kernels, zero biases and a unit
    /// forget-gate bias.
    pub fn initialise<R: Rng + ?Sized>(shape: LstmShape, scaler: MinMaxScaler, rng: &mut R) -> Self {
        let n = shape.lstm_units;
        let d = shape.dense_units;
        let mut weights = Weights::zeros(&shape);

        glorot(&mut weights.kernel, 1, 4 * n, rng);
        glorot(&mut weights.recurrent, n, 4 * n, rng);
        weights.bias[n..2 * n].iter_mut().for_each(|b| *b = 1.0);
        glorot(&mut weights.dense, n, d, rng);
        glorot(&mut weights.output, d, 1, rng);

        Self {
            shape,
            scaler,
            weights,
        }
    }

    pub fn shape(&self) -> LstmShape {
        self.shape
    }

    pub fn scaler(&self) -> &MinMaxScaler {
        &self.scaler
    }

    /// Check that every tensor matches the declared shape and holds finite values.
    pub fn check_integrity(&self) -> std::result::Result<(), String> {
        if self.shape.window == 0 || self.shape.lstm_units == 0 || self.shape.dense_units == 0 {
            return Err(format!("degenerate shape {:?}", self.shape));
        }
        if !self.weights.matches(&self.shape) {
            return Err(format!("tensor sizes do not match shape {:?}", self.shape));
        }
        if !self.weights.is_finite() {
            return Err("weights contain non-finite values".to_string());
        }
        if !self.scaler.is_valid() {
            return Err("scaler parameters are invalid".to_string());
        }
        Ok(())
    }

    /// Scale a raw window into network input space
    pub(crate) fn scale_window(&self, window: &[f64]) -> Vec<f64> {
        window.iter().map(|&v| self.scaler.transform(v)).collect()
    }

    pub(crate) fn scale_value(&self, value: f64) -> f64 {
        self.scaler.transform(value)
    }

    /// Run the network on an already scaled window.
    pub(crate) fn forward(&self, xs: &[f64]) -> Trace {
        let n = self.shape.lstm_units;
        let d = self.shape.dense_units;
        let w = &self.weights;

        let mut h = vec![0.0; n];
        let mut c = vec![0.0; n];
        let mut steps = Vec::with_capacity(xs.len());
        let mut z = vec![0.0; 4 * n];

        for &x in xs {
            for (r, zr) in z.iter_mut().enumerate() {
                *zr = w.kernel[r] * x + w.bias[r] + dot(&w.recurrent[r * n..(r + 1) * n], &h);
            }

            let input_gate: Vec<f64> = z[..n].iter().map(|&v| sigmoid(v)).collect();
            let forget_gate: Vec<f64> = z[n..2 * n].iter().map(|&v| sigmoid(v)).collect();
            let candidate: Vec<f64> = z[2 * n..3 * n].iter().map(|&v| v.tanh()).collect();
            let output_gate: Vec<f64> = z[3 * n..].iter().map(|&v| sigmoid(v)).collect();

            let cell: Vec<f64> = (0..n)
                .map(|j| forget_gate[j] * c[j] + input_gate[j] * candidate[j])
                .collect();
            let hidden: Vec<f64> = (0..n).map(|j| output_gate[j] * cell[j].tanh()).collect();

            steps.push(Step {
                x,
                h_prev: std::mem::replace(&mut h, hidden),
                c_prev: std::mem::replace(&mut c, cell.clone()),
                input_gate,
                forget_gate,
                candidate,
                output_gate,
                cell,
            });
        }

        let dense_pre: Vec<f64> = (0..d)
            .map(|k| w.dense_bias[k] + dot(&w.dense[k * n..(k + 1) * n], &h))
            .collect();
        let dense_act: Vec<f64> = dense_pre.iter().map(|&v| v.max(0.0)).collect();
        let output = w.output_bias[0] + dot(&w.output, &dense_act);

        Trace {
            steps,
            hidden: h,
            dense_pre,
            dense_act,
            output,
        }
    }

    /// Accumulate into `grads` the gradient of the loss given `d_output`,
    /// the derivative of the loss with respect to the network output.
    pub(crate) fn backward(&self, trace: &Trace, d_output: f64, grads: &mut Weights) {
        let n = self.shape.lstm_units;
        let d = self.shape.dense_units;
        let w = &self.weights;

        grads.output_bias[0] += d_output;

        let mut dh = vec![0.0; n];
        for k in 0..d {
            grads.output[k] += d_output * trace.dense_act[k];
            if trace.dense_pre[k] <= 0.0 {
                continue;
            }
            let da = d_output * w.output[k];
            grads.dense_bias[k] += da;
            let row = k * n;
            for j in 0..n {
                grads.dense[row + j] += da * trace.hidden[j];
                dh[j] += da * w.dense[row + j];
            }
        }

        let mut dc_next = vec![0.0; n];
        let mut dz = vec![0.0; 4 * n];

        for step in trace.steps.iter().rev() {
            for j in 0..n {
                let i = step.input_gate[j];
                let f = step.forget_gate[j];
                let g = step.candidate[j];
                let o = step.output_gate[j];
                let tanh_c = step.cell[j].tanh();

                let dc = dc_next[j] + dh[j] * o * (1.0 - tanh_c * tanh_c);
                dc_next[j] = dc * f;

                dz[j] = dc * g * i * (1.0 - i);
                dz[n + j] = dc * step.c_prev[j] * f * (1.0 - f);
                dz[2 * n + j] = dc * i * (1.0 - g * g);
                dz[3 * n + j] = dh[j] * tanh_c * o * (1.0 - o);
            }

            let mut dh_prev = vec![0.0; n];
            for (r, &g) in dz.iter().enumerate() {
                grads.kernel[r] += g * step.x;
                grads.bias[r] += g;
                let row = r * n;
                for j in 0..n {
                    grads.recurrent[row + j] += g * step.h_prev[j];
                    dh_prev[j] += g * w.recurrent[row + j];
                }
            }
            dh = dh_prev;
        }
    }
}

impl SequenceModel for LstmRegressor {
    fn window_len(&self) -> usize {
        self.shape.window
    }

    fn predict(&self, window: &[f64]) -> Result<f64> {
        if window.len() != self.shape.window {
            return Err(ForecastError::InvalidParameter(format!(
                "Expected a window of {} values, got {}",
                self.shape.window,
                window.len()
            )));
        }
        let trace = self.forward(&self.scale_window(window));
        Ok(self.scaler.inverse(trace.output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn small_model(seed: u64) -> LstmRegressor {
        let shape = LstmShape {
            window: 3,
            lstm_units: 4,
            dense_units: 3,
        };
        let scaler = MinMaxScaler::fit(vec![0.0, 10.0]).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut model = LstmRegressor::initialise(shape, scaler, &mut rng);
        // Positive dense biases keep every ReLU active so the loss is smooth
        // around the point where gradients are checked.
        model.weights.dense_bias.iter_mut().for_each(|b| *b = 5.0);
        model
    }

    fn loss(model: &LstmRegressor, xs: &[f64], target: f64) -> f64 {
        let err = model.forward(xs).output - target;
        err * err
    }

    #[test]
    fn test_initialise_is_seeded() {
        assert_eq!(small_model(7), small_model(7));
        assert_ne!(small_model(7), small_model(8));
    }

    #[test]
    fn test_forget_bias_starts_at_one() {
        let model = small_model(1);
        let n = model.shape().lstm_units;
        assert!(model.weights.bias[n..2 * n].iter().all(|&b| b == 1.0));
        assert!(model.weights.bias[..n].iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_backward_matches_finite_differences() {
        let model = small_model(3);
        let xs = [0.2, 0.7, 0.4];
        let target = 0.9;

        let trace = model.forward(&xs);
        let mut grads = Weights::zeros(&model.shape());
        model.backward(&trace, 2.0 * (trace.output - target), &mut grads);

        let eps = 1e-6;
        let analytic: Vec<Vec<f64>> = grads.tensors().iter().map(|t| t.to_vec()).collect();
        for (t, tensor) in analytic.iter().enumerate() {
            for (k, &g) in tensor.iter().enumerate() {
                let mut plus = model.clone();
                plus.weights.tensors_mut()[t][k] += eps;
                let mut minus = model.clone();
                minus.weights.tensors_mut()[t][k] -= eps;
                let numeric = (loss(&plus, &xs, target) - loss(&minus, &xs, target)) / (2.0 * eps);
                assert_relative_eq!(g, numeric, epsilon = 1e-6, max_relative = 1e-4);
            }
        }
    }

    #[test]
    fn test_predict_rejects_wrong_window() {
        let model = small_model(1);
        assert!(model.predict(&[1.0, 2.0]).is_err());
        assert!(model.predict(&[1.0, 2.0, 3.0]).unwrap().is_finite());
    }

    #[test]
    fn test_integrity_detects_truncated_tensors() {
        let mut model = small_model(1);
        assert!(model.check_integrity().is_ok());
        model.weights.recurrent.pop();
        assert!(model.check_integrity().is_err());
    }
}
