//! Fitting the LSTM regressor to a training set

use crate::config::ForecastConfig;
use crate::error::{ForecastError, Result};
use crate::metrics::{in_sample_accuracy, ForecastAccuracy};
use crate::models::lstm::Weights;
use crate::models::{LstmRegressor, LstmShape, MinMaxScaler};
use crate::windows::TrainingSet;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Summary of one fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Epochs run
    pub epochs: usize,
    /// Windows the model was fitted on
    pub windows: usize,
    /// Mean squared error (scaled units) of the last epoch
    pub final_loss: f64,
    /// Mean squared error per epoch
    pub loss_history: Vec<f64>,
    /// One-step accuracy over the training windows, in original units
    pub accuracy: ForecastAccuracy,
}

/// A fitted model with its training summary
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub model: LstmRegressor,
    pub report: TrainingReport,
}

/// Something that turns a training set into a fitted model.
///
/// Callers are responsible for checking the minimum window count before
/// calling [`Trainer::train`].
pub trait Trainer {
    fn train(&self, set: &TrainingSet) -> Result<TrainedModel>;
}

impl<T: Trainer + ?Sized> Trainer for &T {
    fn train(&self, set: &TrainingSet) -> Result<TrainedModel> {
        (**self).train(set)
    }
}

/// Adam with the Keras defaults for beta and epsilon.
#[derive(Debug)]
struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    t: i32,
    m: Weights,
    v: Weights,
}

impl Adam {
    fn new(shape: &LstmShape, learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            t: 0,
            m: Weights::zeros(shape),
            v: Weights::zeros(shape),
        }
    }

    fn step(&mut self, params: &mut Weights, grads: &Weights) {
        self.t += 1;
        let (b1, b2) = (self.beta1, self.beta2);
        let lr_t = self.learning_rate * (1.0 - b2.powi(self.t)).sqrt() / (1.0 - b1.powi(self.t));

        let moments = self.m.tensors_mut().into_iter().zip(self.v.tensors_mut());
        for ((p, g), (m, v)) in params.tensors_mut().into_iter().zip(grads.tensors()).zip(moments) {
            for k in 0..p.len() {
                m[k] = b1 * m[k] + (1.0 - b1) * g[k];
                v[k] = b2 * v[k] + (1.0 - b2) * g[k] * g[k];
                p[k] -= lr_t * m[k] / (v[k].sqrt() + self.epsilon);
            }
        }
    }
}

/// Mini-batch Adam trainer for [`LstmRegressor`].
///
/// Runs a fixed number of epochs with no early stopping or validation split.
/// Initialisation and per-epoch shuffling draw from one seeded RNG, so a
/// given training set always produces the same model.
#[derive(Debug, Clone)]
pub struct LstmTrainer {
    epochs: usize,
    batch_size: usize,
    lstm_units: usize,
    dense_units: usize,
    learning_rate: f64,
    seed: u64,
}

impl LstmTrainer {
    pub fn new(config: &ForecastConfig) -> Self {
        Self {
            epochs: config.epochs,
            batch_size: config.batch_size,
            lstm_units: config.lstm_units,
            dense_units: config.dense_units,
            learning_rate: config.learning_rate,
            seed: config.seed,
        }
    }
}

impl Trainer for LstmTrainer {
    fn train(&self, set: &TrainingSet) -> Result<TrainedModel> {
        if set.is_empty() {
            return Err(ForecastError::TrainingFailure(
                "Training set contains no windows".to_string(),
            ));
        }
        if self.batch_size == 0 || self.epochs == 0 {
            return Err(ForecastError::InvalidParameter(
                "Epochs and batch size must be positive".to_string(),
            ));
        }

        let shape = LstmShape {
            window: set.window_len(),
            lstm_units: self.lstm_units,
            dense_units: self.dense_units,
        };
        let scaler = MinMaxScaler::fit(set.values())?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut model = LstmRegressor::initialise(shape, scaler, &mut rng);

        let samples: Vec<(Vec<f64>, f64)> = set
            .iter()
            .map(|w| (model.scale_window(&w.inputs), model.scale_value(w.target)))
            .collect();

        log::info!(
            "Training LSTM({}) on {} windows for {} epochs",
            shape.lstm_units,
            samples.len(),
            self.epochs
        );

        let mut adam = Adam::new(&shape, self.learning_rate);
        let mut grads = Weights::zeros(&shape);
        let mut order: Vec<usize> = (0..samples.len()).collect();
        let mut loss_history = Vec::with_capacity(self.epochs);

        for epoch in 0..self.epochs {
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0;

            for batch in order.chunks(self.batch_size) {
                grads.fill_zero();
                let scale = 1.0 / batch.len() as f64;
                for &idx in batch {
                    let (inputs, target) = &samples[idx];
                    let trace = model.forward(inputs);
                    let err = trace.output - target;
                    epoch_loss += err * err;
                    model.backward(&trace, 2.0 * err * scale, &mut grads);
                }
                adam.step(&mut model.weights, &grads);
            }

            let loss = epoch_loss / samples.len() as f64;
            if !loss.is_finite() {
                return Err(ForecastError::TrainingFailure(format!(
                    "Loss diverged at epoch {}",
                    epoch + 1
                )));
            }
            loss_history.push(loss);
        }

        if !model.weights.is_finite() {
            return Err(ForecastError::TrainingFailure(
                "Weights became non-finite".to_string(),
            ));
        }

        let final_loss = loss_history.last().copied().unwrap_or_default();
        let accuracy = in_sample_accuracy(&model, set)?;
        log::info!(
            "Training finished: loss {:.6}, in-sample RMSE {:.4}",
            final_loss,
            accuracy.rmse
        );

        Ok(TrainedModel {
            model,
            report: TrainingReport {
                epochs: self.epochs,
                windows: samples.len(),
                final_loss,
                loss_history,
                accuracy,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SequenceModel;
    use crate::windows::make_windows;

    fn quick_config() -> ForecastConfig {
        ForecastConfig {
            epochs: 60,
            lstm_units: 8,
            dense_units: 4,
            learning_rate: 0.01,
            ..ForecastConfig::default()
        }
    }

    fn ramp(len: usize) -> Vec<f64> {
        (0..len).map(|i| 100.0 + 2.0 * i as f64).collect()
    }

    #[test]
    fn test_training_reduces_loss() {
        let set = make_windows(&ramp(30), 5);
        let trained = LstmTrainer::new(&quick_config()).train(&set).unwrap();

        let history = &trained.report.loss_history;
        assert_eq!(history.len(), 60);
        assert!(history.last().unwrap() < history.first().unwrap());
        assert_eq!(trained.report.windows, 25);
    }

    #[test]
    fn test_training_is_deterministic() {
        let set = make_windows(&ramp(12), 5);
        let trainer = LstmTrainer::new(&quick_config());
        let a = trainer.train(&set).unwrap();
        let b = trainer.train(&set).unwrap();

        assert_eq!(a.model, b.model);
        let window = [110.0, 112.0, 114.0, 116.0, 118.0];
        assert_eq!(
            a.model.predict(&window).unwrap(),
            b.model.predict(&window).unwrap()
        );
    }

    #[test]
    fn test_empty_set_is_a_training_failure() {
        let set = make_windows(&[1.0, 2.0], 5);
        let result = LstmTrainer::new(&quick_config()).train(&set);
        assert!(matches!(result, Err(ForecastError::TrainingFailure(_))));
    }

    #[test]
    fn test_divergence_is_reported() {
        let config = ForecastConfig {
            learning_rate: f64::INFINITY,
            epochs: 3,
            ..quick_config()
        };
        let set = make_windows(&ramp(12), 5);
        let result = LstmTrainer::new(&config).train(&set);
        assert!(matches!(result, Err(ForecastError::TrainingFailure(_))));
    }
}
