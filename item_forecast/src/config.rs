//! Forecasting configuration and retrain policy

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// When a persisted artifact should be replaced by a fresh fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "policy")]
pub enum RetrainPolicy {
    /// Reuse any existing artifact, however much data has arrived since
    #[default]
    Never,
    /// Ignore existing artifacts and refit on every request
    Always,
    /// Refit once the artifact is older than `seconds`
    MaxAge { seconds: i64 },
    /// Refit when the series is longer than the one the artifact was fitted on
    WhenSeriesGrows,
}

impl RetrainPolicy {
    /// Whether an artifact fitted at `trained_at` on `trained_len` values is stale
    /// for a request carrying `series_len` values at time `now`.
    pub fn is_stale(
        &self,
        trained_at: DateTime<Utc>,
        trained_len: usize,
        series_len: usize,
        now: DateTime<Utc>,
    ) -> bool {
        match *self {
            RetrainPolicy::Never => false,
            RetrainPolicy::Always => true,
            RetrainPolicy::MaxAge { seconds } => {
                // Ages too large to represent never expire
                Duration::try_seconds(seconds).map_or(false, |max_age| now - trained_at > max_age)
            }
            RetrainPolicy::WhenSeriesGrows => series_len > trained_len,
        }
    }
}

/// Configuration for the forecast pipeline.
///
/// The defaults are the production constants: a 5-step window, one-step
/// horizon, 150 epochs at batch size 8, LSTM(32) -> Dense(16) -> Dense(1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Input window length (W)
    pub window: usize,
    /// Forecast horizon (H); only one-step forecasts are supported
    pub horizon: usize,
    /// Training epochs per fit
    pub epochs: usize,
    /// Mini-batch size
    pub batch_size: usize,
    /// Hidden width of the recurrent layer
    pub lstm_units: usize,
    /// Width of the dense hidden layer
    pub dense_units: usize,
    /// Adam learning rate
    pub learning_rate: f64,
    /// Fewest windows worth fitting a model on
    pub min_windows: usize,
    /// Extra observations beyond W required before a forecast is attempted
    pub history_margin: usize,
    /// RNG seed for initialisation and shuffling
    pub seed: u64,
    /// Directory holding model artifacts
    pub model_dir: PathBuf,
    /// Staleness policy for persisted artifacts
    pub retrain: RetrainPolicy,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            window: 5,
            horizon: 1,
            epochs: 150,
            batch_size: 8,
            lstm_units: 32,
            dense_units: 16,
            learning_rate: 0.001,
            min_windows: 5,
            history_margin: 3,
            seed: 42,
            model_dir: PathBuf::from("models"),
            retrain: RetrainPolicy::Never,
        }
    }
}

impl ForecastConfig {
    /// Read a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Same configuration rooted at another model directory
    pub fn with_model_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.model_dir = dir.into();
        self
    }

    /// Same configuration with another retrain policy
    pub fn with_retrain(mut self, retrain: RetrainPolicy) -> Self {
        self.retrain = retrain;
        self
    }

    /// Shortest series for which a forecast is attempted at all
    pub fn min_series_len(&self) -> usize {
        self.window + self.history_margin
    }

    /// Check parameter ranges
    pub fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(ForecastError::InvalidParameter(
                "Window length must be positive".to_string(),
            ));
        }
        if self.horizon != 1 {
            return Err(ForecastError::InvalidParameter(format!(
                "Only one-step forecasts are supported, got horizon {}",
                self.horizon
            )));
        }
        if self.epochs == 0 || self.batch_size == 0 {
            return Err(ForecastError::InvalidParameter(
                "Epochs and batch size must be positive".to_string(),
            ));
        }
        if self.lstm_units == 0 || self.dense_units == 0 {
            return Err(ForecastError::InvalidParameter(
                "Layer widths must be positive".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(ForecastError::InvalidParameter(format!(
                "Learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if let RetrainPolicy::MaxAge { seconds } = self.retrain {
            if seconds < 0 {
                return Err(ForecastError::InvalidParameter(
                    "Maximum artifact age cannot be negative".to_string(),
                ));
            }
        }
        Ok(())
    }
}
