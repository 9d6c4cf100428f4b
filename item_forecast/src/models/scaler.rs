//! Min-max scaling of model inputs and outputs

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

/// Maps values from `[min, min + range]` onto `[0, 1]` and back.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    min: f64,
    range: f64,
}

impl MinMaxScaler {
    /// Fit the scaler to the observed values.
    ///
    /// A constant input gets a unit range so that transforms stay finite.
    pub fn fit<I: IntoIterator<Item = f64>>(values: I) -> Result<Self> {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut seen = 0usize;

        for value in values {
            if !value.is_finite() {
                return Err(ForecastError::DataError(format!(
                    "Cannot scale non-finite value {}",
                    value
                )));
            }
            min = min.min(value);
            max = max.max(value);
            seen += 1;
        }

        if seen == 0 {
            return Err(ForecastError::DataError(
                "Cannot fit a scaler to an empty series".to_string(),
            ));
        }

        let range = if max > min { max - min } else { 1.0 };
        Ok(Self { min, range })
    }

    pub fn transform(&self, value: f64) -> f64 {
        (value - self.min) / self.range
    }

    pub fn inverse(&self, scaled: f64) -> f64 {
        scaled * self.range + self.min
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.min.is_finite() && self.range.is_finite() && self.range > 0.0
    }
}
