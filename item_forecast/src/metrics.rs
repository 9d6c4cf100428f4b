//! Accuracy metrics for fitted models

use crate::error::{ForecastError, Result};
use crate::models::SequenceModel;
use crate::windows::TrainingSet;
use serde::{Deserialize, Serialize};

/// Forecast accuracy metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastAccuracy {
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error, over non-zero actuals
    pub mape: f64,
}

impl std::fmt::Display for ForecastAccuracy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Forecast Accuracy Metrics:")?;
        writeln!(f, "  MAE:   {:.4}", self.mae)?;
        writeln!(f, "  MSE:   {:.4}", self.mse)?;
        writeln!(f, "  RMSE:  {:.4}", self.rmse)?;
        writeln!(f, "  MAPE:  {:.4}%", self.mape)?;
        Ok(())
    }
}

/// Calculate accuracy metrics for a forecast vs actual values
pub fn forecast_accuracy(forecast: &[f64], actual: &[f64]) -> Result<ForecastAccuracy> {
    if forecast.len() != actual.len() || forecast.is_empty() {
        return Err(ForecastError::DataError(
            "Forecast and actual values must have the same non-zero length".to_string(),
        ));
    }

    let n = forecast.len() as f64;
    let errors: Vec<f64> = forecast
        .iter()
        .zip(actual.iter())
        .map(|(&f, &a)| a - f)
        .collect();

    let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
    let mse = errors.iter().map(|e| e.powi(2)).sum::<f64>() / n;

    let nonzero: Vec<(f64, f64)> = actual
        .iter()
        .copied()
        .zip(errors.iter().copied())
        .filter(|&(a, _)| a != 0.0)
        .collect();
    let mape = if nonzero.is_empty() {
        0.0
    } else {
        nonzero
            .iter()
            .map(|(a, e)| (e.abs() / a.abs()) * 100.0)
            .sum::<f64>()
            / nonzero.len() as f64
    };

    Ok(ForecastAccuracy {
        mae,
        mse,
        rmse: mse.sqrt(),
        mape,
    })
}

/// One-step-ahead accuracy of `model` over every window of `set`
pub fn in_sample_accuracy<M: SequenceModel + ?Sized>(
    model: &M,
    set: &TrainingSet,
) -> Result<ForecastAccuracy> {
    let predictions = set
        .iter()
        .map(|w| model.predict(&w.inputs))
        .collect::<Result<Vec<f64>>>()?;
    let actual: Vec<f64> = set.iter().map(|w| w.target).collect();
    forecast_accuracy(&predictions, &actual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_forecast_accuracy() {
        let forecast = [10.0, 20.0, 30.0];
        let actual = [12.0, 18.0, 30.0];
        let acc = forecast_accuracy(&forecast, &actual).unwrap();

        assert_abs_diff_eq!(acc.mae, 4.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(acc.mse, 8.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(acc.rmse, (8.0f64 / 3.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_forecast_accuracy_length_mismatch() {
        assert!(forecast_accuracy(&[1.0], &[1.0, 2.0]).is_err());
        assert!(forecast_accuracy(&[], &[]).is_err());
    }

    #[test]
    fn test_mape_skips_zero_actuals() {
        let acc = forecast_accuracy(&[1.0, 110.0], &[0.0, 100.0]).unwrap();
        assert_abs_diff_eq!(acc.mape, 10.0, epsilon = 1e-9);
    }
}
