//! Sequence models mapping an input window to the next value

use crate::error::Result;
use std::fmt::Debug;

/// A fitted model that forecasts one step ahead from a fixed-length window
pub trait SequenceModel: Debug {
    /// Length of the input window the model was fitted on
    fn window_len(&self) -> usize;

    /// Predict the value immediately following `window`
    fn predict(&self, window: &[f64]) -> Result<f64>;
}

pub mod lstm;
pub mod scaler;

pub use lstm::{LstmRegressor, LstmShape};
pub use scaler::MinMaxScaler;
