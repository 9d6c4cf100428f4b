//! # Item Forecast Workspace
//!
//! Umbrella crate re-exporting [`item_forecast`], the per-item LSTM
//! next-period forecaster.
//!
//! ## Example
//!
//! ```
//! use item_forecast_workspace::forecast::{make_windows, ForecastConfig};
//!
//! let config = ForecastConfig::default();
//! let series = [10.0, 12.0, 11.0, 13.0, 15.0, 14.0, 16.0, 18.0];
//!
//! assert_eq!(config.min_series_len(), 8);
//! assert_eq!(make_windows(&series, config.window).len(), 3);
//! ```

pub use item_forecast as forecast;

/// Crate version of the forecasting library
pub fn library_version() -> &'static str {
    item_forecast::VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_version() {
        assert_eq!(library_version(), forecast::VERSION);
        assert!(!library_version().is_empty());
    }
}
