//! # Item Forecast
//!
//! Next-period forecasting for individual item time series with a small
//! per-item LSTM, trained lazily on first request and cached to disk.
//!
//! ## Features
//!
//! - Sliding-window supervision over a univariate series
//! - LSTM(32) -> Dense(16, relu) -> Dense(1) regressor trained with Adam
//! - JSON model artifacts keyed by a normalised item name
//! - Explicit in-process model cache and per-item training locks
//! - Configurable staleness policy for persisted models
//!
//! ## Quick Start
//!
//! ```no_run
//! use item_forecast::{ForecastConfig, ForecastOutcome, ForecastService};
//!
//! let service = ForecastService::new(ForecastConfig::default())?;
//! let series = [210.0, 215.0, 198.0, 220.0, 231.0, 228.0, 240.0, 236.0, 245.0, 251.0];
//!
//! match service.forecast("Napa Cabbage", &series)? {
//!     ForecastOutcome::Forecast(f) => println!("next: {:.0}", f.value),
//!     ForecastOutcome::Unavailable(reason) => println!("{}", reason),
//! }
//! # Ok::<(), item_forecast::ForecastError>(())
//! ```

pub mod cache;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod models;
pub mod service;
pub mod store;
pub mod trainer;
pub mod windows;

// Re-export commonly used types
pub use crate::cache::ModelCache;
pub use crate::config::{ForecastConfig, RetrainPolicy};
pub use crate::data::{DataLoader, Series, SeriesColumns, SeriesPanel};
pub use crate::error::{ForecastError, Result};
pub use crate::models::{LstmRegressor, SequenceModel};
pub use crate::service::{
    Forecast, ForecastOutcome, ForecastService, ModelSource, UnavailableReason,
};
pub use crate::store::{FileModelStore, ModelArtifact, ModelStore};
pub use crate::trainer::{LstmTrainer, TrainedModel, Trainer, TrainingReport};
pub use crate::windows::{make_windows, TrainingSet, Window};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
