//! Forecast orchestration: history check, model resolution, prediction
//!
//! A request for an item goes through four stages:
//!
//! 1. A series shorter than `window + history_margin` is reported as
//!    [`UnavailableReason::InsufficientHistory`] before any model lookup.
//! 2. A cached or persisted artifact is reused unless the retrain policy
//!    marks it stale.
//! 3. Otherwise the series is windowed; too few windows is reported as
//!    [`UnavailableReason::InsufficientWindows`] and nothing is persisted.
//!    Enough windows are trained on, saved, and cached.
//! 4. The last `window` values are fed to the model for a one-step forecast.

use crate::cache::ModelCache;
use crate::config::{ForecastConfig, RetrainPolicy};
use crate::data::Series;
use crate::error::{ForecastError, Result};
use crate::store::{normalize_item_id, FileModelStore, ModelArtifact, ModelStore};
use crate::trainer::{LstmTrainer, Trainer};
use crate::windows::{last_window, make_windows};
use chrono::Utc;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Where the model behind a forecast came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSource {
    /// Already resolved earlier in this process
    Cache,
    /// Loaded from the model store
    Store,
    /// Trained for this request
    Trained,
}

/// Why no forecast could be produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    /// The series is too short to attempt a forecast
    InsufficientHistory { required: usize, actual: usize },
    /// Too few windows could be derived to train a model
    InsufficientWindows { required: usize, actual: usize },
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::InsufficientHistory { required, actual } => write!(
                f,
                "Not enough data points to train a model ({} observations, need {})",
                actual, required
            ),
            UnavailableReason::InsufficientWindows { required, actual } => write!(
                f,
                "Model could not be trained: insufficient data ({} windows, need {})",
                actual, required
            ),
        }
    }
}

/// A one-step-ahead forecast
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub item_id: String,
    pub value: f64,
    pub source: ModelSource,
}

/// Outcome of a forecast request that did not hit a hard error
#[derive(Debug, Clone, PartialEq)]
pub enum ForecastOutcome {
    Forecast(Forecast),
    Unavailable(UnavailableReason),
}

impl ForecastOutcome {
    /// The forecast value, if one was produced
    pub fn value(&self) -> Option<f64> {
        match self {
            ForecastOutcome::Forecast(forecast) => Some(forecast.value),
            ForecastOutcome::Unavailable(_) => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, ForecastOutcome::Forecast(_))
    }

    pub fn unavailable_reason(&self) -> Option<UnavailableReason> {
        match self {
            ForecastOutcome::Forecast(_) => None,
            ForecastOutcome::Unavailable(reason) => Some(*reason),
        }
    }
}

/// One mutex per normalised item, so the same item is never trained twice concurrently.
#[derive(Debug, Default)]
pub struct ItemLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ItemLocks {
    pub fn lock_for(&self, item_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(normalize_item_id(item_id))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

enum Resolution {
    Ready(Arc<ModelArtifact>, ModelSource),
    Unavailable(UnavailableReason),
}

/// Train-or-load forecasting for many items.
///
/// Safe to share across threads when the store and trainer are.
#[derive(Debug)]
pub struct ForecastService<S = FileModelStore, T = LstmTrainer> {
    config: ForecastConfig,
    store: S,
    trainer: T,
    cache: ModelCache,
    locks: ItemLocks,
}

impl ForecastService<FileModelStore, LstmTrainer> {
    /// Service backed by JSON artifacts under `config.model_dir`
    pub fn new(config: ForecastConfig) -> Result<Self> {
        let store = FileModelStore::new(config.model_dir.clone());
        let trainer = LstmTrainer::new(&config);
        Self::with_parts(config, store, trainer)
    }
}

impl<S: ModelStore, T: Trainer> ForecastService<S, T> {
    pub fn with_parts(config: ForecastConfig, store: S, trainer: T) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            trainer,
            cache: ModelCache::new(),
            locks: ItemLocks::default(),
        })
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn trainer(&self) -> &T {
        &self.trainer
    }

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    /// Forecast the next value of `series` under the configured retrain policy
    pub fn forecast(&self, item_id: &str, series: &[f64]) -> Result<ForecastOutcome> {
        self.forecast_with(item_id, series, self.config.retrain)
    }

    pub fn forecast_series(&self, series: &Series) -> Result<ForecastOutcome> {
        self.forecast(series.item_id(), series.values())
    }

    /// Forecast with an explicit retrain policy, e.g. [`RetrainPolicy::Always`]
    /// to force a refit.
    pub fn forecast_with(
        &self,
        item_id: &str,
        series: &[f64],
        policy: RetrainPolicy,
    ) -> Result<ForecastOutcome> {
        let required = self.config.min_series_len();
        if series.len() < required {
            let reason = UnavailableReason::InsufficientHistory {
                required,
                actual: series.len(),
            };
            log::info!("No forecast for '{}': {}", item_id, reason);
            return Ok(ForecastOutcome::Unavailable(reason));
        }
        if let Some(bad) = series.iter().find(|v| !v.is_finite()) {
            return Err(ForecastError::DataError(format!(
                "Series for '{}' contains non-finite value {}",
                item_id, bad
            )));
        }

        let (artifact, source) = match self.resolve_model(item_id, series, policy)? {
            Resolution::Ready(artifact, source) => (artifact, source),
            Resolution::Unavailable(reason) => {
                log::info!("No forecast for '{}': {}", item_id, reason);
                return Ok(ForecastOutcome::Unavailable(reason));
            }
        };

        if artifact.window_len() != self.config.window {
            return Err(ForecastError::corrupt(
                self.store.location(item_id),
                format!(
                    "model expects {}-value windows but the service uses {}",
                    artifact.window_len(),
                    self.config.window
                ),
            ));
        }

        let window = last_window(series, self.config.window).ok_or_else(|| {
            ForecastError::DataError(format!("Series for '{}' is shorter than one window", item_id))
        })?;
        let value = artifact.predict(window)?;

        Ok(ForecastOutcome::Forecast(Forecast {
            item_id: item_id.to_string(),
            value,
            source,
        }))
    }

    fn resolve_model(
        &self,
        item_id: &str,
        series: &[f64],
        policy: RetrainPolicy,
    ) -> Result<Resolution> {
        let lock = self.locks.lock_for(item_id);
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Utc::now();

        let is_stale = |artifact: &ModelArtifact| {
            policy.is_stale(artifact.trained_at, artifact.series_len, series.len(), now)
        };

        // A forced refit must not depend on the old artifact being readable.
        let existing = if policy == RetrainPolicy::Always {
            None
        } else {
            self.existing_model(item_id)?
        };

        if let Some((artifact, source)) = &existing {
            if !is_stale(artifact.as_ref()) {
                log::debug!("Using {:?} model for '{}'", source, item_id);
                return Ok(Resolution::Ready(Arc::clone(artifact), *source));
            }
            log::debug!("Model for '{}' is stale under {:?}", item_id, policy);
        }

        let set = make_windows(series, self.config.window);
        if set.len() < self.config.min_windows {
            let fallback = match existing {
                Some(found) => Some(found),
                None if policy == RetrainPolicy::Always => self.existing_model(item_id)?,
                None => None,
            };
            if let Some((artifact, source)) = fallback {
                log::warn!(
                    "Too few windows to retrain '{}'; keeping the existing model",
                    item_id
                );
                return Ok(Resolution::Ready(artifact, source));
            }
            return Ok(Resolution::Unavailable(
                UnavailableReason::InsufficientWindows {
                    required: self.config.min_windows,
                    actual: set.len(),
                },
            ));
        }

        let trained = self.trainer.train(&set)?;
        let artifact = ModelArtifact::new(item_id, series.len(), trained);
        self.store.save(item_id, &artifact)?;

        let artifact = Arc::new(artifact);
        self.cache.insert(item_id, Arc::clone(&artifact));
        Ok(Resolution::Ready(artifact, ModelSource::Trained))
    }

    /// Cached model, else the persisted one (which is then cached)
    fn existing_model(&self, item_id: &str) -> Result<Option<(Arc<ModelArtifact>, ModelSource)>> {
        if let Some(cached) = self.cache.get(item_id) {
            return Ok(Some((cached, ModelSource::Cache)));
        }
        if !self.store.exists(item_id) {
            return Ok(None);
        }
        let loaded = Arc::new(self.store.load(item_id)?);
        self.cache.insert(item_id, Arc::clone(&loaded));
        Ok(Some((loaded, ModelSource::Store)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_messages() {
        let history = UnavailableReason::InsufficientHistory {
            required: 8,
            actual: 7,
        };
        assert!(history.to_string().contains("Not enough data points"));

        let windows = UnavailableReason::InsufficientWindows {
            required: 5,
            actual: 3,
        };
        assert!(windows.to_string().contains("could not be trained"));
    }

    #[test]
    fn test_item_locks_share_normalised_key() {
        let locks = ItemLocks::default();
        let a = locks.lock_for("Napa Cabbage");
        let b = locks.lock_for("napa cabbage");
        let c = locks.lock_for("Daikon");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_outcome_accessors() {
        let outcome = ForecastOutcome::Forecast(Forecast {
            item_id: "Carrot".to_string(),
            value: 42.0,
            source: ModelSource::Trained,
        });
        assert_eq!(outcome.value(), Some(42.0));
        assert!(outcome.is_available());
        assert_eq!(outcome.unavailable_reason(), None);
    }
}
