//! Persisted per-item model artifacts

use crate::error::{ForecastError, Result};
use crate::models::{LstmRegressor, SequenceModel};
use crate::trainer::{TrainedModel, TrainingReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Version written into every artifact; artifacts with another version are rejected.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Normalise an item identifier for use in a file name: lowercase, with spaces
/// and path separators turned into underscores.
///
/// Identifiers that differ only in case, or in spaces, slashes and underscores,
/// map to the same artifact. Item names are assumed not to collide under this
/// rule. The result never contains a separator, so every artifact stays
/// directly inside the store directory.
pub fn normalize_item_id(item_id: &str) -> String {
    item_id
        .to_lowercase()
        .replace([' ', '/', '\\'], "_")
}

/// File name of the artifact for `item_id`
pub fn artifact_file_name(item_id: &str) -> String {
    format!("lstm_{}.json", normalize_item_id(item_id))
}

/// A trained model plus the metadata needed to judge its freshness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    /// Identifier as given when the model was trained
    pub item_id: String,
    pub trained_at: DateTime<Utc>,
    /// Length of the series the model was fitted on
    pub series_len: usize,
    pub report: TrainingReport,
    pub model: LstmRegressor,
}

impl ModelArtifact {
    pub fn new(item_id: &str, series_len: usize, trained: TrainedModel) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            item_id: item_id.to_string(),
            trained_at: Utc::now(),
            series_len,
            report: trained.report,
            model: trained.model,
        }
    }

    pub fn window_len(&self) -> usize {
        self.model.window_len()
    }

    pub fn predict(&self, window: &[f64]) -> Result<f64> {
        self.model.predict(window)
    }
}

/// Keyed persistence for model artifacts.
pub trait ModelStore {
    /// Whether an artifact is present for `item_id`
    fn exists(&self, item_id: &str) -> bool;

    /// Load the artifact for `item_id`, failing with
    /// [`ForecastError::ArtifactCorruptOrMissing`] if absent or unreadable
    fn load(&self, item_id: &str) -> Result<ModelArtifact>;

    /// Persist `artifact` for `item_id`, replacing any previous one
    fn save(&self, item_id: &str, artifact: &ModelArtifact) -> Result<()>;

    /// Where the artifact for `item_id` lives, for error reports
    fn location(&self, item_id: &str) -> PathBuf;
}

impl<S: ModelStore + ?Sized> ModelStore for &S {
    fn exists(&self, item_id: &str) -> bool {
        (**self).exists(item_id)
    }

    fn load(&self, item_id: &str) -> Result<ModelArtifact> {
        (**self).load(item_id)
    }

    fn save(&self, item_id: &str, artifact: &ModelArtifact) -> Result<()> {
        (**self).save(item_id, artifact)
    }

    fn location(&self, item_id: &str) -> PathBuf {
        (**self).location(item_id)
    }
}

/// JSON artifacts under one directory, one file per item.
#[derive(Debug, Clone)]
pub struct FileModelStore {
    dir: PathBuf,
}

impl FileModelStore {
    /// The directory is created on first save, not here.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the artifact for `item_id`
    pub fn artifact_path(&self, item_id: &str) -> PathBuf {
        self.dir.join(artifact_file_name(item_id))
    }
}

impl ModelStore for FileModelStore {
    fn exists(&self, item_id: &str) -> bool {
        self.artifact_path(item_id).is_file()
    }

    fn load(&self, item_id: &str) -> Result<ModelArtifact> {
        let path = self.artifact_path(item_id);
        let text = fs::read_to_string(&path).map_err(|e| ForecastError::corrupt(&path, e))?;
        let artifact: ModelArtifact =
            serde_json::from_str(&text).map_err(|e| ForecastError::corrupt(&path, e))?;

        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(ForecastError::corrupt(
                &path,
                format!("unsupported format version {}", artifact.format_version),
            ));
        }
        artifact
            .model
            .check_integrity()
            .map_err(|reason| ForecastError::corrupt(&path, reason))?;

        log::debug!("Loaded model for '{}' from {}", item_id, path.display());
        Ok(artifact)
    }

    fn save(&self, item_id: &str, artifact: &ModelArtifact) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.artifact_path(item_id);
        let tmp = path.with_extension("json.tmp");

        let json = serde_json::to_vec(artifact)?;
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&json)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, &path)?;

        log::debug!("Saved model for '{}' to {}", item_id, path.display());
        Ok(())
    }

    fn location(&self, item_id: &str) -> PathBuf {
        self.artifact_path(item_id)
    }
}
