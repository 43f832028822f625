//! File-backed model store.
//!
//! Keeps the serialized ensemble and its training metadata as two JSON files
//! in one directory. Both are written atomically (temp file, then rename).

use crate::domain::errors::ValuationError;
use crate::domain::ml::model::ModelMetadata;
use crate::domain::repositories::{ModelStore, StoredModel};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const MODEL_FILE_NAME: &str = "property_valuation_model.json";
pub const METADATA_FILE_NAME: &str = "training_metadata.json";

pub struct FileModelStore {
    dir: PathBuf,
}

impl FileModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE_NAME)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE_NAME)
    }

    fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, content)
            .with_context(|| format!("Failed to write temp file {:?}", temp_path))?;
        fs::rename(&temp_path, path)
            .with_context(|| format!("Failed to rename temp file to {:?}", path))?;
        Ok(())
    }

    fn save_files(&self, artifact: &[u8], metadata: &ModelMetadata) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).context("Failed to create model directory")?;
        }
        let metadata_json =
            serde_json::to_vec_pretty(metadata).context("Failed to serialize training metadata")?;

        Self::write_atomic(&self.model_path(), artifact)?;
        Self::write_atomic(&self.metadata_path(), &metadata_json)?;
        Ok(())
    }

    fn load_files(&self) -> Result<StoredModel> {
        let artifact = fs::read(self.model_path()).context("Failed to read model file")?;
        let metadata_json = fs::read(self.metadata_path()).context("Failed to read metadata file")?;
        let metadata: ModelMetadata = serde_json::from_slice(&metadata_json)
            .context("Failed to parse training metadata JSON")?;
        Ok(StoredModel { artifact, metadata })
    }
}

impl ModelStore for FileModelStore {
    fn save(&self, artifact: &[u8], metadata: &ModelMetadata) -> Result<(), ValuationError> {
        self.save_files(artifact, metadata)?;
        info!(
            "Saved model ({} bytes) and metadata to {:?}",
            artifact.len(),
            self.dir
        );
        Ok(())
    }

    fn load(&self) -> Result<StoredModel, ValuationError> {
        if !self.model_path().exists() || !self.metadata_path().exists() {
            return Err(ValuationError::ModelNotFound {
                path: self.model_path().display().to_string(),
            });
        }
        let stored = self.load_files()?;
        info!("Loaded model from {:?}", self.model_path());
        Ok(stored)
    }

    fn location(&self) -> String {
        self.dir.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ErrorKind;
    use crate::domain::ml::feature_registry::FEATURE_NAMES;
    use crate::domain::ml::model::{BoostingParameters, DroppedRecords, ModelMetrics};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn create_test_dir() -> PathBuf {
        let unique_id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!(
            "propval_test_{}_{}_{}_models",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0),
            unique_id
        ))
    }

    fn cleanup_test_dir(temp_dir: PathBuf) {
        fs::remove_dir_all(temp_dir).ok();
    }

    fn metadata() -> ModelMetadata {
        let mut feature_importance = BTreeMap::new();
        feature_importance.insert("land_size_numeric".to_string(), 0.6);
        feature_importance.insert("beds".to_string(), 0.4);
        ModelMetadata {
            trained_at: Utc.with_ymd_and_hms(2024, 7, 1, 3, 0, 0).unwrap(),
            metrics: ModelMetrics {
                r2: 0.82,
                mae: 95_000.0,
                mape: 0.125,
                train_size: 160,
                test_size: 40,
            },
            feature_importance,
            feature_order: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            total_samples: 200,
            dropped: DroppedRecords {
                missing_price: 4,
                ..Default::default()
            },
            type_distribution: BTreeMap::new(),
            suburb_distribution: BTreeMap::new(),
            parameters: BoostingParameters::default(),
        }
    }

    #[test]
    fn test_load_before_training_is_model_not_found() {
        let dir = create_test_dir();
        let store = FileModelStore::new(&dir);
        let err = store.load().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelNotFound);
        cleanup_test_dir(dir);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = create_test_dir();
        let store = FileModelStore::new(&dir);

        store.save(b"{\"trees\":[]}", &metadata()).unwrap();
        assert!(store.model_path().exists());
        assert!(!store.model_path().with_extension("tmp").exists());

        let stored = store.load().unwrap();
        assert_eq!(stored.artifact, b"{\"trees\":[]}".to_vec());
        assert_eq!(stored.metadata, metadata());
        cleanup_test_dir(dir);
    }

    #[test]
    fn test_corrupt_metadata_is_storage_error() {
        let dir = create_test_dir();
        let store = FileModelStore::new(&dir);
        store.save(b"{}", &metadata()).unwrap();
        fs::write(store.metadata_path(), "not json").unwrap();

        let err = store.load().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
        cleanup_test_dir(dir);
    }
}
