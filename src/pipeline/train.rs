//! Training pipeline: ingestion, transformation, then model search

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

use crate::artifacts::{ArtifactStore, DEFAULT_SOURCE_PATH};
use crate::components::{
    DataIngestion, DataIngestionConfig, DataTransformation, DataTransformationConfig, ModelSearch,
    ModelSearchConfig, ModelTrainer, ModelTrainerConfig, PersistPolicy, TrainingMetrics,
};
use crate::error::PipelineResult;
use crate::training::EstimatorRegistry;

/// Per-stage configuration of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub ingestion: DataIngestionConfig,
    pub transformation: DataTransformationConfig,
    pub model_search: ModelSearchConfig,
    pub model_trainer: ModelTrainerConfig,
    /// Cross-validation folds of the model search
    pub cv: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::in_dir(crate::artifacts::DEFAULT_ARTIFACT_DIR, DEFAULT_SOURCE_PATH)
    }
}

impl PipelineConfig {
    /// Read `source` and keep every artifact under `root`
    pub fn in_dir(root: impl Into<PathBuf>, source: impl Into<PathBuf>) -> Self {
        let store = ArtifactStore::new(root);
        Self {
            ingestion: DataIngestionConfig::from_store(&store, source),
            transformation: DataTransformationConfig::from_store(&store),
            model_search: ModelSearchConfig::from_store(&store),
            model_trainer: ModelTrainerConfig::from_store(&store),
            cv: 5,
        }
    }

    pub fn with_cv(mut self, cv: usize) -> Self {
        self.cv = cv;
        self
    }

    pub fn with_persist_policy(mut self, policy: PersistPolicy) -> Self {
        self.model_search.persist_policy = policy;
        self
    }
}

/// Runs the stages in order; the first failure aborts the run
#[derive(Debug, Clone, Default)]
pub struct TrainingPipeline {
    config: PipelineConfig,
    registry: EstimatorRegistry,
}

impl TrainingPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            registry: EstimatorRegistry::default_registry(),
        }
    }

    /// Search only the given registry
    pub fn with_registry(mut self, registry: EstimatorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Ingest, transform, and search with `n_iter` candidates per model.
    /// Returns the best validation score.
    pub fn initiate_model_training(&self, n_iter: usize) -> PipelineResult<f64> {
        let (train_path, test_path) =
            DataIngestion::new(self.config.ingestion.clone()).initiate_ingestion()?;

        let (train_arr, test_arr) = DataTransformation::new(self.config.transformation.clone())
            .initiate_transformation(&train_path, &test_path)?;

        let best_score = ModelSearch::new(self.config.model_search.clone())
            .with_registry(self.registry.clone())
            .initiate_model_search(&train_arr, &test_arr, self.config.cv, n_iter)?;

        info!(best_score, "Training pipeline finished");
        Ok(best_score)
    }

    /// Ingest, transform, and fit the single linear model
    pub fn initiate_linear_training(&self) -> PipelineResult<TrainingMetrics> {
        let (train_path, test_path) =
            DataIngestion::new(self.config.ingestion.clone()).initiate_ingestion()?;

        let (train_arr, test_arr) = DataTransformation::new(self.config.transformation.clone())
            .initiate_transformation(&train_path, &test_path)?;

        let metrics = ModelTrainer::new(self.config.model_trainer.clone())
            .train_and_evaluate_model(&train_arr, &test_arr)?;

        info!(r2 = metrics.r2, "Linear training pipeline finished");
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_dir_relocates_every_artifact() {
        let config = PipelineConfig::in_dir("/tmp/run", "data/stud.csv");
        assert_eq!(config.ingestion.source_path, PathBuf::from("data/stud.csv"));
        assert_eq!(
            config.ingestion.train_data_path,
            PathBuf::from("/tmp/run/train_data.csv")
        );
        assert_eq!(
            config.transformation.preprocessor_path,
            PathBuf::from("/tmp/run/preprocessor.json")
        );
        assert_eq!(
            config.model_search.search_results_path,
            PathBuf::from("/tmp/run/search_results.json")
        );
        assert_eq!(config.model_trainer.metrics_path, PathBuf::from("/tmp/run/metrics.csv"));
        assert_eq!(config.cv, 5);
    }

    #[test]
    fn test_default_paths() {
        let config = PipelineConfig::default();
        assert_eq!(
            config.ingestion.source_path,
            PathBuf::from("notebook/data/stud.csv")
        );
        assert_eq!(
            config.model_search.regressor_path,
            PathBuf::from("artifacts/regressor.json")
        );
        assert_eq!(config.model_search.persist_policy, PersistPolicy::LastSearched);
    }

    #[test]
    fn test_missing_dataset_aborts_the_run() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = PipelineConfig::in_dir(temp.path(), temp.path().join("absent.csv"));
        let pipeline = TrainingPipeline::new(config);

        assert!(pipeline.initiate_model_training(2).is_err());
        assert!(!temp.path().join("train_data.csv").exists());
    }
}
