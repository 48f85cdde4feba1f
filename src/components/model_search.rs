//! Model search stage: randomized hyperparameter search over every registry
//! entry, then persistence of the chosen model, its search record and a
//! comparison table.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::artifacts::{ensure_parent_dir, ArtifactStore};
use crate::error::{Diagnose, MlError, PipelineResult, Result};
use crate::optimizer::{RandomizedSearch, SearchOutcome, SearchResults};
use crate::training::{Estimator, EstimatorRegistry, Regressor};
use crate::utils::{split_features_label, DataLoader};

/// Which searched estimator ends up in the artifact store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistPolicy {
    /// The refitted winner of the last registry entry searched, whatever its score
    #[default]
    LastSearched,
    /// The refitted winner of the registry entry with the highest validation score
    BestValidation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSearchConfig {
    pub regressor_path: PathBuf,
    pub metrics_path: PathBuf,
    pub search_results_path: PathBuf,
    /// Seed of candidate sampling
    pub random_state: u64,
    pub persist_policy: PersistPolicy,
}

impl Default for ModelSearchConfig {
    fn default() -> Self {
        Self::from_store(&ArtifactStore::default())
    }
}

impl ModelSearchConfig {
    pub fn from_store(store: &ArtifactStore) -> Self {
        Self {
            regressor_path: store.regressor_path(),
            metrics_path: store.metrics_path(),
            search_results_path: store.search_results_path(),
            random_state: 42,
            persist_policy: PersistPolicy::default(),
        }
    }

    pub fn with_persist_policy(mut self, policy: PersistPolicy) -> Self {
        self.persist_policy = policy;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }
}

/// Validation and test score of one registry entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelScore {
    pub model: String,
    /// Best mean cross-validated R²
    pub validation_score: f64,
    /// R² of the refitted winner on the test partition
    pub test_score: f64,
}

/// Everything one search stage produced
#[derive(Debug, Clone)]
pub struct ModelSearchReport {
    /// One row per registry entry, in registry order
    pub scores: Vec<ModelScore>,
    /// Registry entry whose estimator was written to the store
    pub persisted_model: String,
    pub best_validation_score: f64,
}

#[derive(Serialize)]
struct SearchRecord<'a> {
    model: &'a str,
    #[serde(flatten)]
    results: &'a SearchResults,
}

/// Third pipeline stage
#[derive(Debug, Clone, Default)]
pub struct ModelSearch {
    config: ModelSearchConfig,
    registry: EstimatorRegistry,
}

impl ModelSearch {
    pub fn new(config: ModelSearchConfig) -> Self {
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

    pub fn config(&self) -> &ModelSearchConfig {
        &self.config
    }

    pub fn registry(&self) -> &EstimatorRegistry {
        &self.registry
    }

    /// Run the search and return the highest validation score observed
    pub fn initiate_model_search(
        &self,
        train_data: &DataFrame,
        test_data: &DataFrame,
        cv: usize,
        n_iter: usize,
    ) -> PipelineResult<f64> {
        self.search_models(train_data, test_data, cv, n_iter)
            .map(|report| report.best_validation_score)
    }

    /// Run the search and return the per-model comparison
    pub fn search_models(
        &self,
        train_data: &DataFrame,
        test_data: &DataFrame,
        cv: usize,
        n_iter: usize,
    ) -> PipelineResult<ModelSearchReport> {
        info!(
            models = self.registry.len(),
            cv,
            n_iter,
            "Starting model search"
        );
        if self.registry.is_empty() {
            return Err(MlError::ConfigError("estimator registry is empty".to_string())).diagnose();
        }

        let (x_train, y_train) = split_features_label(train_data).diagnose()?;
        let (x_test, y_test) = split_features_label(test_data).diagnose()?;

        let search = RandomizedSearch::new(n_iter, cv).with_random_state(self.config.random_state);
        let mut scores = Vec::with_capacity(self.registry.len());
        let mut persisted: Option<(String, SearchOutcome<Estimator>)> = None;

        for entry in &self.registry {
            info!(model = entry.name(), "Searching hyperparameters");
            let outcome = search
                .fit(entry.search_space(), |params| entry.build(params), &x_train, &y_train)
                .diagnose()?;
            let test_score = outcome.best_estimator.score(&x_test, &y_test).diagnose()?;
            let validation_score = outcome.results.best_score;
            info!(
                model = entry.name(),
                validation_score,
                test_score,
                "Finished model search"
            );

            scores.push(ModelScore {
                model: entry.name().to_string(),
                validation_score,
                test_score,
            });

            let replace = match (&persisted, self.config.persist_policy) {
                (None, _) | (Some(_), PersistPolicy::LastSearched) => true,
                (Some((_, kept)), PersistPolicy::BestValidation) => {
                    validation_score > kept.results.best_score
                }
            };
            if replace {
                persisted = Some((entry.name().to_string(), outcome));
            }
        }

        let best_validation_score = scores
            .iter()
            .map(|s| s.validation_score)
            .fold(f64::NEG_INFINITY, f64::max);

        let (persisted_model, outcome) = persisted
            .ok_or_else(|| MlError::TrainingError("no estimator was searched".to_string()))
            .diagnose()?;
        if self.config.persist_policy == PersistPolicy::LastSearched
            && outcome.results.best_score < best_validation_score
        {
            warn!(
                persisted = %persisted_model,
                "Persisting the last searched model, which is not the best by validation score"
            );
        }

        self.persist(&persisted_model, &outcome, &scores).diagnose()?;
        info!(
            persisted = %persisted_model,
            best_validation_score,
            "Model search completed"
        );

        Ok(ModelSearchReport {
            scores,
            persisted_model,
            best_validation_score,
        })
    }

    fn persist(
        &self,
        model: &str,
        outcome: &SearchOutcome<Estimator>,
        scores: &[ModelScore],
    ) -> Result<()> {
        for path in [
            &self.config.regressor_path,
            &self.config.metrics_path,
            &self.config.search_results_path,
        ] {
            ensure_parent_dir(path)?;
        }

        outcome.best_estimator.save(&self.config.regressor_path)?;
        info!(path = %self.config.regressor_path.display(), "Saved regressor");

        let writer = BufWriter::new(File::create(&self.config.search_results_path)?);
        serde_json::to_writer_pretty(
            writer,
            &SearchRecord {
                model,
                results: &outcome.results,
            },
        )?;
        info!(path = %self.config.search_results_path.display(), "Saved search results");

        let mut metrics = df!(
            "model" => scores.iter().map(|s| s.model.as_str()).collect::<Vec<_>>(),
            "validation_scores" => scores.iter().map(|s| s.validation_score).collect::<Vec<_>>(),
            "test_scores" => scores.iter().map(|s| s.test_score).collect::<Vec<_>>()
        )?;
        DataLoader::save_csv(&mut metrics, &self.config.metrics_path)?;
        info!(path = %self.config.metrics_path.display(), "Saved metrics");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn table(n: usize, offset: usize) -> DataFrame {
        let a: Vec<f64> = (0..n).map(|i| ((i + offset) % 7) as f64).collect();
        let b: Vec<f64> = (0..n).map(|i| ((i * 3 + offset) % 5) as f64).collect();
        let y: Vec<f64> = a.iter().zip(&b).map(|(a, b)| 2.0 * a - b + 5.0).collect();
        df!("a" => a, "b" => b, "math_score" => y).unwrap()
    }

    fn stage(temp: &TempDir, policy: PersistPolicy) -> ModelSearch {
        let registry = EstimatorRegistry::default_registry()
            .subset(&["Linear Regression", "Decision Tree"])
            .unwrap();
        ModelSearch::new(
            ModelSearchConfig::from_store(&ArtifactStore::new(temp.path()))
                .with_persist_policy(policy),
        )
        .with_registry(registry)
    }

    #[test]
    fn test_search_writes_artifacts() {
        let temp = TempDir::new().unwrap();
        let search = stage(&temp, PersistPolicy::LastSearched);

        let report = search
            .search_models(&table(40, 0), &table(10, 3), 3, 4)
            .unwrap();

        assert_eq!(report.scores.len(), 2);
        assert_eq!(report.persisted_model, "Decision Tree");
        for score in &report.scores {
            assert!(score.validation_score <= 1.0);
            assert!(score.test_score <= 1.0);
        }

        let metrics = DataLoader::load_csv(&search.config().metrics_path).unwrap();
        assert_eq!(metrics.height(), 2);
        let columns: Vec<String> = metrics
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(columns, vec!["model", "validation_scores", "test_scores"]);

        let estimator = Estimator::load(&search.config().regressor_path).unwrap();
        assert_eq!(estimator.name(), "Decision Tree");
        assert!(search.config().search_results_path.exists());
    }

    #[test]
    fn test_best_validation_policy_keeps_the_winner() {
        let temp = TempDir::new().unwrap();
        let search = stage(&temp, PersistPolicy::BestValidation);

        let report = search
            .search_models(&table(40, 0), &table(10, 3), 3, 4)
            .unwrap();

        // the label is an exact linear function of the features
        assert_eq!(report.persisted_model, "Linear Regression");
        assert!((report.best_validation_score - 1.0).abs() < 1e-9);
        let estimator = Estimator::load(&search.config().regressor_path).unwrap();
        assert_eq!(estimator.name(), "Linear Regression");
    }

    fn search_record(search: &ModelSearch) -> serde_json::Value {
        let json = std::fs::read_to_string(&search.config().search_results_path).unwrap();
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn test_search_record_follows_persist_policy() {
        let temp = TempDir::new().unwrap();
        let last = stage(&temp, PersistPolicy::LastSearched);
        last.search_models(&table(40, 0), &table(10, 3), 3, 4).unwrap();

        // the decision tree grid holds 120 points, so all 4 draws are distinct
        let record = search_record(&last);
        assert_eq!(record["model"], "Decision Tree");
        assert_eq!(record["candidates"].as_array().unwrap().len(), 4);
        let best_index = record["best_index"].as_u64().unwrap() as usize;
        assert_eq!(record["best_params"], record["candidates"][best_index]["params"]);

        let temp = TempDir::new().unwrap();
        let best = stage(&temp, PersistPolicy::BestValidation);
        best.search_models(&table(40, 0), &table(10, 3), 3, 4).unwrap();

        // fit_intercept has only two values, so its grid is exhausted
        let record = search_record(&best);
        assert_eq!(record["model"], "Linear Regression");
        assert_eq!(record["candidates"].as_array().unwrap().len(), 2);
        assert!((record["best_score"].as_f64().unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_registry_is_an_error() {
        let temp = TempDir::new().unwrap();
        let search = stage(&temp, PersistPolicy::LastSearched)
            .with_registry(EstimatorRegistry::new(Vec::new()));
        assert!(search
            .initiate_model_search(&table(20, 0), &table(5, 1), 3, 2)
            .is_err());
    }
}
