//! Single-model training path: one linear regression, fit and evaluated
//! without any search.

use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

use crate::artifacts::{ensure_parent_dir, ArtifactStore};
use crate::error::{Diagnose, MlError, PipelineResult};
use crate::training::{Estimator, LinearRegression, RegressionMetrics};
use crate::utils::{split_features_label, DataLoader};

/// Held-out R², RMSE and MAE of the trained model
pub type TrainingMetrics = RegressionMetrics;

/// Name written in the metrics table
const MODEL_NAME: &str = "Linear Regression";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTrainerConfig {
    pub regressor_path: PathBuf,
    pub metrics_path: PathBuf,
}

impl Default for ModelTrainerConfig {
    fn default() -> Self {
        Self::from_store(&ArtifactStore::default())
    }
}

impl ModelTrainerConfig {
    pub fn from_store(store: &ArtifactStore) -> Self {
        Self {
            regressor_path: store.regressor_path(),
            metrics_path: store.metrics_path(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelTrainer {
    config: ModelTrainerConfig,
    model: Option<LinearRegression>,
}

impl ModelTrainer {
    pub fn new(config: ModelTrainerConfig) -> Self {
        Self { config, model: None }
    }

    pub fn config(&self) -> &ModelTrainerConfig {
        &self.config
    }

    pub fn model(&self) -> Option<&LinearRegression> {
        self.model.as_ref()
    }

    pub fn train_model(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> PipelineResult<&mut Self> {
        let mut model = LinearRegression::new();
        model.fit(x, y).diagnose()?;
        self.model = Some(model);
        Ok(self)
    }

    /// Score the trained model; fails before [`ModelTrainer::train_model`]
    pub fn evaluate_model(&self, x: &Array2<f64>, y: &Array1<f64>) -> PipelineResult<TrainingMetrics> {
        let model = self.model.as_ref().ok_or(MlError::ModelNotFitted).diagnose()?;
        let y_pred = model.predict(x).diagnose()?;
        RegressionMetrics::compute(y, &y_pred).diagnose()
    }

    /// Train on `train_data`, evaluate on `test_data`, and persist the model
    /// with a one-row metrics table.
    pub fn train_and_evaluate_model(
        &mut self,
        train_data: &DataFrame,
        test_data: &DataFrame,
    ) -> PipelineResult<TrainingMetrics> {
        info!("Starting model training and evaluation");

        let (x_train, y_train) = split_features_label(train_data).diagnose()?;
        let (x_test, y_test) = split_features_label(test_data).diagnose()?;

        info!(rows = x_train.nrows(), features = x_train.ncols(), "Training model");
        self.train_model(&x_train, &y_train)?;

        let metrics = self.evaluate_model(&x_test, &y_test)?;
        info!(r2 = metrics.r2, rmse = metrics.rmse, mae = metrics.mae, "Evaluated model");

        let model = self.model.clone().ok_or(MlError::ModelNotFitted).diagnose()?;
        Estimator::from(model).save(&self.config.regressor_path).diagnose()?;
        info!(path = %self.config.regressor_path.display(), "Saved model");

        let mut table = df!(
            "model" => [MODEL_NAME],
            "R2" => [metrics.r2],
            "RMSE" => [metrics.rmse],
            "MAE" => [metrics.mae]
        )
        .diagnose()?;
        ensure_parent_dir(&self.config.metrics_path).diagnose()?;
        DataLoader::save_csv(&mut table, &self.config.metrics_path).diagnose()?;
        info!(path = %self.config.metrics_path.display(), "Saved metrics");

        info!("Model training and evaluation completed");
        Ok(metrics)
    }
}
