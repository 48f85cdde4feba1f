//! Prediction pipeline: serve single-row predictions from the persisted
//! preprocessor and regressor.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::artifacts::ArtifactStore;
use crate::error::{Diagnose, MlError, PipelineResult};
use crate::preprocessing::ColumnTransformer;
use crate::training::{Estimator, Regressor};
use crate::utils::columns_to_array2;

/// Fitted artifacts loaded once and reused for every prediction
#[derive(Debug, Clone)]
pub struct PredictPipeline {
    preprocessor: ColumnTransformer,
    model: Estimator,
}

impl PredictPipeline {
    /// Load the artifacts from the default store
    pub fn new() -> PipelineResult<Self> {
        Self::from_store(&ArtifactStore::default())
    }

    pub fn from_store(store: &ArtifactStore) -> PipelineResult<Self> {
        Self::load(&store.preprocessor_path(), &store.regressor_path())
    }

    /// Fails if either artifact is missing or unreadable
    pub fn load(preprocessor_path: &Path, model_path: &Path) -> PipelineResult<Self> {
        let preprocessor = ColumnTransformer::load(preprocessor_path).diagnose()?;
        let model = Estimator::load(model_path).diagnose()?;
        debug!(model = model.name(), "Loaded prediction artifacts");
        Ok(Self { preprocessor, model })
    }

    pub fn model(&self) -> &Estimator {
        &self.model
    }

    /// Predict the label of a one-row feature table, truncated toward zero
    pub fn predict(&self, features: &DataFrame) -> PipelineResult<i64> {
        if features.height() != 1 {
            return Err(MlError::InvalidInput(format!(
                "expected exactly one feature row, got {}",
                features.height()
            )))
            .diagnose();
        }

        let transformed = self.preprocessor.transform(features).diagnose()?;
        let names = self.preprocessor.get_feature_names_out().diagnose()?;
        let x = columns_to_array2(&transformed, names).diagnose()?;
        let prediction = self.model.predict(&x).diagnose()?[0];

        if !prediction.is_finite() {
            return Err(MlError::ComputationError(format!(
                "model produced a non-finite prediction: {}",
                prediction
            )))
            .diagnose();
        }
        Ok(prediction.trunc() as i64)
    }
}

/// The seven inputs of one prediction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomData {
    pub gender: String,
    pub race_ethnicity: String,
    pub parental_level_of_education: String,
    pub lunch: String,
    pub test_preparation_course: String,
    pub reading_score: f64,
    pub writing_score: f64,
}

impl CustomData {
    pub fn new(
        gender: impl Into<String>,
        race_ethnicity: impl Into<String>,
        parental_level_of_education: impl Into<String>,
        lunch: impl Into<String>,
        test_preparation_course: impl Into<String>,
        reading_score: f64,
        writing_score: f64,
    ) -> Self {
        Self {
            gender: gender.into(),
            race_ethnicity: race_ethnicity.into(),
            parental_level_of_education: parental_level_of_education.into(),
            lunch: lunch.into(),
            test_preparation_course: test_preparation_course.into(),
            reading_score,
            writing_score,
        }
    }

    /// One-row table shaped like the raw dataset without its label
    pub fn get_data_as_df(&self) -> PipelineResult<DataFrame> {
        df!(
            "gender" => [self.gender.as_str()],
            "race_ethnicity" => [self.race_ethnicity.as_str()],
            "parental_level_of_education" => [self.parental_level_of_education.as_str()],
            "lunch" => [self.lunch.as_str()],
            "test_preparation_course" => [self.test_preparation_course.as_str()],
            "reading_score" => [self.reading_score],
            "writing_score" => [self.writing_score]
        )
        .diagnose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::feature_columns;

    fn sample() -> CustomData {
        CustomData::new(
            "female",
            "group B",
            "bachelor's degree",
            "standard",
            "none",
            72.0,
            74.0,
        )
    }

    #[test]
    fn test_custom_data_layout() {
        let df = sample().get_data_as_df().unwrap();
        assert_eq!(df.height(), 1);

        let columns: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(columns, feature_columns());
    }

    #[test]
    fn test_missing_artifacts_fail_construction() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path());
        assert!(PredictPipeline::from_store(&store).is_err());
    }
}
