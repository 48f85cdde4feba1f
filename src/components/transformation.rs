//! Data transformation stage: fit the column transformer on the training
//! features and apply it to both partitions.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::artifacts::{ensure_parent_dir, ArtifactStore};
use crate::error::{Diagnose, PipelineResult, Result};
use crate::preprocessing::{ColumnTransformer, PreprocessingConfig};
use crate::schema::LABEL;
use crate::utils::{require_columns, DataLoader};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTransformationConfig {
    pub preprocessor_path: PathBuf,
    pub preprocessing: PreprocessingConfig,
}

impl Default for DataTransformationConfig {
    fn default() -> Self {
        Self::from_store(&ArtifactStore::default())
    }
}

impl DataTransformationConfig {
    pub fn from_store(store: &ArtifactStore) -> Self {
        Self {
            preprocessor_path: store.preprocessor_path(),
            preprocessing: PreprocessingConfig::default(),
        }
    }

    pub fn with_preprocessing(mut self, preprocessing: PreprocessingConfig) -> Self {
        self.preprocessing = preprocessing;
        self
    }
}

/// Second pipeline stage
#[derive(Debug, Clone, Default)]
pub struct DataTransformation {
    config: DataTransformationConfig,
}

/// Split a partition into its feature table and its label as `Float64`
fn separate_label(df: &DataFrame) -> Result<(DataFrame, Column)> {
    require_columns(df, &[LABEL])?;
    let label = df.column(LABEL)?.cast(&DataType::Float64)?;
    Ok((df.drop(LABEL)?, label))
}

impl DataTransformation {
    pub fn new(config: DataTransformationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DataTransformationConfig {
        &self.config
    }

    /// Unfitted preprocessor: median imputation and standard scaling for the
    /// numeric columns, most-frequent imputation and one-hot encoding for the
    /// categorical ones.
    pub fn instantiate_preprocessor(&self) -> ColumnTransformer {
        ColumnTransformer::new(self.config.preprocessing.clone())
    }

    /// Fit the preprocessor on the training features, transform both
    /// partitions, append the label as the last column, and persist the
    /// fitted preprocessor.
    pub fn initiate_transformation(
        &self,
        train_path: &Path,
        test_path: &Path,
    ) -> PipelineResult<(DataFrame, DataFrame)> {
        info!("Starting data transformation");

        let train_df = DataLoader::load_csv(train_path).diagnose()?;
        let test_df = DataLoader::load_csv(test_path).diagnose()?;
        info!(
            train_rows = train_df.height(),
            test_rows = test_df.height(),
            "Read train and test data"
        );

        let (train_features, train_label) = separate_label(&train_df).diagnose()?;
        let (test_features, test_label) = separate_label(&test_df).diagnose()?;

        let mut preprocessor = self.instantiate_preprocessor();
        preprocessor.fit(&train_features).diagnose()?;
        info!(
            features_out = preprocessor.get_feature_names_out().map_or(0, |n| n.len()),
            "Fitted preprocessor on training features"
        );

        let mut train_arr = preprocessor.transform(&train_features).diagnose()?;
        let mut test_arr = preprocessor.transform(&test_features).diagnose()?;
        train_arr.with_column(train_label).diagnose()?;
        test_arr.with_column(test_label).diagnose()?;
        info!("Transformed train and test features");

        ensure_parent_dir(&self.config.preprocessor_path).diagnose()?;
        preprocessor.save(&self.config.preprocessor_path).diagnose()?;
        info!(path = %self.config.preprocessor_path.display(), "Saved preprocessor");

        Ok((train_arr, test_arr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn partition(genders: &[&str], reading: &[f64], math: &[i64]) -> DataFrame {
        let n = genders.len();
        df!(
            "gender" => genders,
            "race_ethnicity" => vec!["group A"; n],
            "parental_level_of_education" => vec!["high school"; n],
            "lunch" => vec!["standard"; n],
            "test_preparation_course" => vec!["none"; n],
            "reading_score" => reading,
            "writing_score" => reading,
            "math_score" => math
        )
        .unwrap()
    }

    #[test]
    fn test_transformation_layout() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path());
        let train_path = temp.path().join("train.csv");
        let test_path = temp.path().join("test.csv");

        let mut train = partition(&["female", "male", "female"], &[60.0, 70.0, 80.0], &[55, 65, 75]);
        let mut test = partition(&["male"], &[65.0], &[60]);
        DataLoader::save_csv(&mut train, &train_path).unwrap();
        DataLoader::save_csv(&mut test, &test_path).unwrap();

        let stage = DataTransformation::new(DataTransformationConfig::from_store(&store));
        let (train_arr, test_arr) = stage.initiate_transformation(&train_path, &test_path).unwrap();

        assert_eq!(train_arr.get_column_names(), test_arr.get_column_names());
        let names: Vec<String> = train_arr
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names.first().unwrap(), "numerical_pipeline__reading_score");
        assert!(names.contains(&"categorical_pipeline__gender_female".to_string()));
        assert_eq!(names.last().unwrap(), LABEL);
        assert_eq!(train_arr.column(LABEL).unwrap().dtype(), &DataType::Float64);
        assert!(store.preprocessor_path().exists());
    }

    #[test]
    fn test_missing_label_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("train.csv");
        let mut df = partition(&["female", "male"], &[1.0, 2.0], &[1, 2]).drop(LABEL).unwrap();
        DataLoader::save_csv(&mut df, &path).unwrap();

        let stage = DataTransformation::new(DataTransformationConfig::from_store(
            &ArtifactStore::new(temp.path()),
        ));
        assert!(stage.initiate_transformation(&path, &path).is_err());
    }

    #[test]
    fn test_instantiated_preprocessor_is_unfitted() {
        let stage = DataTransformation::default();
        assert!(!stage.instantiate_preprocessor().is_fitted());
    }
}
