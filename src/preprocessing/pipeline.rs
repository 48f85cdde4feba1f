//! Column transformer: per-column-group preprocessing pipelines

use super::{
    config::PreprocessingConfig, encoder::OneHotEncoder, imputer::Imputer, scaler::Scaler,
};
use crate::error::{MlError, Result};
use crate::schema::{CATEGORICAL_PIPELINE, NUMERIC_PIPELINE};
use crate::utils::require_columns;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::debug;

/// Composite preprocessor.
///
/// Numeric columns go through imputation then scaling, categorical columns
/// through imputation then one-hot encoding. Outputs are concatenated numeric
/// first, with every column prefixed by the name of the pipeline that made it
/// (`numerical_pipeline__reading_score`, `categorical_pipeline__gender_female`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnTransformer {
    config: PreprocessingConfig,
    numeric_imputer: Imputer,
    scaler: Scaler,
    categorical_imputer: Imputer,
    encoder: OneHotEncoder,
    feature_names_out: Vec<String>,
    is_fitted: bool,
}

impl Default for ColumnTransformer {
    fn default() -> Self {
        Self::new(PreprocessingConfig::default())
    }
}

impl ColumnTransformer {
    /// Create an unfitted transformer
    pub fn new(config: PreprocessingConfig) -> Self {
        Self {
            numeric_imputer: Imputer::new(config.numeric_impute_strategy.clone()),
            scaler: Scaler::new(config.scaler_type.clone()),
            categorical_imputer: Imputer::new(config.categorical_impute_strategy.clone()),
            encoder: OneHotEncoder::new(config.handle_unknown),
            config,
            feature_names_out: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Fit every pipeline on `df`. Columns not named in the config are ignored.
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        let start = Instant::now();
        require_columns(df, &self.config.input_columns())?;
        if df.height() == 0 {
            return Err(MlError::PreprocessingError(
                "cannot fit preprocessor on an empty table".to_string(),
            ));
        }

        // only the config field is borrowed while the fitted parts are updated
        let numeric: Vec<&str> = self.config.numeric_columns.iter().map(String::as_str).collect();
        if !numeric.is_empty() {
            let imputed = self.numeric_imputer.fit_transform(df, &numeric)?;
            self.scaler.fit(&imputed, &numeric)?;
        }

        let categorical: Vec<&str> = self
            .config
            .categorical_columns
            .iter()
            .map(String::as_str)
            .collect();
        if !categorical.is_empty() {
            let imputed = self.categorical_imputer.fit_transform(df, &categorical)?;
            self.encoder.fit(&imputed, &categorical)?;
        }

        let mut names: Vec<String> = numeric
            .iter()
            .map(|c| format!("{}__{}", NUMERIC_PIPELINE, c))
            .collect();
        names.extend(
            self.encoder
                .get_feature_names_out()
                .into_iter()
                .map(|c| format!("{}__{}", CATEGORICAL_PIPELINE, c)),
        );

        self.feature_names_out = names;
        self.is_fitted = true;

        debug!(
            features_out = self.feature_names_out.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fitted column transformer"
        );
        Ok(self)
    }

    /// Apply the fitted pipelines. Never changes the fitted state.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(MlError::ModelNotFitted);
        }
        require_columns(df, &self.config.input_columns())?;

        let mut columns: Vec<Column> = Vec::with_capacity(self.feature_names_out.len());

        let numeric = self.numeric_columns();
        if !numeric.is_empty() {
            let selected = df.select(numeric.iter().copied())?;
            let imputed = self.numeric_imputer.transform(&selected)?;
            let scaled = self.scaler.transform(&imputed)?;
            for name in &numeric {
                let column = scaled.column(name)?.cast(&DataType::Float64)?;
                columns.push(column.with_name(format!("{}__{}", NUMERIC_PIPELINE, name).into()));
            }
        }

        let categorical = self.categorical_columns();
        if !categorical.is_empty() {
            let selected = df.select(categorical.iter().copied())?;
            let imputed = self.categorical_imputer.transform(&selected)?;
            let encoded = self.encoder.transform(&imputed)?;
            for column in encoded.get_columns() {
                let name = format!("{}__{}", CATEGORICAL_PIPELINE, column.name());
                columns.push(column.clone().with_name(name.into()));
            }
        }

        Ok(DataFrame::new(columns)?)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<DataFrame> {
        self.fit(df)?;
        self.transform(df)
    }

    /// Names of the columns produced by `transform`
    pub fn get_feature_names_out(&self) -> Result<&[String]> {
        if !self.is_fitted {
            return Err(MlError::ModelNotFitted);
        }
        Ok(&self.feature_names_out)
    }

    /// Save the transformer as JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a transformer from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let transformer: Self = serde_json::from_str(&json)?;
        Ok(transformer)
    }

    fn numeric_columns(&self) -> Vec<&str> {
        self.config.numeric_columns.iter().map(|s| s.as_str()).collect()
    }

    fn categorical_columns(&self) -> Vec<&str> {
        self.config.categorical_columns.iter().map(|s| s.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::HandleUnknown;
    use tempfile::TempDir;

    fn config() -> PreprocessingConfig {
        PreprocessingConfig::new()
            .with_numeric_columns(&["score"])
            .with_categorical_columns(&["group"])
    }

    fn train_df() -> DataFrame {
        df!(
            "group" => &[Some("b"), Some("a"), None, Some("b")],
            "score" => &[Some(1.0), None, Some(3.0), Some(5.0)],
            "label" => &[1.0, 2.0, 3.0, 4.0]
        )
        .unwrap()
    }

    #[test]
    fn test_output_schema() {
        let mut transformer = ColumnTransformer::new(config());
        let out = transformer.fit_transform(&train_df()).unwrap();

        let names: Vec<String> = out
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "numerical_pipeline__score",
                "categorical_pipeline__group_a",
                "categorical_pipeline__group_b",
            ]
        );
        assert_eq!(transformer.get_feature_names_out().unwrap(), names.as_slice());
        assert_eq!(out.height(), 4);
    }

    #[test]
    fn test_imputation_runs_before_encoding() {
        let mut transformer = ColumnTransformer::new(config());
        let out = transformer.fit_transform(&train_df()).unwrap();

        // the missing group is imputed with the most frequent value "b"
        let b = out.column("categorical_pipeline__group_b").unwrap().f64().unwrap();
        assert_eq!(b.get(2), Some(1.0));

        // the missing score is imputed with the median 3.0, which is also the mean
        let score = out.column("numerical_pipeline__score").unwrap().f64().unwrap();
        assert!(score.get(1).unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_transform_is_repeatable() {
        let mut transformer = ColumnTransformer::new(config());
        transformer.fit(&train_df()).unwrap();

        let first = transformer.transform(&train_df()).unwrap();
        let second = transformer.transform(&train_df()).unwrap();
        assert!(first.equals(&second));
    }

    #[test]
    fn test_refit_replaces_learned_state() {
        let mut transformer = ColumnTransformer::new(config());
        transformer.fit(&train_df()).unwrap();

        let other = df!(
            "group" => &["c", "a"],
            "score" => &[10.0, 20.0]
        )
        .unwrap();
        transformer.fit(&other).unwrap();

        assert!(transformer.is_fitted());
        assert_eq!(
            transformer.get_feature_names_out().unwrap(),
            &[
                "numerical_pipeline__score".to_string(),
                "categorical_pipeline__group_a".to_string(),
                "categorical_pipeline__group_c".to_string(),
            ]
        );
        let out = transformer.transform(&other).unwrap();
        let score = out.column("numerical_pipeline__score").unwrap().f64().unwrap();
        assert!((score.get(0).unwrap() + 1.0).abs() < 1e-12);
        assert!((score.get(1).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_unfitted_transform_fails() {
        let transformer = ColumnTransformer::new(config());
        assert!(matches!(
            transformer.transform(&train_df()),
            Err(MlError::ModelNotFitted)
        ));
        assert!(transformer.get_feature_names_out().is_err());
    }

    #[test]
    fn test_missing_input_column() {
        let mut transformer = ColumnTransformer::new(config());
        let df = df!("score" => &[1.0, 2.0]).unwrap();
        assert!(matches!(
            transformer.fit(&df),
            Err(MlError::FeatureNotFound(name)) if name == "group"
        ));
    }

    #[test]
    fn test_handle_unknown_is_carried_into_encoder() {
        let mut transformer =
            ColumnTransformer::new(config().with_handle_unknown(HandleUnknown::Ignore));
        transformer.fit(&train_df()).unwrap();

        let unseen = df!("group" => &["z"], "score" => &[2.0]).unwrap();
        let out = transformer.transform(&unseen).unwrap();
        assert_eq!(out.column("categorical_pipeline__group_a").unwrap().f64().unwrap().get(0), Some(0.0));
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("preprocessor.json");

        let mut transformer = ColumnTransformer::new(config());
        let expected = transformer.fit_transform(&train_df()).unwrap();
        transformer.save(&path).unwrap();

        let restored = ColumnTransformer::load(&path).unwrap();
        let actual = restored.transform(&train_df()).unwrap();
        assert!(expected.equals(&actual));
    }
}
