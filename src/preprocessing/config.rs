//! Preprocessing configuration

use super::{HandleUnknown, ImputeStrategy, ScalerType};
use crate::schema::{CATEGORICAL_FEATURES, NUMERIC_FEATURES};
use serde::{Deserialize, Serialize};

/// Configuration for the column transformer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Columns routed through the numeric pipeline
    pub numeric_columns: Vec<String>,

    /// Columns routed through the categorical pipeline
    pub categorical_columns: Vec<String>,

    /// Strategy for handling missing numeric values
    pub numeric_impute_strategy: ImputeStrategy,

    /// Strategy for handling missing categorical values
    pub categorical_impute_strategy: ImputeStrategy,

    /// Type of scaler to use for numeric features
    pub scaler_type: ScalerType,

    /// Treatment of categories unseen during fit
    pub handle_unknown: HandleUnknown,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            numeric_columns: NUMERIC_FEATURES.iter().map(|s| s.to_string()).collect(),
            categorical_columns: CATEGORICAL_FEATURES.iter().map(|s| s.to_string()).collect(),
            numeric_impute_strategy: ImputeStrategy::Median,
            categorical_impute_strategy: ImputeStrategy::MostFrequent,
            scaler_type: ScalerType::Standard,
            handle_unknown: HandleUnknown::Error,
        }
    }
}

impl PreprocessingConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the numeric columns
    pub fn with_numeric_columns<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.numeric_columns = columns.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    /// Builder method to set the categorical columns
    pub fn with_categorical_columns<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.categorical_columns = columns.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    /// Builder method to set numeric impute strategy
    pub fn with_numeric_impute(mut self, strategy: ImputeStrategy) -> Self {
        self.numeric_impute_strategy = strategy;
        self
    }

    /// Builder method to set categorical impute strategy
    pub fn with_categorical_impute(mut self, strategy: ImputeStrategy) -> Self {
        self.categorical_impute_strategy = strategy;
        self
    }

    /// Builder method to set scaler type
    pub fn with_scaler(mut self, scaler_type: ScalerType) -> Self {
        self.scaler_type = scaler_type;
        self
    }

    /// Builder method to set unknown-category handling
    pub fn with_handle_unknown(mut self, handle_unknown: HandleUnknown) -> Self {
        self.handle_unknown = handle_unknown;
        self
    }

    /// Every input column the transformer reads
    pub fn input_columns(&self) -> Vec<&str> {
        self.numeric_columns
            .iter()
            .chain(self.categorical_columns.iter())
            .map(|s| s.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PreprocessingConfig::default();
        assert_eq!(config.numeric_columns, vec!["reading_score", "writing_score"]);
        assert_eq!(config.categorical_columns.len(), 5);
        assert_eq!(config.numeric_impute_strategy, ImputeStrategy::Median);
        assert_eq!(config.handle_unknown, HandleUnknown::Error);
    }

    #[test]
    fn test_builder_pattern() {
        let config = PreprocessingConfig::new()
            .with_numeric_columns(&["x"])
            .with_categorical_columns(&["c"])
            .with_scaler(ScalerType::MinMax)
            .with_handle_unknown(HandleUnknown::Ignore);

        assert_eq!(config.input_columns(), vec!["x", "c"]);
        assert!(matches!(config.scaler_type, ScalerType::MinMax));
        assert_eq!(config.handle_unknown, HandleUnknown::Ignore);
    }
}
