//! One-hot encoding of categorical columns

use crate::error::{MlError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What to do with a category that was not seen during fit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandleUnknown {
    /// Fail the transform
    #[default]
    Error,
    /// Encode the value as all zeros
    Ignore,
}

/// Learned categories of one input column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ColumnCategories {
    column: String,
    categories: Vec<String>,
}

/// One-hot encoder.
///
/// Each input column is replaced by one `Float64` indicator column per
/// category, named `<column>_<category>`. Categories are the sorted distinct
/// values seen during fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneHotEncoder {
    handle_unknown: HandleUnknown,
    categories: Vec<ColumnCategories>,
    is_fitted: bool,
}

impl Default for OneHotEncoder {
    fn default() -> Self {
        Self::new(HandleUnknown::default())
    }
}

impl OneHotEncoder {
    /// Create a new encoder
    pub fn new(handle_unknown: HandleUnknown) -> Self {
        Self {
            handle_unknown,
            categories: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn handle_unknown(&self) -> HandleUnknown {
        self.handle_unknown
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Fit the encoder to the data
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        let mut learned = Vec::with_capacity(columns.len());

        for col_name in columns {
            let values = Self::string_column(df, col_name)?;
            let distinct: BTreeSet<String> = values
                .str()?
                .into_iter()
                .flatten()
                .map(|s| s.to_string())
                .collect();

            if distinct.is_empty() {
                return Err(MlError::PreprocessingError(format!(
                    "column '{}' has no categories to encode",
                    col_name
                )));
            }

            learned.push(ColumnCategories {
                column: col_name.to_string(),
                categories: distinct.into_iter().collect(),
            });
        }

        self.categories = learned;
        self.is_fitted = true;
        Ok(self)
    }

    /// Encode the fitted columns. The result holds only the indicator
    /// columns, in fit order.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(MlError::ModelNotFitted);
        }

        let mut encoded: Vec<Column> = Vec::new();

        for learned in &self.categories {
            let values = Self::string_column(df, &learned.column)?;
            let values = values.str()?;

            let mut indicators: Vec<Vec<f64>> =
                vec![Vec::with_capacity(values.len()); learned.categories.len()];

            for value in values.into_iter() {
                let position = value.and_then(|v| {
                    learned
                        .categories
                        .binary_search_by(|c| c.as_str().cmp(v))
                        .ok()
                });

                if position.is_none() && self.handle_unknown == HandleUnknown::Error {
                    return Err(MlError::PreprocessingError(format!(
                        "found unknown category {:?} in column '{}' during transform",
                        value.unwrap_or("<missing>"),
                        learned.column
                    )));
                }

                for (k, column) in indicators.iter_mut().enumerate() {
                    column.push(if position == Some(k) { 1.0 } else { 0.0 });
                }
            }

            for (category, values) in learned.categories.iter().zip(indicators) {
                let name = format!("{}_{}", learned.column, category);
                encoded.push(Column::new(name.into(), values));
            }
        }

        Ok(DataFrame::new(encoded)?)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Indicator column names produced by `transform`
    pub fn get_feature_names_out(&self) -> Vec<String> {
        self.categories
            .iter()
            .flat_map(|learned| {
                learned
                    .categories
                    .iter()
                    .map(move |c| format!("{}_{}", learned.column, c))
            })
            .collect()
    }

    /// Categories learned for `column`
    pub fn categories(&self, column: &str) -> Option<&[String]> {
        self.categories
            .iter()
            .find(|learned| learned.column == column)
            .map(|learned| learned.categories.as_slice())
    }

    fn string_column(df: &DataFrame, name: &str) -> Result<Series> {
        let column = df
            .column(name)
            .map_err(|_| MlError::FeatureNotFound(name.to_string()))?;
        Ok(column.as_materialized_series().cast(&DataType::String)?)
    }
}
