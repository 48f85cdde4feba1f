//! Missing value imputation strategies

use crate::error::{MlError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Strategy for imputing missing values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImputeStrategy {
    /// Replace with mean (numeric only)
    Mean,
    /// Replace with median (numeric only)
    Median,
    /// Replace with mode / most frequent value
    MostFrequent,
    /// Replace with a constant value
    Constant(f64),
    /// Replace with a constant string (categorical)
    ConstantString(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum ImputeValue {
    Numeric(f64),
    String(String),
}

/// Imputer for handling missing values.
///
/// Numeric columns are cast to `Float64` on transform; string columns stay
/// strings. Fill values are learned per column during `fit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Imputer {
    strategy: ImputeStrategy,
    fill_values: HashMap<String, ImputeValue>,
    is_fitted: bool,
}

impl Imputer {
    /// Create a new imputer with the specified strategy
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self {
            strategy,
            fill_values: HashMap::new(),
            is_fitted: false,
        }
    }

    pub fn strategy(&self) -> &ImputeStrategy {
        &self.strategy
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Fit the imputer to the data
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        let mut fill_values = HashMap::with_capacity(columns.len());

        for col_name in columns {
            let column = df
                .column(col_name)
                .map_err(|_| MlError::FeatureNotFound(col_name.to_string()))?;

            let fill_value = self.compute_fill_value(col_name, column.as_materialized_series())?;
            fill_values.insert(col_name.to_string(), fill_value);
        }

        self.fill_values = fill_values;
        self.is_fitted = true;
        Ok(self)
    }

    /// Transform the data by imputing missing values
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(MlError::ModelNotFitted);
        }

        let mut result = df.clone();

        for (col_name, fill_value) in &self.fill_values {
            let column = df
                .column(col_name)
                .map_err(|_| MlError::FeatureNotFound(col_name.clone()))?;
            let filled = Self::fill_series(column.as_materialized_series(), fill_value)?;
            result.with_column(filled)?;
        }

        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    fn is_numeric_dtype(dtype: &DataType) -> bool {
        matches!(
            dtype,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
                | DataType::Float32
                | DataType::Float64
        )
    }

    fn compute_fill_value(&self, name: &str, series: &Series) -> Result<ImputeValue> {
        match &self.strategy {
            ImputeStrategy::Constant(v) => Ok(ImputeValue::Numeric(*v)),
            ImputeStrategy::ConstantString(s) => Ok(ImputeValue::String(s.clone())),
            ImputeStrategy::Mean | ImputeStrategy::Median => {
                if !Self::is_numeric_dtype(series.dtype()) {
                    return Err(MlError::PreprocessingError(format!(
                        "{:?} imputation requires a numeric column, '{}' is {}",
                        self.strategy,
                        name,
                        series.dtype()
                    )));
                }
                let values = Self::observed_numeric(series)?;
                if values.is_empty() {
                    return Err(MlError::PreprocessingError(format!(
                        "column '{}' has no observed values to impute from",
                        name
                    )));
                }
                let fill = if self.strategy == ImputeStrategy::Mean {
                    values.iter().sum::<f64>() / values.len() as f64
                } else {
                    median(values)
                };
                Ok(ImputeValue::Numeric(fill))
            }
            ImputeStrategy::MostFrequent => {
                if Self::is_numeric_dtype(series.dtype()) {
                    let values = Self::observed_numeric(series)?;
                    most_frequent_numeric(&values)
                        .map(ImputeValue::Numeric)
                        .ok_or_else(|| Self::no_observed(name))
                } else {
                    let ca = series.str()?;
                    most_frequent_str(ca.into_iter().flatten())
                        .map(ImputeValue::String)
                        .ok_or_else(|| Self::no_observed(name))
                }
            }
        }
    }

    fn no_observed(name: &str) -> MlError {
        MlError::PreprocessingError(format!(
            "column '{}' has no observed values to impute from",
            name
        ))
    }

    fn observed_numeric(series: &Series) -> Result<Vec<f64>> {
        let casted = series.cast(&DataType::Float64)?;
        Ok(casted.f64()?.into_iter().flatten().collect())
    }

    fn fill_series(series: &Series, fill_value: &ImputeValue) -> Result<Series> {
        match fill_value {
            ImputeValue::Numeric(v) => {
                let casted = series.cast(&DataType::Float64)?;
                let filled: Float64Chunked = casted
                    .f64()?
                    .into_iter()
                    .map(|opt| Some(opt.unwrap_or(*v)))
                    .collect();
                Ok(filled.with_name(series.name().clone()).into_series())
            }
            ImputeValue::String(s) => {
                let casted = series.cast(&DataType::String)?;
                let filled: StringChunked = casted
                    .str()?
                    .into_iter()
                    .map(|opt| Some(opt.unwrap_or(s.as_str())))
                    .collect();
                Ok(filled.with_name(series.name().clone()).into_series())
            }
        }
    }
}

/// Median of `values`; the midpoint of the two central values for even counts
fn median(mut values: Vec<f64>) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n % 2 == 0 {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    } else {
        values[n / 2]
    }
}

/// Most frequent value; ties go to the smallest value
fn most_frequent_numeric(values: &[f64]) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut best: Option<(f64, usize)> = None;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i;
        while j < sorted.len() && sorted[j] == sorted[i] {
            j += 1;
        }
        let count = j - i;
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((sorted[i], count));
        }
        i = j;
    }
    best.map(|(v, _)| v)
}

/// Most frequent string; ties go to the lexicographically smallest
fn most_frequent_str<'a>(values: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    best.map(|(v, _)| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_imputation() {
        let df = df!("a" => &[Some(1.0), None, Some(3.0), Some(10.0), Some(4.0)]).unwrap();

        let mut imputer = Imputer::new(ImputeStrategy::Median);
        let result = imputer.fit_transform(&df, &["a"]).unwrap();

        let col = result.column("a").unwrap().f64().unwrap();
        assert_eq!(col.null_count(), 0);
        // median of [1, 3, 4, 10] is 3.5
        assert_eq!(col.get(1), Some(3.5));
    }

    #[test]
    fn test_mean_imputation_casts_integers() {
        let df = df!("a" => &[Some(2i64), None, Some(4i64)]).unwrap();

        let mut imputer = Imputer::new(ImputeStrategy::Mean);
        let result = imputer.fit_transform(&df, &["a"]).unwrap();

        let col = result.column("a").unwrap();
        assert_eq!(col.dtype(), &DataType::Float64);
        assert_eq!(col.f64().unwrap().get(1), Some(3.0));
    }

    #[test]
    fn test_most_frequent_string() {
        let df = df!("c" => &[Some("b"), Some("a"), None, Some("b"), Some("a")]).unwrap();

        let mut imputer = Imputer::new(ImputeStrategy::MostFrequent);
        let result = imputer.fit_transform(&df, &["c"]).unwrap();

        // "a" and "b" tie, the smaller value wins
        let col = result.column("c").unwrap().str().unwrap();
        assert_eq!(col.get(2), Some("a"));
    }

    #[test]
    fn test_transform_before_fit() {
        let df = df!("a" => &[1.0]).unwrap();
        let imputer = Imputer::new(ImputeStrategy::Median);
        assert!(matches!(imputer.transform(&df), Err(MlError::ModelNotFitted)));
    }

    #[test]
    fn test_median_rejects_strings() {
        let df = df!("c" => &["x", "y"]).unwrap();
        let mut imputer = Imputer::new(ImputeStrategy::Median);
        assert!(imputer.fit(&df, &["c"]).is_err());
    }

    #[test]
    fn test_all_missing_column() {
        let df = df!("a" => &[None::<f64>, None]).unwrap();
        let mut imputer = Imputer::new(ImputeStrategy::Mean);
        assert!(imputer.fit(&df, &["a"]).is_err());
    }

    #[test]
    fn test_missing_column_reported() {
        let df = df!("a" => &[1.0]).unwrap();
        let mut imputer = Imputer::new(ImputeStrategy::Median);
        let err = imputer.fit(&df, &["b"]).unwrap_err();
        assert!(matches!(err, MlError::FeatureNotFound(_)));
    }
}
