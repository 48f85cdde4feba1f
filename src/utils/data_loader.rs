//! Data loading utilities

use crate::error::{MlError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Number of rows polars inspects when inferring column types
const INFER_SCHEMA_ROWS: usize = 1000;

/// Loads and saves the CSV tables exchanged between pipeline stages
#[derive(Debug, Clone, Default)]
pub struct DataLoader;

impl DataLoader {
    /// Load a CSV file with a header row
    pub fn load_csv(path: &Path) -> Result<DataFrame> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .map_err(|e| MlError::DataError(format!("{}: {}", path.display(), e)))?
            .finish()
            .map_err(|e| MlError::DataError(format!("{}: {}", path.display(), e)))?;

        debug!(path = %path.display(), rows = df.height(), cols = df.width(), "Loaded CSV");
        Ok(df)
    }

    /// Save a table as CSV with a header row and no index column
    pub fn save_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
        let mut file = File::create(path)?;

        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(df)
            .map_err(|e| MlError::DataError(format!("{}: {}", path.display(), e)))?;

        debug!(path = %path.display(), rows = df.height(), "Saved CSV");
        Ok(())
    }
}

/// Fail with [`MlError::FeatureNotFound`] for the first missing column
pub fn require_columns(df: &DataFrame, columns: &[&str]) -> Result<()> {
    for name in columns {
        if df.column(name).is_err() {
            return Err(MlError::FeatureNotFound(name.to_string()));
        }
    }
    Ok(())
}

/// Select rows by position, preserving the given order
pub fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx: Vec<IdxSize> = indices.iter().map(|&i| i as IdxSize).collect();
    let idx = IdxCa::from_vec("".into(), idx);
    Ok(df.take(&idx)?)
}

/// Read one column as `f64` values; missing values are rejected
pub fn column_to_vec(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| MlError::FeatureNotFound(name.to_string()))?;
    let casted = column.cast(&DataType::Float64)?;
    let values = casted.f64()?;

    if values.null_count() > 0 {
        return Err(MlError::DataError(format!(
            "column '{}' contains {} missing values",
            name,
            values.null_count()
        )));
    }

    Ok(values.into_no_null_iter().collect())
}

/// Extract named columns into a row-major matrix
pub fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|name| column_to_vec(df, name))
        .collect::<Result<_>>()?;

    Ok(Array2::from_shape_fn((n_rows, col_names.len()), |(r, c)| {
        col_data[c][r]
    }))
}

/// Split a transformed table into a feature matrix (every column but the last)
/// and a label vector (the last column).
pub fn split_features_label(df: &DataFrame) -> Result<(Array2<f64>, Array1<f64>)> {
    let names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();

    let (label, features) = names
        .split_last()
        .ok_or_else(|| MlError::DataError("table has no columns".to_string()))?;
    if features.is_empty() {
        return Err(MlError::DataError(
            "table needs at least one feature column before the label".to_string(),
        ));
    }

    let x = columns_to_array2(df, features)?;
    let y = Array1::from_vec(column_to_vec(df, label)?);
    Ok((x, y))
}
