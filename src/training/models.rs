//! Regressor capability and regression metrics

use crate::error::{MlError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Capability shared by every estimator the pipeline can search over
pub trait Regressor: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Coefficient of determination of the predictions on `x`
    fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let y_pred = self.predict(x)?;
        r2_score(y, &y_pred)
    }
}

/// Reject empty, mismatched or non-finite training data
pub(crate) fn validate_fit_input(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(MlError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(MlError::ValidationError(format!(
            "need a non-empty training matrix, got {} x {}",
            x.nrows(),
            x.ncols()
        )));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(MlError::ValidationError(
            "training data contains NaN or infinite values".to_string(),
        ));
    }
    Ok(())
}

/// Reject a prediction matrix with the wrong number of features
pub(crate) fn validate_predict_input(x: &Array2<f64>, n_features: usize) -> Result<()> {
    if x.ncols() != n_features {
        return Err(MlError::ShapeError {
            expected: format!("{} features", n_features),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

fn check_lengths(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(MlError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    if y_true.is_empty() {
        return Err(MlError::ValidationError(
            "cannot score an empty set of predictions".to_string(),
        ));
    }
    Ok(())
}

/// R² (coefficient of determination).
///
/// A constant target scores 1.0 when predicted exactly and 0.0 otherwise.
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;

    let y_mean = y_true.mean().unwrap_or(0.0);
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - y_mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

pub fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let total: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    Ok(total / y_true.len() as f64)
}

pub fn root_mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    Ok(mean_squared_error(y_true, y_pred)?.sqrt())
}

pub fn mean_absolute_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let total: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).abs())
        .sum();
    Ok(total / y_true.len() as f64)
}

/// Held-out evaluation of a fitted regressor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub r2: f64,
    pub rmse: f64,
    pub mae: f64,
}

impl RegressionMetrics {
    /// Compute regression metrics
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        Ok(Self {
            r2: r2_score(y_true, y_pred)?,
            rmse: root_mean_squared_error(y_true, y_pred)?,
            mae: mean_absolute_error(y_true, y_pred)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regression_metrics() {
        let y_true = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let y_pred = array![1.1, 2.0, 2.9, 4.1, 5.0];

        let metrics = RegressionMetrics::compute(&y_true, &y_pred).unwrap();

        assert!(metrics.r2 > 0.9);
        assert!((metrics.mae - 0.06).abs() < 1e-12);
        assert!((metrics.rmse - (0.03f64 / 5.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_r2_perfect_and_mean_predictions() {
        let y = array![3.0, 5.0, 7.0];
        assert_eq!(r2_score(&y, &y).unwrap(), 1.0);
        assert!(r2_score(&y, &array![5.0, 5.0, 5.0]).unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_r2_constant_target() {
        let y = array![2.0, 2.0];
        assert_eq!(r2_score(&y, &array![2.0, 2.0]).unwrap(), 1.0);
        assert_eq!(r2_score(&y, &array![2.0, 3.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(r2_score(&array![1.0, 2.0], &array![1.0]).is_err());
        assert!(mean_absolute_error(&array![], &array![]).is_err());
    }

    #[test]
    fn test_validate_fit_input() {
        let x = array![[1.0], [2.0]];
        assert!(validate_fit_input(&x, &array![1.0, 2.0]).is_ok());
        assert!(validate_fit_input(&x, &array![1.0]).is_err());
        assert!(validate_fit_input(&x, &array![1.0, f64::NAN]).is_err());
    }
}
