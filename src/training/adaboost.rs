//! AdaBoost (Adaptive Boosting) implementation
//!
//! AdaBoost.R2: every round fits a shallow tree to a bootstrap drawn with the
//! current sample weights, then shifts weight onto the rows that tree got most
//! wrong. Predictions are the weighted median over the ensemble.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::decision_tree::DecisionTreeRegressor;
use super::models::{validate_fit_input, validate_predict_input, Regressor};
use crate::error::{MlError, Result};

/// Depth of every weak learner
const BASE_MAX_DEPTH: usize = 3;

/// How a normalized absolute error in [0, 1] becomes a round loss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaBoostLoss {
    Linear,
    Square,
    Exponential,
}

impl AdaBoostLoss {
    fn apply(&self, normalized_error: f64) -> f64 {
        match self {
            AdaBoostLoss::Linear => normalized_error,
            AdaBoostLoss::Square => normalized_error * normalized_error,
            AdaBoostLoss::Exponential => 1.0 - (-normalized_error).exp(),
        }
    }
}

impl FromStr for AdaBoostLoss {
    type Err = MlError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "linear" => Ok(AdaBoostLoss::Linear),
            "square" => Ok(AdaBoostLoss::Square),
            "exponential" => Ok(AdaBoostLoss::Exponential),
            other => Err(MlError::invalid_parameter(
                "loss",
                other,
                "expected linear, square or exponential",
            )),
        }
    }
}

/// AdaBoost Regressor (AdaBoost.R2)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostRegressor {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub loss: AdaBoostLoss,
    pub random_state: Option<u64>,
    estimators: Vec<DecisionTreeRegressor>,
    estimator_weights: Vec<f64>,
    n_features: usize,
}

impl Default for AdaBoostRegressor {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostRegressor {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            loss: AdaBoostLoss::Linear,
            random_state: Some(42),
            estimators: Vec::new(),
            estimator_weights: Vec::new(),
            n_features: 0,
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_loss(mut self, loss: AdaBoostLoss) -> Self {
        self.loss = loss;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Number of weak learners kept after early stopping
    pub fn n_fitted(&self) -> usize {
        self.estimators.len()
    }

    pub fn estimator_weights(&self) -> &[f64] {
        &self.estimator_weights
    }

    /// Draw `n` row indices with probability proportional to `weights`
    fn weighted_bootstrap(weights: &[f64], rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        let mut cdf = Vec::with_capacity(weights.len());
        let mut acc = 0.0;
        for &w in weights {
            acc += w;
            cdf.push(acc);
        }
        let last = weights.len() - 1;
        (0..weights.len())
            .map(|_| {
                let u = rng.gen::<f64>() * acc;
                cdf.partition_point(|&c| c <= u).min(last)
            })
            .collect()
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        validate_fit_input(x, y)?;
        if self.n_estimators == 0 {
            return Err(MlError::invalid_parameter("n_estimators", 0, "must be at least 1"));
        }
        if !(self.learning_rate > 0.0) {
            return Err(MlError::invalid_parameter(
                "learning_rate",
                self.learning_rate,
                "must be positive",
            ));
        }

        let n_samples = x.nrows();
        let mut rng = match self.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let mut weights = vec![1.0 / n_samples as f64; n_samples];
        let mut estimators = Vec::new();
        let mut estimator_weights = Vec::new();

        for round in 0..self.n_estimators {
            let indices = Self::weighted_bootstrap(&weights, &mut rng);
            let x_boot = x.select(Axis(0), &indices);
            let y_boot: Array1<f64> = indices.iter().map(|&i| y[i]).collect();

            let mut tree = DecisionTreeRegressor::new()
                .with_max_depth(BASE_MAX_DEPTH)
                .with_random_state(rng.next_u64());
            tree.fit(&x_boot, &y_boot)?;

            let predictions = tree.predict(x)?;
            let mut errors: Vec<f64> = predictions
                .iter()
                .zip(y.iter())
                .map(|(p, t)| (p - t).abs())
                .collect();
            let max_error = errors.iter().cloned().fold(0.0, f64::max);
            if max_error > 0.0 {
                for e in &mut errors {
                    *e = self.loss.apply(*e / max_error);
                }
            }

            let estimator_error: f64 = weights.iter().zip(&errors).map(|(w, e)| w * e).sum();

            if estimator_error <= 0.0 {
                estimators.push(tree);
                estimator_weights.push(1.0);
                break;
            }

            if estimator_error >= 0.5 {
                // a learner no better than chance only survives as the sole member
                if estimators.is_empty() {
                    estimators.push(tree);
                    estimator_weights.push(1.0);
                }
                break;
            }

            let beta = estimator_error / (1.0 - estimator_error);
            estimators.push(tree);
            estimator_weights.push(self.learning_rate * (1.0 / beta).ln());

            if round + 1 == self.n_estimators {
                break;
            }

            for (w, e) in weights.iter_mut().zip(&errors) {
                *w *= beta.powf((1.0 - e) * self.learning_rate);
            }
            let total: f64 = weights.iter().sum();
            if !(total > 0.0) || !total.is_finite() {
                break;
            }
            for w in &mut weights {
                *w /= total;
            }
        }

        self.estimators = estimators;
        self.estimator_weights = estimator_weights;
        self.n_features = x.ncols();
        Ok(self)
    }

    /// Weighted median of the weak learners' predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.estimators.is_empty() {
            return Err(MlError::ModelNotFitted);
        }
        validate_predict_input(x, self.n_features)?;

        let per_estimator: Vec<Array1<f64>> = self
            .estimators
            .iter()
            .map(|e| e.predict(x))
            .collect::<Result<_>>()?;

        let total_weight: f64 = self.estimator_weights.iter().sum();
        let mut order: Vec<usize> = (0..self.estimators.len()).collect();

        let predictions = (0..x.nrows())
            .map(|row| {
                order.sort_by(|&a, &b| per_estimator[a][row].total_cmp(&per_estimator[b][row]));
                let mut cumulative = 0.0;
                for &idx in &order {
                    cumulative += self.estimator_weights[idx];
                    if cumulative >= 0.5 * total_weight {
                        return per_estimator[idx][row];
                    }
                }
                per_estimator[order[order.len() - 1]][row]
            })
            .collect();

        Ok(predictions)
    }

    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        Regressor::score(self, x, y)
    }
}

impl Regressor for AdaBoostRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        AdaBoostRegressor::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        AdaBoostRegressor::predict(self, x)
    }
}
