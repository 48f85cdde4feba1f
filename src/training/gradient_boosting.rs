//! Gradient Boosting implementation
//!
//! Stagewise additive regression trees fit to the negative gradient of a
//! differentiable loss. The robust losses re-estimate every leaf by a line
//! search on the raw residuals of the samples that reached it.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::decision_tree::{median, Criterion, DecisionTreeRegressor, MaxFeatures};
use super::models::{validate_fit_input, validate_predict_input, Regressor};
use crate::error::{MlError, Result};

/// Loss optimized by the boosting stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoostingLoss {
    SquaredError,
    AbsoluteError,
    /// Squared error near zero, absolute error beyond the `alpha` quantile of |residual|
    Huber,
    /// Pinball loss for the `alpha` quantile
    Quantile,
}

impl FromStr for BoostingLoss {
    type Err = MlError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "squared_error" => Ok(BoostingLoss::SquaredError),
            "absolute_error" => Ok(BoostingLoss::AbsoluteError),
            "huber" => Ok(BoostingLoss::Huber),
            "quantile" => Ok(BoostingLoss::Quantile),
            other => Err(MlError::invalid_parameter(
                "loss",
                other,
                "expected squared_error, absolute_error, huber or quantile",
            )),
        }
    }
}

impl BoostingLoss {
    /// Constant model the boosting starts from
    fn initial_prediction(&self, y: &[f64], alpha: f64) -> f64 {
        match self {
            BoostingLoss::SquaredError => y.iter().sum::<f64>() / y.len() as f64,
            BoostingLoss::AbsoluteError | BoostingLoss::Huber => median(y),
            BoostingLoss::Quantile => quantile(y, alpha),
        }
    }

    /// Negative gradient for one residual `y - f`
    fn negative_gradient(&self, residual: f64, alpha: f64, delta: f64) -> f64 {
        match self {
            BoostingLoss::SquaredError => residual,
            BoostingLoss::AbsoluteError => {
                if residual > 0.0 {
                    1.0
                } else if residual < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
            BoostingLoss::Huber => {
                if residual.abs() <= delta {
                    residual
                } else {
                    delta * residual.signum()
                }
            }
            BoostingLoss::Quantile => {
                if residual > 0.0 {
                    alpha
                } else {
                    alpha - 1.0
                }
            }
        }
    }

    /// Line-searched value of a leaf holding `residuals`; `None` keeps the
    /// tree's own value.
    fn leaf_value(&self, residuals: &[f64], alpha: f64, delta: f64) -> Option<f64> {
        if residuals.is_empty() {
            return None;
        }
        match self {
            BoostingLoss::SquaredError => None,
            BoostingLoss::AbsoluteError => Some(median(residuals)),
            BoostingLoss::Quantile => Some(quantile(residuals, alpha)),
            BoostingLoss::Huber => {
                let m = median(residuals);
                let correction = residuals
                    .iter()
                    .map(|r| {
                        let diff = r - m;
                        diff.signum() * diff.abs().min(delta)
                    })
                    .sum::<f64>()
                    / residuals.len() as f64;
                Some(m + correction)
            }
        }
    }
}

/// Lower `q`-quantile by nearest rank
fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (q * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Gradient Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Loss to optimize
    pub loss: BoostingLoss,
    /// Quantile used by the huber and quantile losses
    pub alpha: f64,
    /// Maximum tree depth
    pub max_depth: Option<usize>,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Fraction of rows drawn, without replacement, for each tree
    pub subsample: f64,
    /// Features examined per split
    pub max_features: MaxFeatures,
    /// Split criterion of the stage trees
    pub criterion: Criterion,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            loss: BoostingLoss::SquaredError,
            alpha: 0.9,
            max_depth: Some(3),
            min_samples_leaf: 1,
            subsample: 1.0,
            max_features: MaxFeatures::All,
            criterion: Criterion::FriedmanMse,
            random_state: Some(42),
        }
    }
}

impl GradientBoostingConfig {
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_loss(mut self, loss: BoostingLoss) -> Self {
        self.loss = loss;
        self
    }

    pub fn with_max_depth(mut self, depth: impl Into<Option<usize>>) -> Self {
        self.max_depth = depth.into();
        self
    }

    pub fn with_subsample(mut self, subsample: f64) -> Self {
        self.subsample = subsample;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    fn validate(&self) -> Result<()> {
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
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(MlError::invalid_parameter(
                "subsample",
                self.subsample,
                "must be in (0, 1]",
            ));
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(MlError::invalid_parameter("alpha", self.alpha, "must be in (0, 1)"));
        }
        if !matches!(self.criterion, Criterion::SquaredError | Criterion::FriedmanMse) {
            return Err(MlError::invalid_parameter(
                "criterion",
                self.criterion.as_str(),
                "boosting supports squared_error or friedman_mse",
            ));
        }
        Ok(())
    }
}

/// Gradient Boosting Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTreeRegressor>,
    initial_prediction: f64,
    n_features: usize,
    feature_importances: Vec<f64>,
}

impl Default for GradientBoostingRegressor {
    fn default() -> Self {
        Self::new(GradientBoostingConfig::default())
    }
}

impl GradientBoostingRegressor {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_prediction: 0.0,
            n_features: 0,
            feature_importances: Vec::new(),
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    /// Fit the gradient boosting model
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        validate_fit_input(x, y)?;
        self.config.validate()?;

        let n_samples = x.nrows();
        let n_features = x.ncols();
        let loss = self.config.loss;
        let alpha = self.config.alpha;
        let y_slice: Vec<f64> = y.to_vec();

        self.initial_prediction = loss.initial_prediction(&y_slice, alpha);
        let mut predictions = Array1::from_elem(n_samples, self.initial_prediction);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let mut trees = Vec::with_capacity(self.config.n_estimators);
        let mut importances = vec![0.0; n_features];

        for _ in 0..self.config.n_estimators {
            let sample_indices = self.subsample_indices(n_samples, &mut rng);
            let residuals: Vec<f64> = y
                .iter()
                .zip(predictions.iter())
                .map(|(yi, fi)| yi - fi)
                .collect();

            let delta = if loss == BoostingLoss::Huber {
                let abs: Vec<f64> = sample_indices.iter().map(|&i| residuals[i].abs()).collect();
                quantile(&abs, alpha)
            } else {
                0.0
            };

            let x_sub = x.select(Axis(0), &sample_indices);
            let gradient: Array1<f64> = sample_indices
                .iter()
                .map(|&i| loss.negative_gradient(residuals[i], alpha, delta))
                .collect();

            let mut tree = DecisionTreeRegressor::new()
                .with_criterion(self.config.criterion)
                .with_max_depth(self.config.max_depth)
                .with_min_samples_leaf(self.config.min_samples_leaf)
                .with_max_features(self.config.max_features)
                .with_random_state(rng.next_u64());
            tree.fit(&x_sub, &gradient)?;

            if loss != BoostingLoss::SquaredError {
                let leaf_ids = tree.apply(&x_sub)?;
                let mut per_leaf: Vec<Vec<f64>> = vec![Vec::new(); tree.get_n_leaves()];
                for (k, &i) in sample_indices.iter().enumerate() {
                    per_leaf[leaf_ids[k]].push(residuals[i]);
                }
                tree.update_leaves(&mut |leaf_id, current| {
                    loss.leaf_value(&per_leaf[leaf_id], alpha, delta)
                        .unwrap_or(current)
                });
            }

            let update = tree.predict(x)?;
            predictions.scaled_add(self.config.learning_rate, &update);

            if let Some(tree_importance) = tree.feature_importances() {
                for (acc, &v) in importances.iter_mut().zip(tree_importance.iter()) {
                    *acc += v;
                }
            }
            trees.push(tree);
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }

        self.trees = trees;
        self.n_features = n_features;
        self.feature_importances = importances;
        Ok(self)
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(MlError::ModelNotFitted);
        }
        validate_predict_input(x, self.n_features)?;

        let mut predictions = Array1::from_elem(x.nrows(), self.initial_prediction);
        for tree in &self.trees {
            predictions.scaled_add(self.config.learning_rate, &tree.predict(x)?);
        }
        Ok(predictions)
    }

    /// Get R² score
    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        Regressor::score(self, x, y)
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn subsample_indices(&self, n: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        if self.config.subsample >= 1.0 {
            return (0..n).collect();
        }
        let sample_size = ((n as f64 * self.config.subsample) as usize).max(1);
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(rng);
        indices.truncate(sample_size);
        indices.sort_unstable();
        indices
    }
}

impl Regressor for GradientBoostingRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        GradientBoostingRegressor::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        GradientBoostingRegressor::predict(self, x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn regression_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((60, 2), |(i, j)| ((i * (j + 3)) % 23) as f64);
        let y: Array1<f64> = x.outer_iter().map(|r| 2.0 * r[0] + 0.5 * r[1] + 1.0).collect();
        (x, y)
    }

    #[test]
    fn test_squared_error_fits() {
        let (x, y) = regression_data();
        let config = GradientBoostingConfig::default().with_n_estimators(50);
        let mut model = GradientBoostingRegressor::new(config);
        model.fit(&x, &y).unwrap();

        assert_eq!(model.n_trees(), 50);
        let r2 = model.score(&x, &y).unwrap();
        assert!(r2 > 0.95, "R² too low: {}", r2);
    }

    #[test]
    fn test_every_loss_improves_on_the_constant_model() {
        let (x, y) = regression_data();
        for loss in [
            BoostingLoss::SquaredError,
            BoostingLoss::AbsoluteError,
            BoostingLoss::Huber,
            BoostingLoss::Quantile,
        ] {
            let config = GradientBoostingConfig::default()
                .with_loss(loss)
                .with_n_estimators(30)
                .with_learning_rate(0.5);
            let mut model = GradientBoostingRegressor::new(config);
            model.fit(&x, &y).unwrap();

            let r2 = model.score(&x, &y).unwrap();
            assert!(r2 > 0.5, "loss {:?} gave R² {}", loss, r2);
        }
    }

    #[test]
    fn test_subsample_is_seeded() {
        let (x, y) = regression_data();
        let fit = || {
            let config = GradientBoostingConfig::default()
                .with_n_estimators(10)
                .with_subsample(0.7)
                .with_max_features(MaxFeatures::Sqrt)
                .with_random_state(11);
            let mut model = GradientBoostingRegressor::new(config);
            model.fit(&x, &y).unwrap();
            model.predict(&x).unwrap()
        };
        assert_eq!(fit(), fit());
    }

    #[test]
    fn test_invalid_criterion() {
        let (x, y) = regression_data();
        let config = GradientBoostingConfig::default().with_criterion(Criterion::Poisson);
        let mut model = GradientBoostingRegressor::new(config);
        assert!(model.fit(&x, &y).is_err());
    }

    #[test]
    fn test_quantile_helper() {
        let values = [5.0, 1.0, 3.0, 2.0, 4.0];
        assert_eq!(quantile(&values, 0.5), 3.0);
        assert_eq!(quantile(&values, 0.9), 5.0);
        assert_eq!(quantile(&values, 0.01), 1.0);
    }

    #[test]
    fn test_parse_loss() {
        assert_eq!("huber".parse::<BoostingLoss>().unwrap(), BoostingLoss::Huber);
        assert!("exponential".parse::<BoostingLoss>().is_err());
    }

    #[test]
    fn test_predict_before_fit() {
        let model = GradientBoostingRegressor::default();
        assert!(model.predict(&array![[1.0, 2.0]]).is_err());
    }
}
