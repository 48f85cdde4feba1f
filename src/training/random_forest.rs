//! Random Forest implementation

use super::decision_tree::{Criterion, DecisionTreeRegressor, MaxFeatures};
use super::models::{validate_fit_input, validate_predict_input, Regressor};
use crate::error::{MlError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Random forest regressor: bagged CART trees with averaged predictions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    /// Individual trees
    trees: Vec<DecisionTreeRegressor>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features examined per split
    pub max_features: MaxFeatures,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Bootstrap sample size as a fraction of the training rows
    pub max_samples: Option<f64>,
    /// Random state
    pub random_state: Option<u64>,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
    /// Number of features
    n_features: usize,
}

impl Default for RandomForestRegressor {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForestRegressor {
    /// Create a new regressor forest
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            criterion: Criterion::SquaredError,
            bootstrap: true,
            max_samples: None,
            random_state: None,
            feature_importances: None,
            n_features: 0,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: impl Into<Option<usize>>) -> Self {
        self.max_depth = depth.into();
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Draw `fraction` of the rows per bootstrap sample
    pub fn with_max_samples(mut self, fraction: f64) -> Self {
        self.max_samples = Some(fraction);
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    fn validate_params(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(MlError::invalid_parameter("n_estimators", 0, "must be at least 1"));
        }
        if let Some(fraction) = self.max_samples {
            if !self.bootstrap {
                return Err(MlError::invalid_parameter(
                    "max_samples",
                    fraction,
                    "cannot be set when bootstrap is disabled",
                ));
            }
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(MlError::invalid_parameter(
                    "max_samples",
                    fraction,
                    "must be in (0, 1]",
                ));
            }
        }
        Ok(())
    }

    fn bootstrap_size(&self, n_samples: usize) -> usize {
        match self.max_samples {
            Some(fraction) => ((n_samples as f64 * fraction).round() as usize).max(1),
            None => n_samples,
        }
    }

    /// Fit the forest to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        validate_fit_input(x, y)?;
        self.validate_params()?;

        let n_samples = x.nrows();
        let sample_size = self.bootstrap_size(n_samples);
        let base_seed = match self.random_state {
            Some(seed) => seed,
            None => rand::thread_rng().gen(),
        };

        // Build trees in parallel, one seeded generator per tree
        let trees: Vec<DecisionTreeRegressor> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));

                let mut tree = DecisionTreeRegressor::new()
                    .with_max_depth(self.max_depth)
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_max_features(self.max_features)
                    .with_criterion(self.criterion)
                    .with_random_state(rng.next_u64());

                if self.bootstrap {
                    let sample_indices: Vec<usize> = (0..sample_size)
                        .map(|_| rng.gen_range(0..n_samples))
                        .collect();
                    let x_boot = x.select(Axis(0), &sample_indices);
                    let y_boot: Array1<f64> = sample_indices.iter().map(|&i| y[i]).collect();
                    tree.fit(&x_boot, &y_boot)?;
                } else {
                    tree.fit(x, y)?;
                }

                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        self.n_features = x.ncols();
        self.compute_feature_importances();

        Ok(self)
    }

    fn compute_feature_importances(&mut self) {
        let mut total = vec![0.0; self.n_features];

        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                for (acc, &val) in total.iter_mut().zip(imp.iter()) {
                    *acc += val;
                }
            }
        }

        let n_trees = self.trees.len().max(1) as f64;
        self.feature_importances = Some(total.into_iter().map(|v| v / n_trees).collect());
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(MlError::ModelNotFitted);
        }
        validate_predict_input(x, self.n_features)?;

        let per_tree: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<_>>()?;

        let mut sum: Array1<f64> = Array1::zeros(x.nrows());
        for predictions in &per_tree {
            sum += predictions;
        }
        Ok(sum / self.trees.len() as f64)
    }

    /// Get R² score
    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        Regressor::score(self, x, y)
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Fitted trees
    pub fn trees(&self) -> &[DecisionTreeRegressor] {
        &self.trees
    }
}

impl Regressor for RandomForestRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        RandomForestRegressor::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        RandomForestRegressor::predict(self, x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn regression_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| (i * (j + 1)) as f64 % 17.0);
        let y: Array1<f64> = x.outer_iter().map(|r| 3.0 * r[0] - r[1]).collect();
        (x, y)
    }

    #[test]
    fn test_random_forest_regressor() {
        let (x, y) = regression_data();

        let mut forest = RandomForestRegressor::new(20).with_random_state(42);
        forest.fit(&x, &y).unwrap();

        assert_eq!(forest.trees().len(), 20);
        let r2 = forest.score(&x, &y).unwrap();
        assert!(r2 > 0.8, "training R² too low: {}", r2);
    }

    #[test]
    fn test_seeded_forest_is_reproducible() {
        let (x, y) = regression_data();

        let fit = || {
            let mut forest = RandomForestRegressor::new(5)
                .with_max_features(MaxFeatures::Sqrt)
                .with_max_samples(0.7)
                .with_random_state(3);
            forest.fit(&x, &y).unwrap();
            forest.predict(&x).unwrap()
        };

        assert_eq!(fit(), fit());
    }

    #[test]
    fn test_max_samples_requires_bootstrap() {
        let (x, y) = regression_data();
        let mut forest = RandomForestRegressor::new(3)
            .with_bootstrap(false)
            .with_max_samples(0.8);
        assert!(matches!(
            forest.fit(&x, &y),
            Err(MlError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_without_bootstrap_trees_see_all_rows() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];

        let mut forest = RandomForestRegressor::new(3)
            .with_bootstrap(false)
            .with_random_state(0);
        forest.fit(&x, &y).unwrap();

        let predictions = forest.predict(&x).unwrap();
        for (p, t) in predictions.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-12);
        }
    }

    #[test]
    fn test_predict_before_fit() {
        let forest = RandomForestRegressor::default();
        assert!(forest.predict(&array![[1.0]]).is_err());
    }
}
