//! CART regression tree

use super::models::{validate_fit_input, validate_predict_input, Regressor};
use crate::error::{MlError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Smallest gain accepted for a split
const MIN_GAIN: f64 = 1e-12;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf {
        value: f64,
        n_samples: usize,
        leaf_id: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Split quality criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    /// Variance reduction, mean leaves
    SquaredError,
    /// Variance reduction scored with Friedman's improvement, mean leaves
    FriedmanMse,
    /// Mean absolute deviation reduction, median leaves
    AbsoluteError,
    /// Poisson deviance reduction, mean leaves; labels must be non-negative
    Poisson,
}

impl Criterion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Criterion::SquaredError => "squared_error",
            Criterion::FriedmanMse => "friedman_mse",
            Criterion::AbsoluteError => "absolute_error",
            Criterion::Poisson => "poisson",
        }
    }
}

impl FromStr for Criterion {
    type Err = MlError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "squared_error" => Ok(Criterion::SquaredError),
            "friedman_mse" => Ok(Criterion::FriedmanMse),
            "absolute_error" => Ok(Criterion::AbsoluteError),
            "poisson" => Ok(Criterion::Poisson),
            other => Err(MlError::invalid_parameter(
                "criterion",
                other,
                "expected squared_error, friedman_mse, absolute_error or poisson",
            )),
        }
    }
}

/// Threshold search strategy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Splitter {
    /// Scan every threshold of every candidate feature
    Best,
    /// Draw one uniform threshold per candidate feature
    Random,
}

impl FromStr for Splitter {
    type Err = MlError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "best" => Ok(Splitter::Best),
            "random" => Ok(Splitter::Random),
            other => Err(MlError::invalid_parameter(
                "splitter",
                other,
                "expected best or random",
            )),
        }
    }
}

/// Number of features examined per split
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// All features
    All,
}

impl MaxFeatures {
    /// Resolve to a feature count in `1..=n_features`
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = n_features as f64;
        let k = match *self {
            MaxFeatures::Sqrt => n.sqrt().floor() as usize,
            MaxFeatures::Log2 => n.log2().floor() as usize,
            MaxFeatures::Fraction(f) => (n * f).floor() as usize,
            MaxFeatures::All => n_features,
        };
        k.clamp(1, n_features.max(1))
    }
}

impl FromStr for MaxFeatures {
    type Err = MlError;

    /// `"None"` and `"auto"` both mean every feature.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sqrt" => Ok(MaxFeatures::Sqrt),
            "log2" => Ok(MaxFeatures::Log2),
            "None" | "none" | "auto" | "all" => Ok(MaxFeatures::All),
            other => Err(MlError::invalid_parameter(
                "max_features",
                other,
                "expected sqrt, log2, auto or None",
            )),
        }
    }
}

/// CART regression tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features examined per split
    pub max_features: MaxFeatures,
    /// Split quality criterion
    pub criterion: Criterion,
    /// Threshold search strategy
    pub splitter: Splitter,
    /// Seed for feature sampling and random thresholds
    pub random_state: Option<u64>,
    n_features: usize,
    n_leaves: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTreeRegressor {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTreeRegressor {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            criterion: Criterion::SquaredError,
            splitter: Splitter::Best,
            random_state: None,
            n_features: 0,
            n_leaves: 0,
            feature_importances: None,
        }
    }

    /// Set maximum depth; `None` grows until leaves are pure
    pub fn with_max_depth(mut self, depth: impl Into<Option<usize>>) -> Self {
        self.max_depth = depth.into();
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_splitter(mut self, splitter: Splitter) -> Self {
        self.splitter = splitter;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    fn validate_params(&self) -> Result<()> {
        if self.min_samples_split < 2 {
            return Err(MlError::invalid_parameter(
                "min_samples_split",
                self.min_samples_split,
                "must be at least 2",
            ));
        }
        if self.min_samples_leaf < 1 {
            return Err(MlError::invalid_parameter(
                "min_samples_leaf",
                self.min_samples_leaf,
                "must be at least 1",
            ));
        }
        if self.max_depth == Some(0) {
            return Err(MlError::invalid_parameter("max_depth", 0, "must be at least 1"));
        }
        if let MaxFeatures::Fraction(f) = self.max_features {
            if !(f > 0.0 && f <= 1.0) {
                return Err(MlError::invalid_parameter(
                    "max_features",
                    f,
                    "fraction must be in (0, 1]",
                ));
            }
        }
        Ok(())
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        validate_fit_input(x, y)?;
        self.validate_params()?;

        if self.criterion == Criterion::Poisson {
            if y.iter().any(|&v| v < 0.0) {
                return Err(MlError::ValidationError(
                    "poisson criterion requires non-negative labels".to_string(),
                ));
            }
            if y.sum() <= 0.0 {
                return Err(MlError::ValidationError(
                    "poisson criterion requires labels with a positive sum".to_string(),
                ));
            }
        }

        let n_features = x.ncols();
        let rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let mut builder = TreeBuilder {
            x,
            y,
            criterion: self.criterion,
            splitter: self.splitter,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features.resolve(n_features),
            rng,
            importances: vec![0.0; n_features],
            n_leaves: 0,
        };

        let root = builder.build((0..x.nrows()).collect(), 0);

        let mut importances = builder.importances;
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }

        self.n_leaves = builder.n_leaves;
        self.root = Some(root);
        self.n_features = n_features;
        self.feature_importances = Some(Array1::from_vec(importances));
        Ok(self)
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(MlError::ModelNotFitted)?;
        validate_predict_input(x, self.n_features)?;

        Ok(x.outer_iter()
            .map(|row| Self::leaf_for(root, row).0)
            .collect())
    }

    /// Leaf index reached by each row
    pub fn apply(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let root = self.root.as_ref().ok_or(MlError::ModelNotFitted)?;
        validate_predict_input(x, self.n_features)?;

        Ok(x.outer_iter()
            .map(|row| Self::leaf_for(root, row).1)
            .collect())
    }

    fn leaf_for(node: &TreeNode, row: ArrayView1<f64>) -> (f64, usize) {
        let mut node = node;
        loop {
            match node {
                TreeNode::Leaf { value, leaf_id, .. } => return (*value, *leaf_id),
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if row[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    /// Replace leaf values; `update` receives the leaf id and current value
    pub(crate) fn update_leaves(&mut self, update: &mut dyn FnMut(usize, f64) -> f64) {
        fn walk(node: &mut TreeNode, update: &mut dyn FnMut(usize, f64) -> f64) {
            match node {
                TreeNode::Leaf { value, leaf_id, .. } => *value = update(*leaf_id, *value),
                TreeNode::Split { left, right, .. } => {
                    walk(left, update);
                    walk(right, update);
                }
            }
        }
        if let Some(root) = self.root.as_mut() {
            walk(root, update);
        }
    }

    /// Get R² score
    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        Regressor::score(self, x, y)
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        self.n_leaves
    }

    /// Get tree depth (a single leaf has depth 0)
    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }
}

impl Regressor for DecisionTreeRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        DecisionTreeRegressor::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        DecisionTreeRegressor::predict(self, x)
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    /// Criterion-specific ranking value, higher is better
    score: f64,
    /// Parent impurity minus weighted child impurity
    improvement: f64,
}

/// Mutable state while growing one tree
struct TreeBuilder<'a> {
    x: &'a Array2<f64>,
    y: &'a Array1<f64>,
    criterion: Criterion,
    splitter: Splitter,
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    max_features: usize,
    rng: ChaCha8Rng,
    importances: Vec<f64>,
    n_leaves: usize,
}

impl<'a> TreeBuilder<'a> {
    fn build(&mut self, indices: Vec<usize>, depth: usize) -> TreeNode {
        let n_samples = indices.len();
        let ys: Vec<f64> = indices.iter().map(|&i| self.y[i]).collect();

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || is_constant(&ys);

        if should_stop {
            return self.leaf(&ys);
        }

        let impurity = node_impurity(self.criterion, &ys);
        let Some(split) = self.find_split(&indices, impurity) else {
            return self.leaf(&ys);
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.x[[i, split.feature_idx]] <= split.threshold);

        self.importances[split.feature_idx] += n_samples as f64 * split.improvement;

        let left = Box::new(self.build(left_indices, depth + 1));
        let right = Box::new(self.build(right_indices, depth + 1));

        TreeNode::Split {
            feature_idx: split.feature_idx,
            threshold: split.threshold,
            left,
            right,
            n_samples,
            impurity,
        }
    }

    fn leaf(&mut self, ys: &[f64]) -> TreeNode {
        let leaf_id = self.n_leaves;
        self.n_leaves += 1;
        TreeNode::Leaf {
            value: leaf_value(self.criterion, ys),
            n_samples: ys.len(),
            leaf_id,
        }
    }

    /// Examine `max_features` features at a time, in random order when
    /// sampling, until some feature yields a valid split.
    fn find_split(&mut self, indices: &[usize], parent_impurity: f64) -> Option<SplitCandidate> {
        let n_features = self.x.ncols();
        let mut features: Vec<usize> = (0..n_features).collect();
        if self.max_features < n_features {
            features.shuffle(&mut self.rng);
        }

        for chunk in features.chunks(self.max_features) {
            let thresholds: Vec<Option<f64>> = match self.splitter {
                Splitter::Best => vec![None; chunk.len()],
                Splitter::Random => chunk
                    .iter()
                    .map(|&f| self.draw_threshold(f, indices))
                    .collect(),
            };

            let this = &*self;
            let results: Vec<Option<SplitCandidate>> = chunk
                .par_iter()
                .zip(thresholds.into_par_iter())
                .map(|(&feature_idx, threshold)| match this.splitter {
                    Splitter::Best => this.best_split_for_feature(feature_idx, indices, parent_impurity),
                    Splitter::Random => threshold.and_then(|t| {
                        this.evaluate_threshold(feature_idx, t, indices, parent_impurity)
                    }),
                })
                .collect();

            let mut best: Option<SplitCandidate> = None;
            for candidate in results.into_iter().flatten() {
                if best.map_or(true, |b| candidate.score > b.score) {
                    best = Some(candidate);
                }
            }
            if best.is_some() {
                return best;
            }
        }
        None
    }

    fn draw_threshold(&mut self, feature_idx: usize, indices: &[usize]) -> Option<f64> {
        let (min, max) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
            let v = self.x[[i, feature_idx]];
            (lo.min(v), hi.max(v))
        });
        if min < max {
            Some(self.rng.gen_range(min..max))
        } else {
            None
        }
    }

    fn best_split_for_feature(
        &self,
        feature_idx: usize,
        indices: &[usize],
        parent_impurity: f64,
    ) -> Option<SplitCandidate> {
        let mut pairs: Vec<(f64, f64)> = indices
            .iter()
            .map(|&i| (self.x[[i, feature_idx]], self.y[i]))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = pairs.len();
        if pairs[0].0 == pairs[n - 1].0 {
            return None;
        }

        let ys: Vec<f64> = pairs.iter().map(|p| p.1).collect();
        let total = SideStats::from_values(&ys);
        let mut left = SideStats::default();
        let mut best: Option<SplitCandidate> = None;

        for pos in 1..n {
            left.push(ys[pos - 1]);
            if pairs[pos - 1].0 == pairs[pos].0 {
                continue;
            }
            let n_left = pos;
            let n_right = n - pos;
            if n_left < self.min_samples_leaf || n_right < self.min_samples_leaf {
                continue;
            }

            let right = total.minus(&left);
            let scored = match self.criterion {
                Criterion::AbsoluteError => {
                    let weighted = (n_left as f64 * mean_abs_deviation(&ys[..pos])
                        + n_right as f64 * mean_abs_deviation(&ys[pos..]))
                        / n as f64;
                    let improvement = parent_impurity - weighted;
                    Some((improvement, improvement))
                }
                criterion => score_from_stats(criterion, parent_impurity, &left, &right),
            };

            let Some((score, improvement)) = scored else {
                continue;
            };
            if score > MIN_GAIN && best.map_or(true, |b| score > b.score) {
                let lo = pairs[pos - 1].0;
                let hi = pairs[pos].0;
                let mut threshold = (lo + hi) / 2.0;
                if threshold >= hi {
                    threshold = lo;
                }
                best = Some(SplitCandidate {
                    feature_idx,
                    threshold,
                    score,
                    improvement,
                });
            }
        }

        best
    }

    fn evaluate_threshold(
        &self,
        feature_idx: usize,
        threshold: f64,
        indices: &[usize],
        parent_impurity: f64,
    ) -> Option<SplitCandidate> {
        let (left, right): (Vec<f64>, Vec<f64>) = {
            let mut left = Vec::new();
            let mut right = Vec::new();
            for &i in indices {
                if self.x[[i, feature_idx]] <= threshold {
                    left.push(self.y[i]);
                } else {
                    right.push(self.y[i]);
                }
            }
            (left, right)
        };

        if left.len() < self.min_samples_leaf || right.len() < self.min_samples_leaf {
            return None;
        }

        let (score, improvement) = match self.criterion {
            Criterion::AbsoluteError => {
                let n = (left.len() + right.len()) as f64;
                let weighted = (left.len() as f64 * mean_abs_deviation(&left)
                    + right.len() as f64 * mean_abs_deviation(&right))
                    / n;
                let improvement = parent_impurity - weighted;
                (improvement, improvement)
            }
            criterion => score_from_stats(
                criterion,
                parent_impurity,
                &SideStats::from_values(&left),
                &SideStats::from_values(&right),
            )?,
        };

        (score > MIN_GAIN).then_some(SplitCandidate {
            feature_idx,
            threshold,
            score,
            improvement,
        })
    }
}

/// Running sums of one side of a split
#[derive(Debug, Clone, Copy, Default)]
struct SideStats {
    count: usize,
    sum: f64,
    sq_sum: f64,
    /// Sum of y * ln(y), zero terms for y == 0
    ylny_sum: f64,
}

impl SideStats {
    fn from_values(values: &[f64]) -> Self {
        let mut stats = Self::default();
        for &v in values {
            stats.push(v);
        }
        stats
    }

    fn push(&mut self, v: f64) {
        self.count += 1;
        self.sum += v;
        self.sq_sum += v * v;
        if v > 0.0 {
            self.ylny_sum += v * v.ln();
        }
    }

    fn minus(&self, other: &Self) -> Self {
        Self {
            count: self.count - other.count,
            sum: self.sum - other.sum,
            sq_sum: self.sq_sum - other.sq_sum,
            ylny_sum: self.ylny_sum - other.ylny_sum,
        }
    }

    fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }

    fn variance(&self) -> f64 {
        let n = self.count as f64;
        (self.sq_sum / n - (self.sum / n).powi(2)).max(0.0)
    }

    /// Half Poisson deviance per sample around the side mean
    fn poisson_deviance(&self) -> f64 {
        let n = self.count as f64;
        (self.ylny_sum - self.sum * self.mean().ln()) / n
    }
}

/// (score, improvement) for the criteria computable from running sums.
/// `None` marks a split the criterion does not allow.
fn score_from_stats(
    criterion: Criterion,
    parent_impurity: f64,
    left: &SideStats,
    right: &SideStats,
) -> Option<(f64, f64)> {
    let n_left = left.count as f64;
    let n_right = right.count as f64;
    let n = n_left + n_right;

    match criterion {
        Criterion::SquaredError => {
            let weighted = (n_left * left.variance() + n_right * right.variance()) / n;
            let improvement = parent_impurity - weighted;
            Some((improvement, improvement))
        }
        Criterion::FriedmanMse => {
            let weighted = (n_left * left.variance() + n_right * right.variance()) / n;
            let diff = left.mean() - right.mean();
            let score = n_left * n_right / n * diff * diff;
            Some((score, parent_impurity - weighted))
        }
        Criterion::Poisson => {
            if left.sum <= f64::EPSILON || right.sum <= f64::EPSILON {
                return None;
            }
            let weighted =
                (n_left * left.poisson_deviance() + n_right * right.poisson_deviance()) / n;
            let improvement = parent_impurity - weighted;
            Some((improvement, improvement))
        }
        Criterion::AbsoluteError => None,
    }
}

fn node_impurity(criterion: Criterion, ys: &[f64]) -> f64 {
    if ys.is_empty() {
        return 0.0;
    }
    match criterion {
        Criterion::SquaredError | Criterion::FriedmanMse => SideStats::from_values(ys).variance(),
        Criterion::AbsoluteError => mean_abs_deviation(ys),
        Criterion::Poisson => {
            let stats = SideStats::from_values(ys);
            if stats.sum <= 0.0 {
                0.0
            } else {
                stats.poisson_deviance()
            }
        }
    }
}

fn leaf_value(criterion: Criterion, ys: &[f64]) -> f64 {
    if ys.is_empty() {
        return 0.0;
    }
    match criterion {
        Criterion::AbsoluteError => median(ys),
        _ => ys.iter().sum::<f64>() / ys.len() as f64,
    }
}

fn is_constant(ys: &[f64]) -> bool {
    ys.windows(2).all(|w| w[0] == w[1])
}

/// Median; midpoint of the two central values for even counts
pub(crate) fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n == 0 {
        0.0
    } else if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Mean absolute deviation from the median
fn mean_abs_deviation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut buffer = values.to_vec();
    let mid = buffer.len() / 2;
    let (_, m, _) = buffer.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    let m = *m;
    values.iter().map(|v| (v - m).abs()).sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn step_data() -> (Array2<f64>, Array1<f64>) {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![1.0, 1.0, 1.0, 5.0, 5.0, 5.0];
        (x, y)
    }

    #[test]
    fn test_regressor_simple() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut tree = DecisionTreeRegressor::new().with_criterion(Criterion::SquaredError);
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        let mse: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / y.len() as f64;

        assert!(mse < 1e-12, "unlimited tree should memorize the data, MSE {}", mse);
    }

    #[test]
    fn test_every_criterion_finds_the_step() {
        let (x, y) = step_data();
        for criterion in [
            Criterion::SquaredError,
            Criterion::FriedmanMse,
            Criterion::AbsoluteError,
            Criterion::Poisson,
        ] {
            let mut tree = DecisionTreeRegressor::new()
                .with_criterion(criterion)
                .with_max_depth(1);
            tree.fit(&x, &y).unwrap();

            let predictions = tree.predict(&x).unwrap();
            assert_eq!(predictions, y, "criterion {:?}", criterion);
            assert_eq!(tree.get_n_leaves(), 2);
        }
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![0.0, 1.0, 2.0, 3.0];

        let mut tree = DecisionTreeRegressor::new().with_max_depth(1);
        tree.fit(&x, &y).unwrap();

        assert!(tree.get_depth() <= 1);
    }

    #[test]
    fn test_absolute_error_uses_median_leaves() {
        let x = array![[0.0], [0.0], [0.0]];
        let y = array![1.0, 2.0, 10.0];

        let mut tree = DecisionTreeRegressor::new().with_criterion(Criterion::AbsoluteError);
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.predict(&array![[0.0]]).unwrap()[0], 2.0);
    }

    #[test]
    fn test_poisson_rejects_negative_labels() {
        let x = array![[1.0], [2.0]];
        let y = array![-1.0, 2.0];
        let mut tree = DecisionTreeRegressor::new().with_criterion(Criterion::Poisson);
        assert!(tree.fit(&x, &y).is_err());
    }

    #[test]
    fn test_random_splitter_is_seeded() {
        let x = array![[1.0, 4.0], [2.0, 3.0], [3.0, 2.0], [4.0, 1.0], [5.0, 0.0], [6.0, 9.0]];
        let y = array![1.0, 3.0, 2.0, 5.0, 4.0, 6.0];

        let fit = || {
            let mut tree = DecisionTreeRegressor::new()
                .with_splitter(Splitter::Random)
                .with_max_features(MaxFeatures::Sqrt)
                .with_max_depth(3)
                .with_random_state(7);
            tree.fit(&x, &y).unwrap();
            tree.predict(&x).unwrap()
        };

        assert_eq!(fit(), fit());
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTreeRegressor::new();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn test_apply_and_update_leaves() {
        let (x, y) = step_data();
        let mut tree = DecisionTreeRegressor::new().with_max_depth(1);
        tree.fit(&x, &y).unwrap();

        let leaves = tree.apply(&x).unwrap();
        assert!(leaves.iter().all(|&id| id < tree.get_n_leaves()));
        assert_ne!(leaves[0], leaves[5]);

        tree.update_leaves(&mut |_, value| value * 2.0);
        assert_eq!(tree.predict(&array![[1.0]]).unwrap()[0], 2.0);
    }

    #[test]
    fn test_predict_before_fit() {
        let tree = DecisionTreeRegressor::new();
        assert!(matches!(
            tree.predict(&array![[1.0]]),
            Err(MlError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_feature_count_mismatch() {
        let (x, y) = step_data();
        let mut tree = DecisionTreeRegressor::new();
        tree.fit(&x, &y).unwrap();
        assert!(tree.predict(&array![[1.0, 2.0]]).is_err());
    }

    #[test]
    fn test_parse_parameters() {
        assert_eq!("friedman_mse".parse::<Criterion>().unwrap(), Criterion::FriedmanMse);
        assert_eq!("random".parse::<Splitter>().unwrap(), Splitter::Random);
        assert_eq!("None".parse::<MaxFeatures>().unwrap(), MaxFeatures::All);
        assert!("gini".parse::<Criterion>().is_err());
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::Sqrt.resolve(19), 4);
        assert_eq!(MaxFeatures::Log2.resolve(19), 4);
        assert_eq!(MaxFeatures::Log2.resolve(1), 1);
        assert_eq!(MaxFeatures::All.resolve(19), 19);
    }
}
