//! Estimator registry: the fixed set of regressors the model search tries,
//! each with its hyperparameter space and a factory from sampled parameters.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use super::adaboost::{AdaBoostLoss, AdaBoostRegressor};
use super::decision_tree::{Criterion, DecisionTreeRegressor, MaxFeatures, Splitter};
use super::gradient_boosting::{BoostingLoss, GradientBoostingConfig, GradientBoostingRegressor};
use super::linear_models::LinearRegression;
use super::models::Regressor;
use super::random_forest::RandomForestRegressor;
use crate::artifacts::ensure_parent_dir;
use crate::error::{MlError, Result};
use crate::optimizer::{ParameterValue, SearchSpace, TrialParams};

/// Seed handed to every randomized estimator the registry builds
pub const ESTIMATOR_SEED: u64 = 42;

/// Any estimator the pipeline can train and persist
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "model", rename_all = "snake_case")]
pub enum Estimator {
    LinearRegression(LinearRegression),
    DecisionTree(DecisionTreeRegressor),
    RandomForest(RandomForestRegressor),
    GradientBoosting(GradientBoostingRegressor),
    AdaBoost(AdaBoostRegressor),
}

impl Estimator {
    /// Display name matching the registry entry
    pub fn name(&self) -> &'static str {
        match self {
            Estimator::LinearRegression(_) => "Linear Regression",
            Estimator::DecisionTree(_) => "Decision Tree",
            Estimator::RandomForest(_) => "Random Forest",
            Estimator::GradientBoosting(_) => "Gradient Boosting",
            Estimator::AdaBoost(_) => "AdaBoost Regressor",
        }
    }

    fn as_regressor(&self) -> &dyn Regressor {
        match self {
            Estimator::LinearRegression(m) => m,
            Estimator::DecisionTree(m) => m,
            Estimator::RandomForest(m) => m,
            Estimator::GradientBoosting(m) => m,
            Estimator::AdaBoost(m) => m,
        }
    }

    fn as_regressor_mut(&mut self) -> &mut dyn Regressor {
        match self {
            Estimator::LinearRegression(m) => m,
            Estimator::DecisionTree(m) => m,
            Estimator::RandomForest(m) => m,
            Estimator::GradientBoosting(m) => m,
            Estimator::AdaBoost(m) => m,
        }
    }

    /// Write the estimator as JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        ensure_parent_dir(path)?;
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Read an estimator written by [`Estimator::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

impl Regressor for Estimator {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.as_regressor_mut().fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.as_regressor().predict(x)
    }
}

macro_rules! impl_from_estimator {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Estimator {
                fn from(model: $ty) -> Self {
                    Estimator::$variant(model)
                }
            }
        )*
    };
}

impl_from_estimator! {
    LinearRegression => LinearRegression,
    DecisionTree => DecisionTreeRegressor,
    RandomForest => RandomForestRegressor,
    GradientBoosting => GradientBoostingRegressor,
    AdaBoost => AdaBoostRegressor,
}

/// Builds an unfitted estimator from one sampled configuration
pub type EstimatorFactory = fn(&TrialParams) -> Result<Estimator>;

/// One searchable model
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    name: String,
    search_space: SearchSpace,
    factory: EstimatorFactory,
}

impl RegistryEntry {
    pub fn new(name: impl Into<String>, search_space: SearchSpace, factory: EstimatorFactory) -> Self {
        Self {
            name: name.into(),
            search_space,
            factory,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn search_space(&self) -> &SearchSpace {
        &self.search_space
    }

    /// Instantiate the estimator for `params`
    pub fn build(&self, params: &TrialParams) -> Result<Estimator> {
        (self.factory)(params)
    }
}

/// Ordered, read-only table of searchable models
#[derive(Debug, Clone)]
pub struct EstimatorRegistry {
    entries: Vec<RegistryEntry>,
}

impl Default for EstimatorRegistry {
    fn default() -> Self {
        Self::default_registry()
    }
}

impl EstimatorRegistry {
    pub fn new(entries: Vec<RegistryEntry>) -> Self {
        Self { entries }
    }

    /// The five regressors searched by the training pipeline, in search order
    pub fn default_registry() -> Self {
        let depths = || vec![None, Some(1i64), Some(3), Some(5), Some(7)];
        let criteria = ["squared_error", "friedman_mse", "absolute_error", "poisson"];
        let rates = || vec![0.01, 0.05, 0.1, 0.5, 1.0, 10.0];
        let fractions = || vec![0.7, 0.8, 0.9, 1.0];
        let tree_features = || vec![Some("sqrt"), Some("log2"), None];

        Self::new(vec![
            RegistryEntry::new(
                "Linear Regression",
                SearchSpace::new().boolean("fit_intercept"),
                build_linear_regression,
            ),
            RegistryEntry::new(
                "Decision Tree",
                SearchSpace::new()
                    .categorical("criterion", &criteria)
                    .categorical("splitter", &["best", "random"])
                    .choice("max_features", tree_features())
                    .choice("max_depth", depths()),
                build_decision_tree,
            ),
            RegistryEntry::new(
                "Random Forest",
                SearchSpace::new()
                    .int("n_estimators", 10, 100)
                    .categorical("criterion", &criteria)
                    .choice("max_features", tree_features())
                    .choice("max_depth", depths())
                    .boolean("bootstrap")
                    .choice("max_samples", fractions()),
                build_random_forest,
            ),
            RegistryEntry::new(
                "Gradient Boosting",
                SearchSpace::new()
                    .int("n_estimators", 10, 100)
                    .categorical("loss", &["squared_error", "huber", "absolute_error", "quantile"])
                    .choice("learning_rate", rates())
                    .choice("subsample", fractions())
                    .categorical("criterion", &["squared_error", "friedman_mse"])
                    .categorical("max_features", &["auto", "sqrt", "log2"])
                    .choice("max_depth", depths()),
                build_gradient_boosting,
            ),
            RegistryEntry::new(
                "AdaBoost Regressor",
                SearchSpace::new()
                    .choice("learning_rate", rates())
                    .categorical("loss", &["linear", "square", "exponential"])
                    .int("n_estimators", 10, 100),
                build_adaboost,
            ),
        ])
    }

    /// Keep only the named entries, preserving registry order
    pub fn subset(&self, names: &[&str]) -> Result<Self> {
        if let Some(missing) = names.iter().find(|n| self.get(n).is_none()) {
            return Err(MlError::ConfigError(format!(
                "unknown estimator '{}' in registry subset",
                missing
            )));
        }
        Ok(Self::new(
            self.entries
                .iter()
                .filter(|e| names.contains(&e.name()))
                .cloned()
                .collect(),
        ))
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RegistryEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a EstimatorRegistry {
    type Item = &'a RegistryEntry;
    type IntoIter = std::slice::Iter<'a, RegistryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn wrong_type(name: &str, value: &ParameterValue, expected: &str) -> MlError {
    MlError::invalid_parameter(name, value, &format!("expected {}", expected))
}

fn bool_param(params: &TrialParams, name: &str) -> Result<Option<bool>> {
    params
        .get(name)
        .map(|v| v.as_bool().ok_or_else(|| wrong_type(name, v, "a boolean")))
        .transpose()
}

fn float_param(params: &TrialParams, name: &str) -> Result<Option<f64>> {
    params
        .get(name)
        .map(|v| v.as_float().ok_or_else(|| wrong_type(name, v, "a number")))
        .transpose()
}

fn count_param(params: &TrialParams, name: &str) -> Result<Option<usize>> {
    params
        .get(name)
        .map(|v| match v.as_int() {
            Some(n) if n >= 1 => Ok(n as usize),
            _ => Err(wrong_type(name, v, "a positive integer")),
        })
        .transpose()
}

fn str_param<'a>(params: &'a TrialParams, name: &str) -> Result<Option<&'a str>> {
    params
        .get(name)
        .map(|v| v.as_str().ok_or_else(|| wrong_type(name, v, "a string")))
        .transpose()
}

/// `max_depth`: absent, unlimited (`None`) or a positive depth
fn depth_param(params: &TrialParams, name: &str) -> Result<Option<Option<usize>>> {
    match params.get(name) {
        None => Ok(None),
        Some(ParameterValue::None) => Ok(Some(None)),
        Some(_) => Ok(Some(count_param(params, name)?)),
    }
}

/// `max_features`: absent, every feature (`None`) or a named rule
fn max_features_param(params: &TrialParams) -> Result<Option<MaxFeatures>> {
    match params.get("max_features") {
        None => Ok(None),
        Some(ParameterValue::None) => Ok(Some(MaxFeatures::All)),
        Some(ParameterValue::String(rule)) => Ok(Some(rule.parse()?)),
        Some(ParameterValue::Float(f)) => Ok(Some(MaxFeatures::Fraction(*f))),
        Some(other) => Err(wrong_type("max_features", other, "sqrt, log2, auto or None")),
    }
}

fn build_linear_regression(params: &TrialParams) -> Result<Estimator> {
    let mut model = LinearRegression::new();
    if let Some(fit_intercept) = bool_param(params, "fit_intercept")? {
        model = model.with_fit_intercept(fit_intercept);
    }
    Ok(model.into())
}

fn build_decision_tree(params: &TrialParams) -> Result<Estimator> {
    let mut model = DecisionTreeRegressor::new().with_random_state(ESTIMATOR_SEED);
    if let Some(criterion) = str_param(params, "criterion")? {
        model = model.with_criterion(criterion.parse::<Criterion>()?);
    }
    if let Some(splitter) = str_param(params, "splitter")? {
        model = model.with_splitter(splitter.parse::<Splitter>()?);
    }
    if let Some(max_features) = max_features_param(params)? {
        model = model.with_max_features(max_features);
    }
    if let Some(depth) = depth_param(params, "max_depth")? {
        model = model.with_max_depth(depth);
    }
    Ok(model.into())
}

fn build_random_forest(params: &TrialParams) -> Result<Estimator> {
    let n_estimators = count_param(params, "n_estimators")?.unwrap_or(100);
    let mut model = RandomForestRegressor::new(n_estimators).with_random_state(ESTIMATOR_SEED);
    if let Some(criterion) = str_param(params, "criterion")? {
        model = model.with_criterion(criterion.parse::<Criterion>()?);
    }
    if let Some(max_features) = max_features_param(params)? {
        model = model.with_max_features(max_features);
    }
    if let Some(depth) = depth_param(params, "max_depth")? {
        model = model.with_max_depth(depth);
    }
    if let Some(bootstrap) = bool_param(params, "bootstrap")? {
        model = model.with_bootstrap(bootstrap);
    }
    if let Some(fraction) = float_param(params, "max_samples")? {
        model = model.with_max_samples(fraction);
    }
    Ok(model.into())
}

fn build_gradient_boosting(params: &TrialParams) -> Result<Estimator> {
    let mut config = GradientBoostingConfig::default().with_random_state(ESTIMATOR_SEED);
    if let Some(n) = count_param(params, "n_estimators")? {
        config = config.with_n_estimators(n);
    }
    if let Some(loss) = str_param(params, "loss")? {
        config = config.with_loss(loss.parse::<BoostingLoss>()?);
    }
    if let Some(rate) = float_param(params, "learning_rate")? {
        config = config.with_learning_rate(rate);
    }
    if let Some(subsample) = float_param(params, "subsample")? {
        config = config.with_subsample(subsample);
    }
    if let Some(criterion) = str_param(params, "criterion")? {
        config = config.with_criterion(criterion.parse::<Criterion>()?);
    }
    if let Some(max_features) = max_features_param(params)? {
        config = config.with_max_features(max_features);
    }
    if let Some(depth) = depth_param(params, "max_depth")? {
        config = config.with_max_depth(depth);
    }
    Ok(GradientBoostingRegressor::new(config).into())
}

fn build_adaboost(params: &TrialParams) -> Result<Estimator> {
    let mut model = AdaBoostRegressor::default().with_random_state(ESTIMATOR_SEED);
    if let Some(rate) = float_param(params, "learning_rate")? {
        model = model.with_learning_rate(rate);
    }
    if let Some(loss) = str_param(params, "loss")? {
        model = model.with_loss(loss.parse::<AdaBoostLoss>()?);
    }
    if let Some(n) = count_param(params, "n_estimators")? {
        model = model.with_n_estimators(n);
    }
    Ok(model.into())
}
