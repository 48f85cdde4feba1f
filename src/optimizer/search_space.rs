//! Search space definition for hyperparameters

use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Type of parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterType {
    /// Integer parameter drawn uniformly from `low..high` (high excluded)
    Int { low: i64, high: i64 },
    /// Finite list of values
    Choice { values: Vec<ParameterValue> },
}

/// A single hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub param_type: ParameterType,
}

impl Parameter {
    /// Create an integer parameter over `low..high`
    pub fn int(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Int { low, high },
        }
    }

    /// Create a parameter taking one of `values`
    pub fn choice(name: impl Into<String>, values: Vec<ParameterValue>) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Choice { values },
        }
    }

    /// Create a categorical parameter
    pub fn categorical(name: impl Into<String>, choices: &[&str]) -> Self {
        Self::choice(
            name,
            choices.iter().map(|c| ParameterValue::from(*c)).collect(),
        )
    }

    /// Create a boolean parameter
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::choice(name, vec![ParameterValue::Bool(true), ParameterValue::Bool(false)])
    }

    /// Number of values a finite parameter can take; `None` for distributions
    pub fn cardinality(&self) -> Option<usize> {
        match &self.param_type {
            ParameterType::Choice { values } => Some(values.len()),
            _ => None,
        }
    }

    /// Sample a random value
    pub fn sample(&self, rng: &mut impl Rng) -> ParameterValue {
        match &self.param_type {
            ParameterType::Int { low, high } => {
                if high <= low {
                    ParameterValue::Int(*low)
                } else {
                    ParameterValue::Int(rng.gen_range(*low..*high))
                }
            }
            ParameterType::Choice { values } => match values.choose(rng) {
                Some(v) => v.clone(),
                None => ParameterValue::None,
            },
        }
    }
}

/// Sampled parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl ParameterValue {
    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get as int
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParameterValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ParameterValue::None)
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::None => write!(f, "None"),
            ParameterValue::Bool(v) => write!(f, "{}", v),
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::Float(v) => write!(f, "{}", v),
            ParameterValue::String(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        ParameterValue::String(v.to_string())
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        ParameterValue::Int(v)
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        ParameterValue::Float(v)
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        ParameterValue::Bool(v)
    }
}

impl<T: Into<ParameterValue>> From<Option<T>> for ParameterValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(ParameterValue::None, Into::into)
    }
}

/// Sampled configuration, keyed by parameter name
pub type TrialParams = BTreeMap<String, ParameterValue>;

/// Search space for hyperparameter optimization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    parameters: Vec<Parameter>,
}

impl SearchSpace {
    /// Create a new empty search space
    pub fn new() -> Self {
        Self {
            parameters: Vec::new(),
        }
    }

    /// Add a parameter to the search space
    pub fn add(mut self, param: Parameter) -> Self {
        self.parameters.push(param);
        self
    }

    /// Add an integer parameter over `low..high`
    pub fn int(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.add(Parameter::int(name, low, high))
    }

    /// Add a finite list parameter
    pub fn choice<V: Into<ParameterValue>>(self, name: impl Into<String>, values: Vec<V>) -> Self {
        self.add(Parameter::choice(
            name,
            values.into_iter().map(Into::into).collect(),
        ))
    }

    /// Add a categorical parameter
    pub fn categorical(self, name: impl Into<String>, choices: &[&str]) -> Self {
        self.add(Parameter::categorical(name, choices))
    }

    /// Add a boolean parameter
    pub fn boolean(self, name: impl Into<String>) -> Self {
        self.add(Parameter::boolean(name))
    }

    /// Get all parameters
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Get parameter names in order
    pub fn param_names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }

    /// Size of the full grid when every parameter is a finite list
    pub fn grid_size(&self) -> Option<usize> {
        self.parameters
            .iter()
            .try_fold(1usize, |acc, p| p.cardinality().map(|c| acc.saturating_mul(c)))
    }

    /// Grid point `index`, counting with the last parameter varying fastest.
    ///
    /// Only meaningful for fully finite spaces; distribution parameters are skipped.
    pub fn grid_point(&self, mut index: usize) -> TrialParams {
        let mut params = TrialParams::new();
        for param in self.parameters.iter().rev() {
            if let ParameterType::Choice { values } = &param.param_type {
                if values.is_empty() {
                    continue;
                }
                params.insert(param.name.clone(), values[index % values.len()].clone());
                index /= values.len();
            }
        }
        params
    }

    /// Sample a random configuration
    pub fn sample(&self, rng: &mut impl Rng) -> TrialParams {
        self.parameters
            .iter()
            .map(|p| (p.name.clone(), p.sample(rng)))
            .collect()
    }

    /// Draw up to `n_iter` candidates.
    ///
    /// A fully finite space is sampled without replacement, so a grid smaller
    /// than `n_iter` is enumerated completely. Any distribution parameter
    /// switches to `n_iter` independent draws.
    pub fn sample_candidates(&self, n_iter: usize, rng: &mut impl Rng) -> Vec<TrialParams> {
        match self.grid_size() {
            Some(grid_size) => {
                let n = n_iter.min(grid_size);
                rand::seq::index::sample(rng, grid_size, n)
                    .into_iter()
                    .map(|i| self.grid_point(i))
                    .collect()
            }
            None => (0..n_iter).map(|_| self.sample(rng)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_xoshiro::Xoshiro256PlusPlus;
    use std::collections::HashSet;

    #[test]
    fn test_search_space_builder() {
        let space = SearchSpace::new()
            .int("n_estimators", 10, 100)
            .categorical("criterion", &["squared_error", "poisson"])
            .choice("max_depth", vec![None, Some(1i64), Some(3)])
            .boolean("bootstrap");

        assert_eq!(space.len(), 4);
        assert_eq!(space.grid_size(), None);
        assert_eq!(
            space.param_names(),
            vec!["n_estimators", "criterion", "max_depth", "bootstrap"]
        );
    }

    #[test]
    fn test_int_upper_bound_is_excluded() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let param = Parameter::int("n_estimators", 10, 12);
        for _ in 0..200 {
            let v = param.sample(&mut rng).as_int().unwrap();
            assert!(v == 10 || v == 11);
        }
    }

    #[test]
    fn test_small_grid_is_enumerated_completely() {
        let space = SearchSpace::new()
            .boolean("fit_intercept")
            .categorical("splitter", &["best", "random"]);
        assert_eq!(space.grid_size(), Some(4));

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let candidates = space.sample_candidates(30, &mut rng);
        assert_eq!(candidates.len(), 4);

        let distinct: HashSet<String> = candidates
            .iter()
            .map(|c| serde_json::to_string(c).unwrap())
            .collect();
        assert_eq!(distinct.len(), 4);
    }

    #[test]
    fn test_large_grid_is_sampled_without_replacement() {
        let space = SearchSpace::new()
            .choice("a", (0..10).map(|i| i as i64).collect::<Vec<_>>())
            .choice("b", (0..10).map(|i| i as i64).collect::<Vec<_>>());

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let candidates = space.sample_candidates(30, &mut rng);
        assert_eq!(candidates.len(), 30);

        let distinct: HashSet<(i64, i64)> = candidates
            .iter()
            .map(|c| (c["a"].as_int().unwrap(), c["b"].as_int().unwrap()))
            .collect();
        assert_eq!(distinct.len(), 30);
    }

    #[test]
    fn test_distribution_space_draws_n_iter() {
        let space = SearchSpace::new().int("n_estimators", 10, 100).boolean("bootstrap");
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        assert_eq!(space.sample_candidates(7, &mut rng).len(), 7);
    }

    #[test]
    fn test_parameter_value_json() {
        let mut params = TrialParams::new();
        params.insert("max_depth".to_string(), ParameterValue::None);
        params.insert("n_estimators".to_string(), ParameterValue::Int(10));
        params.insert("subsample".to_string(), ParameterValue::Float(0.5));

        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"max_depth":null,"n_estimators":10,"subsample":0.5}"#);

        let back: TrialParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }
}
