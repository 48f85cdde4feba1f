//! Hyperparameter optimization module
//!
//! Search spaces mixing finite lists with integer and float distributions,
//! and a seeded randomized search scored by k-fold cross-validation.

mod random_search;
mod search_space;

pub use random_search::{CandidateResult, RandomizedSearch, SearchOutcome, SearchResults};
pub use search_space::{Parameter, ParameterType, ParameterValue, SearchSpace, TrialParams};
