//! Randomized hyperparameter search with k-fold cross-validation

use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use std::time::Instant;
use tracing::{debug, info};

use super::search_space::{SearchSpace, TrialParams};
use crate::error::{MlError, Result};
use crate::training::cross_validation::{cross_val_score, CVResults, CrossValidator};
use crate::training::Regressor;

/// Cross-validated outcome of one sampled configuration
#[derive(Debug, Clone, Serialize)]
pub struct CandidateResult {
    pub params: TrialParams,
    /// R² per fold; NaN where the fit failed
    pub split_scores: Vec<f64>,
    pub mean_test_score: f64,
    pub std_test_score: f64,
    /// 1 is best; failed candidates share the last rank
    pub rank: usize,
    /// Mean seconds per fold, fit and score included
    pub mean_fit_time: f64,
}

/// Full record of one search
#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub candidates: Vec<CandidateResult>,
    pub best_index: usize,
    pub best_params: TrialParams,
    pub best_score: f64,
}

impl SearchResults {
    /// Rank candidates by mean fold score, highest first.
    ///
    /// Ties keep sampling order, and NaN means rank below every finite score.
    fn from_candidates(mut candidates: Vec<CandidateResult>) -> Result<Self> {
        let mut order: Vec<usize> = (0..candidates.len()).collect();
        order.sort_by(|&a, &b| {
            compare_scores(candidates[a].mean_test_score, candidates[b].mean_test_score)
        });

        let best_index = match order.first() {
            Some(&idx) if candidates[idx].mean_test_score.is_finite() => idx,
            _ => {
                return Err(MlError::TrainingError(format!(
                    "all {} candidates failed to fit",
                    candidates.len()
                )))
            }
        };

        let n_finite = candidates
            .iter()
            .filter(|c| c.mean_test_score.is_finite())
            .count();
        let scores: Vec<f64> = candidates.iter().map(|c| c.mean_test_score).collect();
        for (candidate, &score) in candidates.iter_mut().zip(&scores) {
            candidate.rank = if score.is_finite() {
                1 + scores.iter().filter(|s| s.is_finite() && **s > score).count()
            } else {
                n_finite + 1
            };
        }

        Ok(Self {
            best_params: candidates[best_index].params.clone(),
            best_score: candidates[best_index].mean_test_score,
            best_index,
            candidates,
        })
    }
}

/// Descending by score with non-finite values last
fn compare_scores(a: f64, b: f64) -> Ordering {
    match (a.is_finite(), b.is_finite()) {
        (true, true) => b.total_cmp(&a),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => Ordering::Equal,
    }
}

/// A search's refitted winner together with its record
#[derive(Debug, Clone)]
pub struct SearchOutcome<R> {
    pub best_estimator: R,
    pub results: SearchResults,
}

/// Randomized search over a [`SearchSpace`]
#[derive(Debug, Clone)]
pub struct RandomizedSearch {
    n_iter: usize,
    cv: usize,
    random_state: Option<u64>,
}

impl Default for RandomizedSearch {
    fn default() -> Self {
        Self::new(30, 5)
    }
}

impl RandomizedSearch {
    pub fn new(n_iter: usize, cv: usize) -> Self {
        Self {
            n_iter,
            cv,
            random_state: Some(42),
        }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    pub fn cv(&self) -> usize {
        self.cv
    }

    /// Sample candidates, score each with k-fold cross-validation, then refit
    /// the best one on all of `x`.
    pub fn fit<R, F>(
        &self,
        space: &SearchSpace,
        factory: F,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<SearchOutcome<R>>
    where
        R: Regressor,
        F: Fn(&TrialParams) -> Result<R> + Sync,
    {
        if self.n_iter == 0 {
            return Err(MlError::invalid_parameter("n_iter", 0, "must be at least 1"));
        }

        let mut rng = match self.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };
        let sampled = space.sample_candidates(self.n_iter, &mut rng);
        let splits = CrossValidator::k_fold(self.cv).split(x.nrows())?;

        debug!(
            n_candidates = sampled.len(),
            n_folds = splits.len(),
            "evaluating candidates"
        );

        let candidates: Vec<CandidateResult> = sampled
            .into_par_iter()
            .map(|params| {
                let start = Instant::now();
                let scores = cross_val_score(|| factory(&params), x, y, &splits);
                let elapsed = start.elapsed().as_secs_f64();
                let cv_results = CVResults::from_scores(scores);
                debug!(params = ?params, score = cv_results.mean_score, "candidate scored");

                CandidateResult {
                    params,
                    mean_test_score: cv_results.mean_score,
                    std_test_score: cv_results.std_score,
                    split_scores: cv_results.scores,
                    rank: 0,
                    mean_fit_time: elapsed / cv_results.n_folds.max(1) as f64,
                }
            })
            .collect();

        let results = SearchResults::from_candidates(candidates)?;

        let mut best_estimator = factory(&results.best_params)?;
        best_estimator.fit(x, y)?;

        info!(
            best_score = results.best_score,
            best_index = results.best_index,
            "search finished"
        );

        Ok(SearchOutcome {
            best_estimator,
            results,
        })
    }
}
