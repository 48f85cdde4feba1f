//! Model training module
//!
//! Provides the regressors the model search chooses between:
//! - Ordinary least squares linear regression
//! - CART decision trees and Random Forests
//! - Gradient boosting with robust losses
//! - AdaBoost.R2
//!
//! plus k-fold cross-validation, regression metrics and the estimator registry.

mod models;
pub mod adaboost;
pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod linear_models;
pub mod random_forest;
pub mod registry;

pub use adaboost::{AdaBoostLoss, AdaBoostRegressor};
pub use cross_validation::{cross_val_score, CVResults, CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{Criterion, DecisionTreeRegressor, MaxFeatures, Splitter, TreeNode};
pub use gradient_boosting::{BoostingLoss, GradientBoostingConfig, GradientBoostingRegressor};
pub use linear_models::LinearRegression;
pub use models::{
    mean_absolute_error, mean_squared_error, r2_score, root_mean_squared_error,
    RegressionMetrics, Regressor,
};
pub use random_forest::RandomForestRegressor;
pub use registry::{Estimator, EstimatorFactory, EstimatorRegistry, RegistryEntry, ESTIMATOR_SEED};
