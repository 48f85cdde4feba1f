//! Data preprocessing module
//!
//! Provides the feature preprocessing used by the training and prediction
//! pipelines:
//! - Missing value imputation (mean, median, most frequent, constant)
//! - Feature scaling (standard, min-max)
//! - One-hot encoding of categorical columns
//! - A column transformer combining per-column-group pipelines

mod config;
mod encoder;
mod imputer;
mod pipeline;
mod scaler;

pub use config::PreprocessingConfig;
pub use encoder::{HandleUnknown, OneHotEncoder};
pub use imputer::{ImputeStrategy, Imputer};
pub use pipeline::ColumnTransformer;
pub use scaler::{Scaler, ScalerType};
