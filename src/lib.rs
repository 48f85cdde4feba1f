//! mlops-pipeline - file-based training pipeline for student exam scores
//!
//! The pipeline reads a tabular dataset of student attributes, learns a
//! regressor for the math score, and serves single-row predictions:
//! - Ingestion splits the raw data into train and test partitions
//! - Transformation fits a column transformer and persists it
//! - Model search tunes every registered regressor by randomized search
//!   under k-fold cross-validation and persists the chosen one
//! - Prediction reloads both artifacts and scores one student at a time
//!
//! # Modules
//!
//! ## Core
//! - [`error`] - Error types and stage diagnostics
//! - [`schema`] - Dataset column names
//! - [`artifacts`] - Artifact directory layout
//! - [`utils`] - CSV loading and DataFrame to ndarray conversion
//!
//! ## Machine learning
//! - [`preprocessing`] - Imputation, scaling, one-hot encoding
//! - [`training`] - Regressors, cross-validation, the estimator registry
//! - [`optimizer`] - Search spaces and randomized search
//!
//! ## Pipeline
//! - [`components`] - Ingestion, transformation, model search, single-model training
//! - [`pipeline`] - Training and prediction pipelines
//! - [`cli`] - Command-line interface

pub mod error;
pub mod schema;
pub mod artifacts;
pub mod utils;

pub mod preprocessing;
pub mod training;
pub mod optimizer;

pub mod components;
pub mod pipeline;
pub mod cli;

pub use error::{MlError, PipelineError, PipelineResult, Result};
pub use pipeline::{CustomData, PipelineConfig, PredictPipeline, TrainingPipeline};
