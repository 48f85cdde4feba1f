//! Error types for the training pipeline
//!
//! Library code (estimators, preprocessing, I/O helpers) reports failures as
//! [`MlError`]. Pipeline stages wrap those failures in a [`PipelineError`] that
//! also records where in the stage the failure was caught.

use std::fmt;
use std::panic::Location;
use thiserror::Error;

/// Result type alias for library operations
pub type Result<T> = std::result::Result<T, MlError>;

/// Result type alias for pipeline stage operations
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Low-level error raised by the estimator and preprocessing library
#[derive(Error, Debug)]
pub enum MlError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Preprocessing error: {0}")]
    PreprocessingError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl MlError {
    /// Shorthand for an [`MlError::InvalidParameter`]
    pub fn invalid_parameter(
        name: impl Into<String>,
        value: impl fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        MlError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<polars::error::PolarsError> for MlError {
    fn from(err: polars::error::PolarsError) -> Self {
        MlError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for MlError {
    fn from(err: serde_json::Error) -> Self {
        MlError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for MlError {
    fn from(err: ndarray::ShapeError) -> Self {
        MlError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

/// Diagnostic error returned by pipeline stages.
///
/// Carries the underlying cause plus the source location of the stage code
/// that caught it.
#[derive(Error, Debug)]
#[error("error occurred in [{}] line [{}]: {source}", .location.file(), .location.line())]
pub struct PipelineError {
    location: &'static Location<'static>,
    #[source]
    source: MlError,
}

impl PipelineError {
    /// Wrap `source`, recording the caller's location
    #[track_caller]
    pub fn new(source: MlError) -> Self {
        Self {
            location: Location::caller(),
            source,
        }
    }

    /// File in which the failure was caught
    pub fn file(&self) -> &'static str {
        self.location.file()
    }

    /// Line at which the failure was caught
    pub fn line(&self) -> u32 {
        self.location.line()
    }

    /// The underlying library error
    pub fn cause(&self) -> &MlError {
        &self.source
    }

    pub fn into_cause(self) -> MlError {
        self.source
    }
}

/// Converts a library result into a stage result, tagging the error with the
/// location of the `.diagnose()` call.
pub trait Diagnose<T> {
    #[track_caller]
    fn diagnose(self) -> PipelineResult<T>;
}

impl<T, E> Diagnose<T> for std::result::Result<T, E>
where
    E: Into<MlError>,
{
    #[track_caller]
    fn diagnose(self) -> PipelineResult<T> {
        match self {
            Ok(value) => Ok(value),
            Err(err) => Err(PipelineError::new(err.into())),
        }
    }
}
