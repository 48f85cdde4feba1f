//! Pipeline stages
//!
//! Each stage owns an immutable config and hands its output to the next one
//! through the artifact store:
//! - [`DataIngestion`] splits the raw dataset
//! - [`DataTransformation`] fits and applies the column transformer
//! - [`ModelSearch`] searches the estimator registry
//! - [`ModelTrainer`] fits the single linear model instead of searching

mod ingestion;
mod model_search;
mod model_trainer;
mod transformation;

pub use ingestion::{train_test_split, DataIngestion, DataIngestionConfig};
pub use model_search::{ModelScore, ModelSearch, ModelSearchConfig, ModelSearchReport, PersistPolicy};
pub use model_trainer::{ModelTrainer, ModelTrainerConfig, TrainingMetrics};
pub use transformation::{DataTransformation, DataTransformationConfig};
