//! End-to-end pipelines built from the stages in [`crate::components`]

mod predict;
mod train;

pub use predict::{CustomData, PredictPipeline};
pub use train::{PipelineConfig, TrainingPipeline};
