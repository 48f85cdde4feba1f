//! Data ingestion stage: read the raw dataset, split it, and hand the
//! partitions to the artifact store.

use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

use crate::artifacts::{ArtifactStore, DEFAULT_SOURCE_PATH};
use crate::error::{Diagnose, MlError, PipelineResult, Result};
use crate::schema::required_columns;
use crate::utils::{require_columns, take_rows, DataLoader};

/// Where ingestion reads from and writes to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataIngestionConfig {
    pub source_path: PathBuf,
    pub raw_data_path: PathBuf,
    pub train_data_path: PathBuf,
    pub test_data_path: PathBuf,
    /// Fraction of rows held out for testing
    pub test_size: f64,
    pub random_state: u64,
}

impl Default for DataIngestionConfig {
    fn default() -> Self {
        Self::from_store(&ArtifactStore::default(), DEFAULT_SOURCE_PATH)
    }
}

impl DataIngestionConfig {
    /// Paths for reading `source` and writing into `store`
    pub fn from_store(store: &ArtifactStore, source: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source.into(),
            raw_data_path: store.raw_data_path(),
            train_data_path: store.train_data_path(),
            test_data_path: store.test_data_path(),
            test_size: 0.2,
            random_state: 42,
        }
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }
}

/// Shuffle the rows with a seeded permutation and cut off the last
/// `ceil(test_size * N)` rows as the test partition.
pub fn train_test_split(
    df: &DataFrame,
    test_size: f64,
    random_state: u64,
) -> Result<(DataFrame, DataFrame)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(MlError::invalid_parameter(
            "test_size",
            test_size,
            "must be in (0, 1)",
        ));
    }

    let n_samples = df.height();
    let n_test = (test_size * n_samples as f64).ceil() as usize;
    let n_train = n_samples.saturating_sub(n_test);
    if n_train == 0 || n_test == 0 {
        return Err(MlError::DataError(format!(
            "cannot split {} rows with test_size {}: a partition would be empty",
            n_samples, test_size
        )));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(random_state);
    indices.shuffle(&mut rng);

    let (train_idx, test_idx) = indices.split_at(n_train);
    Ok((take_rows(df, train_idx)?, take_rows(df, test_idx)?))
}

/// First pipeline stage
#[derive(Debug, Clone, Default)]
pub struct DataIngestion {
    config: DataIngestionConfig,
}

impl DataIngestion {
    pub fn new(config: DataIngestionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DataIngestionConfig {
        &self.config
    }

    /// Read the dataset, write the raw copy plus the train and test
    /// partitions, and return the train and test paths.
    pub fn initiate_ingestion(&self) -> PipelineResult<(PathBuf, PathBuf)> {
        info!(source = %self.config.source_path.display(), "Starting data ingestion");

        let mut df = DataLoader::load_csv(&self.config.source_path).diagnose()?;
        require_columns(&df, &required_columns()).diagnose()?;
        info!(rows = df.height(), "Read the dataset");

        for path in [
            &self.config.raw_data_path,
            &self.config.train_data_path,
            &self.config.test_data_path,
        ] {
            crate::artifacts::ensure_parent_dir(path).diagnose()?;
        }

        DataLoader::save_csv(&mut df, &self.config.raw_data_path).diagnose()?;
        info!(path = %self.config.raw_data_path.display(), "Saved raw data");

        let (mut train, mut test) =
            train_test_split(&df, self.config.test_size, self.config.random_state).diagnose()?;
        info!(train_rows = train.height(), test_rows = test.height(), "Split the dataset");

        DataLoader::save_csv(&mut train, &self.config.train_data_path).diagnose()?;
        DataLoader::save_csv(&mut test, &self.config.test_data_path).diagnose()?;

        info!("Data ingestion completed");
        Ok((
            self.config.train_data_path.clone(),
            self.config.test_data_path.clone(),
        ))
    }
}
