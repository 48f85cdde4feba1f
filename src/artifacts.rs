//! Artifact store: the shared directory through which pipeline stages hand
//! data to each other.

use crate::error::Result;
use std::path::{Path, PathBuf};

/// Default artifact directory, relative to the working directory
pub const DEFAULT_ARTIFACT_DIR: &str = "artifacts";

/// Default location of the raw dataset
pub const DEFAULT_SOURCE_PATH: &str = "notebook/data/stud.csv";

/// Filesystem layout of the artifacts written by the pipeline.
///
/// Every stage derives its paths from the same root, so a stage finds the
/// previous stage's output by name alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl Default for ArtifactStore {
    fn default() -> Self {
        Self::new(DEFAULT_ARTIFACT_DIR)
    }
}

impl ArtifactStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn raw_data_path(&self) -> PathBuf {
        self.root.join("raw_data.csv")
    }

    #[must_use]
    pub fn train_data_path(&self) -> PathBuf {
        self.root.join("train_data.csv")
    }

    #[must_use]
    pub fn test_data_path(&self) -> PathBuf {
        self.root.join("test_data.csv")
    }

    #[must_use]
    pub fn preprocessor_path(&self) -> PathBuf {
        self.root.join("preprocessor.json")
    }

    #[must_use]
    pub fn regressor_path(&self) -> PathBuf {
        self.root.join("regressor.json")
    }

    #[must_use]
    pub fn metrics_path(&self) -> PathBuf {
        self.root.join("metrics.csv")
    }

    #[must_use]
    pub fn search_results_path(&self) -> PathBuf {
        self.root.join("search_results.json")
    }

    /// Create the artifact directory if it does not exist yet
    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }
}

/// Create the parent directory of `path`, if it has one
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
