//! Persistence of stage artifacts.

use crate::errors::PipelineError;
use crate::pipeline::StageSpec;
use std::path::{Path, PathBuf};

/// Writes one file per stage under an output directory.
#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    /// Creates a store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the output directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves where a stage's artifact lives. Absolute paths are kept.
    #[must_use]
    pub fn resolve(&self, spec: &StageSpec) -> PathBuf {
        if spec.output_path.is_absolute() {
            spec.output_path.clone()
        } else {
            self.root.join(&spec.output_path)
        }
    }

    /// Writes a stage's content, creating parent directories as needed.
    ///
    /// Files left over from earlier runs are replaced.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Persist`] if the file cannot be written.
    pub fn persist(&self, spec: &StageSpec, content: &str) -> Result<PathBuf, PipelineError> {
        let path = self.resolve(spec);
        let to_error = |source| PipelineError::Persist {
            stage: spec.id.clone(),
            action: "write",
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(to_error)?;
            }
        }
        std::fs::write(&path, content).map_err(to_error)?;

        tracing::debug!(stage = %spec.id, path = %path.display(), bytes = content.len(), "Persisted stage result");
        Ok(path)
    }

    /// Reads a previously persisted artifact.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Persist`] if the file cannot be read.
    pub fn load(&self, spec: &StageSpec) -> Result<String, PipelineError> {
        let path = self.resolve(spec);
        std::fs::read_to_string(&path).map_err(|source| PipelineError::Persist {
            stage: spec.id.clone(),
            action: "read",
            path,
            source,
        })
    }
}
