//! Error types for sessionflow.
//!
//! Build-time problems (bad stage tables) surface as
//! [`PipelineValidationError`] carrying a [`ContractErrorInfo`]; run-time
//! problems surface as [`PipelineError`]. Every run-time error is fatal to
//! the run: there is no partial-success model.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for pipeline runs.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The stage table failed validation.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// The transcript could not be loaded.
    #[error("{0}")]
    Transcript(#[from] TranscriptError),

    /// The backend failed while generating a stage's result.
    #[error("Backend failed for stage '{stage}': {source}")]
    Backend {
        /// The stage being generated.
        stage: String,
        /// The underlying backend error.
        #[source]
        source: BackendError,
    },

    /// A backend response broke the stage's output contract.
    #[error("{0}")]
    ContractViolation(#[from] ContractViolation),

    /// A stage result was recorded twice in one run.
    #[error("{0}")]
    OutputConflict(#[from] OutputConflictError),

    /// A stage was reached before one of its dependencies had a result.
    #[error("Stage '{stage}' has no result for dependency '{dependency}'")]
    MissingDependencyResult {
        /// The stage being prepared.
        stage: String,
        /// The dependency without a result.
        dependency: String,
    },

    /// Writing or reading a stage artifact failed.
    #[error("Failed to {action} '{}' for stage '{stage}': {source}", path.display())]
    Persist {
        /// The stage whose artifact was involved.
        stage: String,
        /// "write" or "read".
        action: &'static str,
        /// The artifact path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "CONTRACT-004-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Fills the fix hint from [`ContractSuggestions`] for this code.
    #[must_use]
    pub fn with_suggested_fix(mut self) -> Self {
        if let Some(hint) = ContractSuggestions::get(&self.code) {
            self.fix_hint = Some(hint.to_string());
        }
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when pipeline validation fails.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the contract error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

/// Error raised when a cycle is detected in the stage graph.
#[derive(Debug, Clone, Error)]
#[error("Cycle detected in pipeline: {}", cycle_path.join(" -> "))]
pub struct CycleDetectedError {
    /// The path of stages forming the cycle.
    pub cycle_path: Vec<String>,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(cycle_path: Vec<String>) -> Self {
        let info = ContractErrorInfo::new(
            "CONTRACT-004-CYCLE",
            format!("Pipeline contains a dependency cycle: {}", cycle_path.join(" -> ")),
        )
        .with_suggested_fix();

        Self {
            cycle_path,
            error_info: info,
        }
    }
}

impl From<CycleDetectedError> for PipelineValidationError {
    fn from(err: CycleDetectedError) -> Self {
        Self {
            message: err.to_string(),
            stages: err.cycle_path.clone(),
            error_info: Some(err.error_info),
        }
    }
}

/// Error raised when a stage result is recorded twice in one run.
#[derive(Debug, Clone, Error)]
#[error("Output conflict for stage '{stage}': {message}")]
pub struct OutputConflictError {
    /// The stage name.
    pub stage: String,
    /// Additional message.
    pub message: String,
}

impl OutputConflictError {
    /// Creates a new output conflict error.
    #[must_use]
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

/// Error raised when a backend response does not honour the stage contract.
#[derive(Debug, Clone, Error)]
#[error("Stage '{stage}' returned output that breaks its contract: {reason}")]
pub struct ContractViolation {
    /// The offending stage.
    pub stage: String,
    /// What was wrong with the response.
    pub reason: String,
}

impl ContractViolation {
    /// Creates a new contract violation.
    #[must_use]
    pub fn new(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            reason: reason.into(),
        }
    }
}

/// Errors loading the transcript.
#[derive(Debug, Error)]
pub enum TranscriptError {
    /// The transcript file does not exist.
    #[error("Transcript not found: {}", path.display())]
    NotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// The transcript could not be read.
    #[error("Failed to read transcript {}: {source}", path.display())]
    Read {
        /// The path being read.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The transcript has no content.
    #[error("Transcript is empty")]
    Empty,
}

/// Errors from the text-generation backend.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The backend could not be reached.
    #[error("Backend unreachable at {endpoint}")]
    Unreachable {
        /// The endpoint that refused the connection.
        endpoint: String,
    },

    /// The request timed out.
    #[error("Backend request timed out after {seconds}s")]
    Timeout {
        /// The configured timeout.
        seconds: u64,
    },

    /// The backend answered with a non-success status.
    #[error("Backend returned status {code}: {body}")]
    Status {
        /// HTTP status code.
        code: u16,
        /// Response body, as returned.
        body: String,
    },

    /// The backend answered with a body that could not be decoded.
    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),

    /// Any other HTTP client failure.
    #[error("HTTP client error: {0}")]
    Http(String),
}

/// Invalid configuration values.
#[derive(Debug, Clone, Error)]
#[error("Invalid configuration for '{field}': {message}")]
pub struct ConfigError {
    /// The offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Provides default suggestions for common contract error codes.
pub struct ContractSuggestions;

impl ContractSuggestions {
    /// Gets a suggestion for a given error code.
    #[must_use]
    pub fn get(code: &str) -> Option<&'static str> {
        match code {
            "CONTRACT-004-CYCLE" => Some(
                "Check your stage dependencies for circular references. \
                 A stage may only consume results of stages that can finish before it.",
            ),
            "CONTRACT-004-MISSING_DEP" => Some(
                "Ensure all dependencies reference stages that exist in the pipeline. \
                 Check for typos in stage ids.",
            ),
            "CONTRACT-004-DUPLICATE" => Some(
                "Stage ids, agent ids and output paths must each be unique within a pipeline. \
                 A dependency may be listed only once per stage.",
            ),
            "CONTRACT-004-UNKNOWN_AGENT" => Some(
                "Declare the agent in the pipeline's agent list or fix the stage's agent id.",
            ),
            "CONTRACT-004-EMPTY" => Some(
                "Add at least one stage to the pipeline before building.",
            ),
            _ => None,
        }
    }
}
