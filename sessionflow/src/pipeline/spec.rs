//! Stage, agent and pipeline definitions.
//!
//! These are plain data: a pipeline is a table of agents and stages that can
//! be written in Rust or loaded from JSON, then validated by
//! [`PipelineBuilder`](super::PipelineBuilder).

use crate::errors::{ContractErrorInfo, PipelineError, PipelineValidationError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::{PipelineBuilder, StageGraph};

/// The persona a stage speaks as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Unique agent id referenced by stages.
    pub id: String,
    /// Short role title.
    pub role: String,
    /// What the agent is trying to achieve.
    pub goal: String,
    /// Background that shapes the agent's answers.
    pub backstory: String,
}

impl AgentProfile {
    /// Creates a new agent profile.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        role: impl Into<String>,
        goal: impl Into<String>,
        backstory: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            goal: goal.into(),
            backstory: backstory.into(),
        }
    }
}

/// Specification for a single stage in a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSpec {
    /// The unique id of the stage.
    pub id: String,
    /// Id of the agent that answers this stage.
    pub agent: String,
    /// The task description sent to the backend.
    pub description: String,
    /// Informal description of the JSON shape the stage should return.
    pub expected_output: String,
    /// Stages whose results are injected as context, in prompt order.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Whether the transcript is appended to the prompt.
    #[serde(default)]
    pub include_transcript: bool,
    /// Top-level keys the JSON result must contain under validation.
    #[serde(default)]
    pub required_keys: Vec<String>,
    /// Where the result is written, relative to the output directory
    /// unless absolute.
    pub output_path: PathBuf,
}

impl StageSpec {
    /// Creates a new stage specification.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        agent: impl Into<String>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            agent: agent.into(),
            description: String::new(),
            expected_output: String::new(),
            dependencies: Vec::new(),
            include_transcript: false,
            required_keys: Vec::new(),
            output_path: output_path.into(),
        }
    }

    /// Sets the task description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the expected output description.
    #[must_use]
    pub fn with_expected_output(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = expected.into();
        self
    }

    /// Adds a dependency.
    #[must_use]
    pub fn with_dependency(mut self, dep: impl Into<String>) -> Self {
        self.dependencies.push(dep.into());
        self
    }

    /// Sets the dependencies.
    #[must_use]
    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Appends the transcript to this stage's prompt.
    #[must_use]
    pub fn with_transcript(mut self) -> Self {
        self.include_transcript = true;
        self
    }

    /// Adds a required top-level key.
    #[must_use]
    pub fn with_required_key(mut self, key: impl Into<String>) -> Self {
        self.required_keys.push(key.into());
        self
    }

    /// Validates the stage specification in isolation.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is blank, the stage depends on itself, or
    /// a dependency is listed twice.
    pub fn validate(&self) -> Result<(), PipelineValidationError> {
        if self.id.trim().is_empty() {
            return Err(PipelineValidationError::new("Stage id cannot be empty"));
        }

        if self.dependencies.contains(&self.id) {
            return Err(PipelineValidationError::new(format!(
                "Stage '{}' cannot depend on itself",
                self.id
            ))
            .with_stages(vec![self.id.clone()]));
        }

        let mut seen = HashSet::new();
        for dep in &self.dependencies {
            if !seen.insert(dep) {
                return Err(PipelineValidationError::new(format!(
                    "Stage '{}' lists dependency '{}' more than once",
                    self.id, dep
                ))
                .with_stages(vec![self.id.clone(), dep.clone()])
                .with_error_info(
                    ContractErrorInfo::new("CONTRACT-004-DUPLICATE", format!("Duplicate dependency '{dep}'"))
                        .with_suggested_fix(),
                ));
            }
        }

        if self.output_path.as_os_str().is_empty() {
            return Err(PipelineValidationError::new(format!(
                "Stage '{}' has no output path",
                self.id
            ))
            .with_stages(vec![self.id.clone()]));
        }

        Ok(())
    }
}

/// A complete pipeline table, as stored in a definition file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    /// The pipeline name.
    pub name: String,
    /// Agents referenced by the stages.
    #[serde(default)]
    pub agents: Vec<AgentProfile>,
    /// Stages in declaration order.
    #[serde(default)]
    pub stages: Vec<StageSpec>,
}

impl PipelineDefinition {
    /// Parses a definition from JSON text.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the JSON does not match the schema.
    pub fn from_json_str(json: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a definition from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an IO or serialization error.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Validates the table and builds the executable graph.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn build(self) -> Result<StageGraph, PipelineValidationError> {
        let mut builder = PipelineBuilder::new(self.name);
        for agent in self.agents {
            builder.add_agent(agent)?;
        }
        for stage in self.stages {
            builder.add_stage_spec(stage)?;
        }
        builder.build()
    }
}
