//! Pipeline builder with validation.

use super::{AgentProfile, StageGraph, StageSpec};
use crate::errors::{ContractErrorInfo, CycleDetectedError, PipelineValidationError};
use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};

/// Builder for creating validated pipelines.
///
/// Stages may reference dependencies declared later; references are
/// resolved when [`build`](Self::build) is called.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    /// The pipeline name.
    name: String,
    /// Agents by id.
    agents: HashMap<String, AgentProfile>,
    /// The stage specifications.
    stages: HashMap<String, StageSpec>,
    /// Insertion order for stages.
    stage_order: Vec<String>,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agents: HashMap::new(),
            stages: HashMap::new(),
            stage_order: Vec::new(),
        }
    }

    /// Adds an agent to the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if an agent with the same id already exists.
    pub fn agent(mut self, agent: AgentProfile) -> Result<Self, PipelineValidationError> {
        self.add_agent(agent)?;
        Ok(self)
    }

    /// Adds an agent in place.
    ///
    /// # Errors
    ///
    /// Returns an error if an agent with the same id already exists.
    pub fn add_agent(&mut self, agent: AgentProfile) -> Result<(), PipelineValidationError> {
        if self.agents.contains_key(&agent.id) {
            return Err(PipelineValidationError::new(format!(
                "Agent '{}' is declared more than once",
                agent.id
            ))
            .with_error_info(
                ContractErrorInfo::new("CONTRACT-004-DUPLICATE", format!("Duplicate agent '{}'", agent.id))
                    .with_suggested_fix(),
            ));
        }
        self.agents.insert(agent.id.clone(), agent);
        Ok(())
    }

    /// Adds a stage to the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage is invalid on its own or its id is taken.
    pub fn stage(mut self, spec: StageSpec) -> Result<Self, PipelineValidationError> {
        self.add_stage_spec(spec)?;
        Ok(self)
    }

    /// Adds a stage with a specification.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn add_stage_spec(&mut self, spec: StageSpec) -> Result<(), PipelineValidationError> {
        spec.validate()?;

        if self.stages.contains_key(&spec.id) {
            return Err(PipelineValidationError::new(format!(
                "Stage '{}' is declared more than once",
                spec.id
            ))
            .with_stages(vec![spec.id.clone()])
            .with_error_info(
                ContractErrorInfo::new(
                    "CONTRACT-004-DUPLICATE",
                    format!("Duplicate stage '{}'", spec.id),
                )
                .with_suggested_fix(),
            ));
        }

        self.stage_order.push(spec.id.clone());
        self.stages.insert(spec.id.clone(), spec);
        Ok(())
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipeline is empty, references an unknown
    /// agent or stage, or contains a cycle.
    pub fn build(self) -> Result<StageGraph, PipelineValidationError> {
        if self.stages.is_empty() {
            return Err(PipelineValidationError::new("Pipeline has no stages")
                .with_error_info(
                    ContractErrorInfo::new("CONTRACT-004-EMPTY", "Cannot build an empty pipeline")
                        .with_suggested_fix(),
                ));
        }

        for id in &self.stage_order {
            let spec = &self.stages[id];

            if !self.agents.contains_key(&spec.agent) {
                return Err(PipelineValidationError::new(format!(
                    "Stage '{}' uses unknown agent '{}'",
                    spec.id, spec.agent
                ))
                .with_stages(vec![spec.id.clone()])
                .with_error_info(
                    ContractErrorInfo::new(
                        "CONTRACT-004-UNKNOWN_AGENT",
                        format!("Agent '{}' not found", spec.agent),
                    )
                    .with_suggested_fix()
                    .with_context_entry("stage", spec.id.clone()),
                ));
            }

            for dep in &spec.dependencies {
                if !self.stages.contains_key(dep) {
                    return Err(PipelineValidationError::new(format!(
                        "Stage '{}' depends on unknown stage '{}'",
                        spec.id, dep
                    ))
                    .with_stages(vec![spec.id.clone(), dep.clone()])
                    .with_error_info(
                        ContractErrorInfo::new(
                            "CONTRACT-004-MISSING_DEP",
                            format!("Dependency '{dep}' not found"),
                        )
                        .with_suggested_fix(),
                    ));
                }
            }
        }

        self.check_output_paths()?;
        self.detect_cycles()?;

        Ok(StageGraph::new(
            self.name,
            self.agents,
            self.stages,
            &self.stage_order,
        ))
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Rejects two stages writing the same artifact.
    fn check_output_paths(&self) -> Result<(), PipelineValidationError> {
        let mut owners: HashMap<PathBuf, &str> = HashMap::new();

        for id in &self.stage_order {
            let path = normalize_output_path(&self.stages[id].output_path);
            if let Some(owner) = owners.get(&path) {
                return Err(PipelineValidationError::new(format!(
                    "Stages '{owner}' and '{id}' both write '{}'",
                    path.display()
                ))
                .with_stages(vec![(*owner).to_string(), id.clone()])
                .with_error_info(
                    ContractErrorInfo::new(
                        "CONTRACT-004-DUPLICATE",
                        format!("Duplicate output path '{}'", path.display()),
                    )
                    .with_suggested_fix()
                    .with_context_entry("output_path", path.display().to_string()),
                ));
            }
            owners.insert(path, id);
        }

        Ok(())
    }

    /// Detects cycles in the dependency graph.
    fn detect_cycles(&self) -> Result<(), CycleDetectedError> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        // Declaration order keeps the reported cycle path stable.
        for name in &self.stage_order {
            if !visited.contains(name) {
                if let Some(cycle) = self.dfs_cycle(name, &mut visited, &mut rec_stack, &mut path) {
                    return Err(CycleDetectedError::new(cycle));
                }
            }
        }

        Ok(())
    }

    fn dfs_cycle(
        &self,
        node: &str,
        visited: &mut HashSet<String>,
        rec_stack: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        visited.insert(node.to_string());
        rec_stack.insert(node.to_string());
        path.push(node.to_string());

        if let Some(spec) = self.stages.get(node) {
            for dep in &spec.dependencies {
                if !visited.contains(dep) {
                    if let Some(cycle) = self.dfs_cycle(dep, visited, rec_stack, path) {
                        return Some(cycle);
                    }
                } else if rec_stack.contains(dep) {
                    let cycle_start = path.iter().position(|n| n == dep).unwrap_or(0);
                    let mut cycle: Vec<String> = path[cycle_start..].to_vec();
                    cycle.push(dep.clone());
                    return Some(cycle);
                }
            }
        }

        path.pop();
        rec_stack.remove(node);
        None
    }
}

/// Lexically folds `.` and `..` so that equivalent spellings compare equal.
fn normalize_output_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(normalized.components().next_back(), Some(Component::Normal(_))) {
                    normalized.pop();
                } else {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> AgentProfile {
        AgentProfile::new("analyst", "Analyst", "Analyze", "Experienced")
    }

    fn stage(id: &str, deps: &[&str]) -> StageSpec {
        StageSpec::new(id, "analyst", format!("{id}.json")).with_dependencies(deps.iter().copied())
    }

    #[test]
    fn test_builder_creation() {
        let builder = PipelineBuilder::new("test");
        assert_eq!(builder.name(), "test");
        assert_eq!(builder.stage_count(), 0);
    }

    #[test]
    fn test_builder_with_dependencies() {
        let graph = PipelineBuilder::new("test")
            .agent(agent())
            .unwrap()
            .stage(stage("stage1", &[]))
            .unwrap()
            .stage(stage("stage2", &["stage1"]))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(graph.name(), "test");
        assert_eq!(graph.stage_count(), 2);
    }

    #[test]
    fn test_builder_forward_reference_is_resolved() {
        let graph = PipelineBuilder::new("test")
            .agent(agent())
            .unwrap()
            .stage(stage("late", &["early"]))
            .unwrap()
            .stage(stage("early", &[]))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(graph.execution_order(), &["early".to_string(), "late".to_string()]);
    }

    #[test]
    fn test_builder_missing_dependency() {
        let err = PipelineBuilder::new("test")
            .agent(agent())
            .unwrap()
            .stage(stage("stage1", &["missing"]))
            .unwrap()
            .build()
            .unwrap_err();

        assert_eq!(err.code(), Some("CONTRACT-004-MISSING_DEP"));
        assert_eq!(err.stages, vec!["stage1".to_string(), "missing".to_string()]);
    }

    #[test]
    fn test_builder_unknown_agent() {
        let err = PipelineBuilder::new("test")
            .stage(stage("stage1", &[]))
            .unwrap()
            .build()
            .unwrap_err();

        assert_eq!(err.code(), Some("CONTRACT-004-UNKNOWN_AGENT"));
    }

    #[test]
    fn test_builder_cycle_detection() {
        let err = PipelineBuilder::new("test")
            .agent(agent())
            .unwrap()
            .stage(stage("a", &["c"]))
            .unwrap()
            .stage(stage("b", &["a"]))
            .unwrap()
            .stage(stage("c", &["b"]))
            .unwrap()
            .build()
            .unwrap_err();

        assert_eq!(err.code(), Some("CONTRACT-004-CYCLE"));
        assert_eq!(
            err.stages,
            vec!["a".to_string(), "c".to_string(), "b".to_string(), "a".to_string()]
        );
    }

    #[test]
    fn test_builder_duplicate_stage() {
        let result = PipelineBuilder::new("test")
            .stage(stage("dup", &[]))
            .unwrap()
            .stage(stage("dup", &[]));

        let err = result.unwrap_err();
        assert_eq!(err.code(), Some("CONTRACT-004-DUPLICATE"));
    }

    #[test]
    fn test_builder_duplicate_agent() {
        let result = PipelineBuilder::new("test").agent(agent()).unwrap().agent(agent());
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_shared_output_path() {
        let err = PipelineBuilder::new("test")
            .agent(agent())
            .unwrap()
            .stage(StageSpec::new("first", "analyst", "out.json"))
            .unwrap()
            .stage(StageSpec::new("second", "analyst", "./json/../out.json").with_dependency("first"))
            .unwrap()
            .build()
            .unwrap_err();

        assert_eq!(err.code(), Some("CONTRACT-004-DUPLICATE"));
        assert_eq!(err.stages, vec!["first".to_string(), "second".to_string()]);
        assert!(err.error_info.unwrap().fix_hint.unwrap().contains("output paths"));
    }

    #[test]
    fn test_normalize_output_path() {
        assert_eq!(normalize_output_path(Path::new("./a/./b.json")), PathBuf::from("a/b.json"));
        assert_eq!(normalize_output_path(Path::new("a/../b.json")), PathBuf::from("b.json"));
        assert_eq!(normalize_output_path(Path::new("../b.json")), PathBuf::from("../b.json"));
        assert_ne!(normalize_output_path(Path::new("a/b.json")), normalize_output_path(Path::new("b.json")));
    }

    #[test]
    fn test_builder_missing_dependency_has_hint() {
        let err = PipelineBuilder::new("test")
            .agent(agent())
            .unwrap()
            .stage(stage("stage1", &["missing"]))
            .unwrap()
            .build()
            .unwrap_err();

        assert_eq!(
            err.error_info.and_then(|i| i.fix_hint).as_deref(),
            crate::errors::ContractSuggestions::get("CONTRACT-004-MISSING_DEP")
        );
    }

    #[test]
    fn test_builder_empty_build() {
        let err = PipelineBuilder::new("test").build().unwrap_err();
        assert_eq!(err.code(), Some("CONTRACT-004-EMPTY"));
    }
}
