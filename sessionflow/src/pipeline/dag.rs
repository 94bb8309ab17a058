//! Validated stage graph and its deterministic execution order.

use super::{AgentProfile, StageSpec};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// One step of an execution plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStep {
    /// 1-based position in the execution order.
    pub position: usize,
    /// The stage id.
    pub stage: String,
    /// The agent answering the stage.
    pub agent: String,
    /// Declared dependencies, in prompt order.
    pub dependencies: Vec<String>,
    /// Whether the transcript is part of the prompt.
    pub include_transcript: bool,
    /// Where the result will be written.
    pub output_path: PathBuf,
}

/// The order in which a graph will run, with each stage's inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    /// The pipeline name.
    pub pipeline: String,
    /// Steps in execution order.
    pub steps: Vec<PlanStep>,
}

/// A directed acyclic graph of stages for execution.
///
/// Only [`PipelineBuilder`](super::PipelineBuilder) creates graphs, so every
/// dependency and agent reference is known to resolve.
#[derive(Debug, Clone)]
pub struct StageGraph {
    /// The pipeline name.
    name: String,
    /// Agents by id.
    agents: HashMap<String, AgentProfile>,
    /// Stage specifications.
    stages: HashMap<String, StageSpec>,
    /// Execution order (topologically sorted).
    execution_order: Vec<String>,
}

impl StageGraph {
    pub(crate) fn new(
        name: String,
        agents: HashMap<String, AgentProfile>,
        stages: HashMap<String, StageSpec>,
        stage_order: &[String],
    ) -> Self {
        let execution_order = topological_sort(&stages, stage_order);

        Self {
            name,
            agents,
            stages,
            execution_order,
        }
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

    /// Returns the execution order.
    #[must_use]
    pub fn execution_order(&self) -> &[String] {
        &self.execution_order
    }

    /// Looks up a stage by id.
    #[must_use]
    pub fn stage(&self, id: &str) -> Option<&StageSpec> {
        self.stages.get(id)
    }

    /// Looks up an agent by id.
    #[must_use]
    pub fn agent(&self, id: &str) -> Option<&AgentProfile> {
        self.agents.get(id)
    }

    /// Iterates over stages in execution order.
    pub fn stages_in_order(&self) -> impl Iterator<Item = &StageSpec> {
        self.execution_order
            .iter()
            .filter_map(|id| self.stages.get(id))
    }

    /// Returns the last stage to run, whose result the run reports.
    #[must_use]
    pub fn final_stage(&self) -> Option<&StageSpec> {
        self.execution_order.last().and_then(|id| self.stages.get(id))
    }

    /// Describes how the graph will run.
    #[must_use]
    pub fn plan(&self) -> ExecutionPlan {
        let steps = self
            .stages_in_order()
            .enumerate()
            .map(|(idx, spec)| PlanStep {
                position: idx + 1,
                stage: spec.id.clone(),
                agent: spec.agent.clone(),
                dependencies: spec.dependencies.clone(),
                include_transcript: spec.include_transcript,
                output_path: spec.output_path.clone(),
            })
            .collect();

        ExecutionPlan {
            pipeline: self.name.clone(),
            steps,
        }
    }
}

/// Performs topological sort on the stage graph.
///
/// Stages are visited in declaration order and each stage's dependencies are
/// emitted before it, so an already-sorted declaration is left unchanged.
fn topological_sort(stages: &HashMap<String, StageSpec>, stage_order: &[String]) -> Vec<String> {
    fn visit(
        node: &str,
        stages: &HashMap<String, StageSpec>,
        visited: &mut HashSet<String>,
        temp_visited: &mut HashSet<String>,
        result: &mut Vec<String>,
    ) {
        if visited.contains(node) || temp_visited.contains(node) {
            return;
        }

        temp_visited.insert(node.to_string());

        if let Some(spec) = stages.get(node) {
            for dep in &spec.dependencies {
                visit(dep, stages, visited, temp_visited, result);
            }
        }

        temp_visited.remove(node);
        visited.insert(node.to_string());
        result.push(node.to_string());
    }

    let mut result = Vec::with_capacity(stage_order.len());
    let mut visited = HashSet::new();
    let mut temp_visited = HashSet::new();

    for name in stage_order {
        visit(name, stages, &mut visited, &mut temp_visited, &mut result);
    }

    result
}
