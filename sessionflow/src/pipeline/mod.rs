//! Pipeline definition, validation and execution.
//!
//! This module provides:
//! - Stage, agent and pipeline definitions
//! - Pipeline builder with validation
//! - The validated stage graph and its execution order
//! - The sequential runner

mod builder;
mod dag;
mod runner;
mod spec;

pub use builder::PipelineBuilder;
pub use dag::{ExecutionPlan, PlanStep, StageGraph};
pub use runner::{PipelineOutcome, PipelineRunner};
pub use spec::{AgentProfile, PipelineDefinition, StageSpec};
