//! # Sessionflow
//!
//! Runs a fixed graph of language-model stages over a therapy session
//! transcript. Each stage renders a prompt from its agent persona, its task,
//! optionally the transcript, and the persisted results of the stages it
//! depends on. The response is checked against the stage's JSON contract and
//! written to its own file before the next stage starts.
//!
//! - **Declarative graph**: stages and agents are plain data, validated once
//! - **Sequential execution**: one backend call at a time, in declaration order
//! - **Explicit context**: a stage sees only the results it declares
//! - **File artifacts**: every stage result lands in its own JSON file
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sessionflow::prelude::*;
//! use std::sync::Arc;
//!
//! let graph = therapy_definition().build()?;
//! let backend = OllamaBackend::new(BackendConfig::default())?;
//! let runner = PipelineRunner::new(graph, Arc::new(backend), ResultStore::new("out"));
//!
//! let outcome = runner.run_from_path("session.txt").await?;
//! println!("{}", outcome.final_result().map_or("", |r| r.content.as_str()));
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, missing_docs, rust_2018_idioms)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod backend;
pub mod catalog;
pub mod config;
pub mod contracts;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod prompt;
pub mod storage;
pub mod testing;
pub mod transcript;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backend::{FnBackend, OllamaBackend, TextBackend};
    pub use crate::catalog::{therapy_definition, THERAPY_PIPELINE};
    pub use crate::config::BackendConfig;
    pub use crate::contracts::{ResponsePolicy, ResponseShape};
    pub use crate::core::{RunResults, StageResult};
    pub use crate::errors::{
        BackendError, ContractErrorInfo, ContractViolation, CycleDetectedError,
        OutputConflictError, PipelineError, PipelineValidationError, TranscriptError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{
        AgentProfile, ExecutionPlan, PipelineBuilder, PipelineDefinition, PipelineOutcome,
        PipelineRunner, StageGraph, StageSpec,
    };
    pub use crate::storage::ResultStore;
    pub use crate::transcript::Transcript;
}
