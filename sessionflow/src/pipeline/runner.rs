//! Sequential execution of a stage graph.
//!
//! Stages run one at a time in the graph's execution order. Each stage's
//! result is persisted and recorded before the next stage starts, so a
//! stage's dependencies always have files on disk when it runs. The first
//! error ends the run; nothing is retried.

use super::{StageGraph, StageSpec};
use crate::backend::TextBackend;
use crate::contracts::ResponsePolicy;
use crate::core::{RunResults, StageResult};
use crate::errors::PipelineError;
use crate::events::{EventSink, NoOpEventSink};
use crate::observability::SpanTimer;
use crate::prompt::{render_prompt, DependencyContext};
use crate::storage::ResultStore;
use crate::transcript::Transcript;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Everything a completed run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Unique id of the run.
    pub run_id: Uuid,
    /// The pipeline name.
    pub pipeline: String,
    /// Results in execution order.
    pub results: Vec<StageResult>,
    /// Total wall time in milliseconds.
    pub duration_ms: f64,
}

impl PipelineOutcome {
    /// Returns the last stage's result.
    #[must_use]
    pub fn final_result(&self) -> Option<&StageResult> {
        self.results.last()
    }

    /// Gets a stage's result.
    #[must_use]
    pub fn result(&self, stage: &str) -> Option<&StageResult> {
        self.results.iter().find(|r| r.stage == stage)
    }
}

/// Runs a [`StageGraph`] against a backend.
pub struct PipelineRunner {
    graph: StageGraph,
    backend: Arc<dyn TextBackend>,
    store: ResultStore,
    policy: ResponsePolicy,
    sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for PipelineRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRunner")
            .field("pipeline", &self.graph.name())
            .field("backend", &self.backend.name())
            .field("output_dir", &self.store.root())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl PipelineRunner {
    /// Creates a runner with the default policy and no event sink.
    #[must_use]
    pub fn new(graph: StageGraph, backend: Arc<dyn TextBackend>, store: ResultStore) -> Self {
        Self {
            graph,
            backend,
            store,
            policy: ResponsePolicy::default(),
            sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the response policy.
    #[must_use]
    pub fn with_policy(mut self, policy: ResponsePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the graph being run.
    #[must_use]
    pub fn graph(&self) -> &StageGraph {
        &self.graph
    }

    /// Loads the transcript, then runs every stage.
    ///
    /// The transcript is read before any backend call, so a missing file
    /// aborts the run without contacting the backend.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered.
    pub async fn run_from_path(&self, path: impl AsRef<Path>) -> Result<PipelineOutcome, PipelineError> {
        let transcript = Transcript::load(path)?;
        self.run(&transcript).await
    }

    /// Runs every stage against the transcript.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered; later stages are not attempted.
    pub async fn run(&self, transcript: &Transcript) -> Result<PipelineOutcome, PipelineError> {
        let run_id = Uuid::now_v7();
        let timer = SpanTimer::start(self.graph.name());

        tracing::info!(
            run_id = %run_id,
            pipeline = %self.graph.name(),
            stages = self.graph.stage_count(),
            backend = self.backend.name(),
            policy = %self.policy,
            transcript_sha256 = %transcript.fingerprint(),
            "Starting pipeline run"
        );
        self.sink
            .emit(
                "pipeline.started",
                Some(serde_json::json!({
                    "run_id": run_id.to_string(),
                    "pipeline": self.graph.name(),
                    "order": self.graph.execution_order(),
                })),
            )
            .await;

        let mut results = RunResults::new();
        for spec in self.graph.stages_in_order() {
            if let Err(err) = self.run_stage(spec, transcript, &mut results).await {
                tracing::error!(run_id = %run_id, stage = %spec.id, error = %err, "Pipeline run failed");
                self.sink.try_emit(
                    "pipeline.failed",
                    Some(serde_json::json!({
                        "run_id": run_id.to_string(),
                        "stage": &spec.id,
                        "error": err.to_string(),
                        "completed": results.len(),
                    })),
                );
                return Err(err);
            }
        }

        let duration_ms = timer.finish();
        tracing::info!(run_id = %run_id, duration_ms, "Pipeline run completed");
        self.sink
            .emit(
                "pipeline.completed",
                Some(serde_json::json!({
                    "run_id": run_id.to_string(),
                    "duration_ms": duration_ms,
                })),
            )
            .await;

        Ok(PipelineOutcome {
            run_id,
            pipeline: self.graph.name().to_string(),
            results: results.into_ordered(),
            duration_ms,
        })
    }

    /// Renders a stage's prompt from results already in `results`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingDependencyResult`] if a dependency has
    /// not produced a result yet.
    pub fn render_stage_prompt(
        &self,
        spec: &StageSpec,
        transcript: &Transcript,
        results: &RunResults,
    ) -> Result<String, PipelineError> {
        let context = spec
            .dependencies
            .iter()
            .map(|dep| {
                results
                    .get(dep)
                    .map(|r| DependencyContext::new(dep, &r.content))
                    .ok_or_else(|| PipelineError::MissingDependencyResult {
                        stage: spec.id.clone(),
                        dependency: dep.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let agent = self.graph.agent(&spec.agent).ok_or_else(|| {
            crate::errors::PipelineValidationError::new(format!(
                "Stage '{}' uses unknown agent '{}'",
                spec.id, spec.agent
            ))
        })?;

        Ok(render_prompt(agent, spec, transcript, &context))
    }

    async fn run_stage(
        &self,
        spec: &StageSpec,
        transcript: &Transcript,
        results: &mut RunResults,
    ) -> Result<(), PipelineError> {
        let prompt = self.render_stage_prompt(spec, transcript, results)?;
        let started_at = Utc::now();
        let timer = SpanTimer::start(&spec.id);

        tracing::info!(
            stage = %spec.id,
            agent = %spec.agent,
            dependencies = ?spec.dependencies,
            prompt_bytes = prompt.len(),
            "Running stage"
        );
        self.sink
            .emit(
                "stage.started",
                Some(serde_json::json!({
                    "stage": &spec.id,
                    "agent": &spec.agent,
                    "dependencies": &spec.dependencies,
                })),
            )
            .await;

        let raw = self
            .backend
            .generate(&prompt)
            .await
            .map_err(|source| PipelineError::Backend {
                stage: spec.id.clone(),
                source,
            })?;

        let outcome = self.policy.apply(spec, &raw)?;
        let path = self.store.persist(spec, &outcome.content)?;
        self.sink
            .emit(
                "stage.persisted",
                Some(serde_json::json!({
                    "stage": &spec.id,
                    "path": path.display().to_string(),
                    "shape": outcome.shape,
                })),
            )
            .await;

        results.record(StageResult {
            stage: spec.id.clone(),
            agent: spec.agent.clone(),
            raw_response: raw,
            content: outcome.content,
            parsed: outcome.parsed,
            shape: outcome.shape,
            output_path: path,
            started_at,
            ended_at: Utc::now(),
        })?;

        let duration_ms = timer.finish();
        tracing::info!(stage = %spec.id, duration_ms, shape = %outcome.shape, "Stage completed");
        self.sink
            .emit(
                "stage.completed",
                Some(serde_json::json!({
                    "stage": &spec.id,
                    "duration_ms": duration_ms,
                })),
            )
            .await;

        Ok(())
    }
}
