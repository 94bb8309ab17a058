//! Prompt rendering.
//!
//! A prompt is assembled from the agent persona, the task description, the
//! transcript (when the stage asks for it), the results of the stage's
//! declared dependencies, and the expected output shape. Nothing else is
//! included: a stage never sees results it did not declare.

use crate::errors::{PipelineError, PipelineValidationError};
use crate::pipeline::{AgentProfile, StageGraph, StageSpec};
use crate::storage::ResultStore;
use crate::transcript::Transcript;

/// The result of one dependency, as injected into a dependent prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyContext<'a> {
    /// The dependency's stage id.
    pub stage: &'a str,
    /// The dependency's persisted content.
    pub content: &'a str,
}

impl<'a> DependencyContext<'a> {
    /// Creates a new dependency context.
    #[must_use]
    pub fn new(stage: &'a str, content: &'a str) -> Self {
        Self { stage, content }
    }
}

/// Renders the full prompt for a stage.
///
/// `context` must be given in the order of `spec.dependencies`.
#[must_use]
pub fn render_prompt(
    agent: &AgentProfile,
    spec: &StageSpec,
    transcript: &Transcript,
    context: &[DependencyContext<'_>],
) -> String {
    let mut prompt = String::with_capacity(
        spec.description.len() + transcript.len() + context.iter().map(|c| c.content.len()).sum::<usize>() + 512,
    );

    prompt.push_str(&format!(
        "You are {}.\nYour goal: {}\nBackground: {}\n",
        agent.role, agent.goal, agent.backstory
    ));
    prompt.push_str("\nTask:\n");
    prompt.push_str(&spec.description);

    if spec.include_transcript {
        prompt.push_str("\n\nAdditional Info:\n");
        prompt.push_str(transcript.text());
    }

    for dep in context {
        prompt.push_str(&format!("\n\nResult of '{}':\n{}", dep.stage, dep.content));
    }

    if !spec.expected_output.is_empty() {
        prompt.push_str("\n\nExpected output:\n");
        prompt.push_str(&spec.expected_output);
    }

    prompt.push('\n');
    prompt
}

/// Renders a stage's prompt from dependency results persisted in `store`.
///
/// Used to inspect a prompt after (or between) runs without calling a model.
///
/// # Errors
///
/// Returns a validation error for an unknown stage, or
/// [`PipelineError::Persist`] if a dependency artifact cannot be read.
pub fn render_from_store(
    graph: &StageGraph,
    stage: &str,
    transcript: &Transcript,
    store: &ResultStore,
) -> Result<String, PipelineError> {
    let spec = graph.stage(stage).ok_or_else(|| {
        PipelineValidationError::new(format!("Unknown stage '{stage}'")).with_stages(vec![stage.to_string()])
    })?;
    let agent = graph.agent(&spec.agent).ok_or_else(|| {
        PipelineValidationError::new(format!("Stage '{}' uses unknown agent '{}'", spec.id, spec.agent))
    })?;

    let mut contents = Vec::with_capacity(spec.dependencies.len());
    for dep in &spec.dependencies {
        let dep_spec = graph.stage(dep).ok_or_else(|| {
            PipelineValidationError::new(format!("Stage '{}' depends on unknown stage '{dep}'", spec.id))
        })?;
        contents.push((dep.as_str(), store.load(dep_spec)?));
    }
    let context: Vec<_> = contents
        .iter()
        .map(|(dep, content)| DependencyContext::new(dep, content))
        .collect();

    Ok(render_prompt(agent, spec, transcript, &context))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> AgentProfile {
        AgentProfile::new(
            "plan_generator",
            "Therapy Plan Generator",
            "Generate actionable advice",
            "Focuses on practical advice.",
        )
    }

    fn transcript() -> Transcript {
        Transcript::from_text("Client: I never finish anything.").unwrap()
    }

    #[test]
    fn test_prompt_with_transcript() {
        let spec = StageSpec::new("topics", "plan_generator", "Topics.json")
            .with_description("Segment the input.")
            .with_expected_output("{\"topics\": []}")
            .with_transcript();

        let prompt = render_prompt(&agent(), &spec, &transcript(), &[]);

        assert!(prompt.starts_with("You are Therapy Plan Generator."));
        assert!(prompt.contains("Segment the input.\n\nAdditional Info:\nClient: I never finish anything."));
        assert!(prompt.trim_end().ends_with("{\"topics\": []}"));
    }

    #[test]
    fn test_prompt_without_transcript_omits_it() {
        let spec = StageSpec::new("plan", "plan_generator", "plan.json")
            .with_description("Make a plan.");

        let prompt = render_prompt(&agent(), &spec, &transcript(), &[]);

        assert!(!prompt.contains("Additional Info"));
        assert!(!prompt.contains("never finish"));
        assert!(!prompt.contains("Expected output"));
    }

    #[test]
    fn test_prompt_context_follows_given_order() {
        let spec = StageSpec::new("summary", "plan_generator", "summary.json")
            .with_dependencies(["first", "second"]);

        let context = [
            DependencyContext::new("first", "{\"a\": 1}"),
            DependencyContext::new("second", "{\"b\": 2}"),
        ];
        let prompt = render_prompt(&agent(), &spec, &transcript(), &context);

        let first = prompt.find("Result of 'first':\n{\"a\": 1}").unwrap();
        let second = prompt.find("Result of 'second':\n{\"b\": 2}").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_persona_header() {
        let spec = StageSpec::new("plan", "plan_generator", "plan.json").with_description("Make a plan.");

        let prompt = render_prompt(&agent(), &spec, &transcript(), &[]);

        assert_eq!(
            prompt,
            "You are Therapy Plan Generator.\n\
             Your goal: Generate actionable advice\n\
             Background: Focuses on practical advice.\n\
             \nTask:\nMake a plan.\n"
        );
    }

    #[test]
    fn test_render_from_store_uses_persisted_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());
        let graph = crate::catalog::therapy_definition().build().unwrap();

        let bias_plan = "{\"cognitive_plan\": [\"reframe\"]}";
        let emotion_plan = "{\"emotional_plan\": [\"journal\"]}";
        store.persist(graph.stage("cognitive_plan").unwrap(), bias_plan).unwrap();
        store.persist(graph.stage("forward_plan").unwrap(), emotion_plan).unwrap();
        store.persist(graph.stage("topics").unwrap(), "{\"topics\": [\"work\"]}").unwrap();

        let prompt = render_from_store(&graph, "summary", &transcript(), &store).unwrap();

        assert!(prompt.contains(&format!("Result of 'cognitive_plan':\n{bias_plan}")));
        assert!(prompt.contains(&format!("Result of 'forward_plan':\n{emotion_plan}")));
        assert!(!prompt.contains("Result of 'topics'"));
        assert!(!prompt.contains("\"work\""));
        assert!(!prompt.contains("never finish"));
    }

    #[test]
    fn test_render_from_store_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());
        let graph = crate::catalog::therapy_definition().build().unwrap();

        let err = render_from_store(&graph, "forward_plan", &transcript(), &store).unwrap_err();
        assert!(matches!(err, PipelineError::Persist { ref stage, action: "read", .. } if stage == "emotional_analysis"));
    }

    #[test]
    fn test_render_from_store_unknown_stage() {
        let dir = tempfile::tempdir().unwrap();
        let graph = crate::catalog::therapy_definition().build().unwrap();

        let err = render_from_store(&graph, "nope", &transcript(), &ResultStore::new(dir.path())).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }
}
