//! Built-in pipelines.
//!
//! The therapy pipeline segments a session transcript into topics, analyzes
//! cognitive biases and emotional issues, derives a plan for each, and
//! compiles a final summary from the two plans.

use crate::pipeline::{AgentProfile, PipelineDefinition, StageSpec};

/// Name of the built-in therapy pipeline.
pub const THERAPY_PIPELINE: &str = "therapy-session";

const JSON_ONLY: &str = "Output the result as a JSON file and avoid any non-JSON content.";

/// Returns the agents used by the therapy pipeline.
#[must_use]
pub fn therapy_agents() -> Vec<AgentProfile> {
    vec![
        AgentProfile::new(
            "cognitive_analyst",
            "Cognitive Dissonance/Bias Analyst",
            "Analyze cognitive dissonances or biases in the client's text",
            "Skilled at detecting mental conflicts or biases within a conversation or written material.",
        ),
        AgentProfile::new(
            "emotional_analyst",
            "Emotional Trauma Analyst",
            "Analyze emotional trauma or core psychological issues in the client's text",
            "Expert in analyzing emotional content and identifying underlying psychological issues.",
        ),
        AgentProfile::new(
            "topic_segmenter",
            "Topic Segmenter",
            "Organize the client text into distinct general topics for further analysis",
            "Adept at categorizing information into coherent topics for easier analysis by other agents.",
        ),
        AgentProfile::new(
            "plan_generator",
            "Therapy Plan Generator",
            "Generate actionable advice and a forward plan for the client",
            "Focuses on creating concrete, practical advice to help clients move forward.",
        ),
    ]
}

/// Returns the stages of the therapy pipeline in declaration order.
#[must_use]
pub fn therapy_stages() -> Vec<StageSpec> {
    vec![
        StageSpec::new("topics", "topic_segmenter", "Topics.json")
            .with_description(format!(
                "Segment the client's input into distinct general topics. \
                 Each topic should represent a key issue or theme within the client's input. {JSON_ONLY}"
            ))
            .with_expected_output(
                "A structured JSON array of general topics extracted from the client's text. For example:\n\
                 {\n  \"topics\": [\n    {\"topic\": \"Relationship issues\", \"quote\": \"Example quote from the text\"},\n    \
                 {\"topic\": \"Work-related stress\", \"quote\": \"Example quote from the text\"}\n  ]\n}",
            )
            .with_transcript()
            .with_required_key("topics"),
        StageSpec::new("cognitive_biases", "cognitive_analyst", "Cognitive-biases.json")
            .with_description(format!(
                "Analyze cognitive dissonances or biases in the segmented text. \
                 Identify any contradictions or biases affecting the client's decision-making or thought process. {JSON_ONLY}"
            ))
            .with_expected_output(
                "A JSON array listing cognitive dissonances or biases. For example:\n\
                 {\n  \"cognitive_dissonances\": [\n    {\"contradiction\": \"Client expresses desire for change but fears it simultaneously\", \
                 \"quote\": \"Example quote from the text\", \"cause\": \"Fear of failure\"}\n  ]\n}",
            )
            .with_transcript()
            .with_required_key("cognitive_dissonances"),
        StageSpec::new("emotional_analysis", "emotional_analyst", "Emotional_analysis.json")
            .with_description(format!(
                "Analyze the client's text for emotional trauma or core psychological issues. \
                 Identify past experiences or recurring patterns contributing to the client's current situation. {JSON_ONLY}"
            ))
            .with_expected_output(
                "A JSON array highlighting emotional traumas or core issues. For example:\n\
                 {\n  \"emotional_issues\": [\n    {\"issue\": \"Fear of abandonment\", \"quote\": \"Example quote from the text\", \
                 \"impact\": \"The client struggles with trust in relationships.\"}\n  ]\n}",
            )
            .with_transcript()
            .with_required_key("emotional_issues"),
        StageSpec::new("cognitive_plan", "plan_generator", "Cognitive_resolvement.json")
            .with_description(format!(
                "Generate an actionable plan to help the client deal with cognitive dissonances or biases. {JSON_ONLY}"
            ))
            .with_expected_output(
                "A JSON array of concrete steps or strategies for cognitive dissonances. For example:\n\
                 {\n  \"cognitive_plan\": [\n    {\"dissonance\": \"Fear of failure\", \
                 \"strategy\": \"Challenge the belief by reflecting on past successes\", \
                 \"resources\": \"Relevant articles, self-reflection techniques\"}\n  ]\n}",
            )
            .with_dependency("cognitive_biases")
            .with_required_key("cognitive_plan"),
        StageSpec::new("forward_plan", "plan_generator", "Forward_plan.json")
            .with_description(format!(
                "Create a forward-looking plan based on the emotional issues uncovered. {JSON_ONLY}"
            ))
            .with_expected_output(
                "A JSON array of actionable steps for emotional healing. For example:\n\
                 {\n  \"emotional_plan\": [\n    {\"issue\": \"Fear of abandonment\", \
                 \"steps\": \"Encourage building trust in relationships gradually\", \
                 \"therapeutic_exercises\": \"Journaling, mindfulness practices\"}\n  ]\n}",
            )
            .with_dependency("emotional_analysis")
            .with_required_key("emotional_plan"),
        StageSpec::new("summary", "plan_generator", "Full_summary.json")
            .with_description(format!(
                "Compile all outputs into a final summary for the client. \
                 This should provide a holistic view of the client's situation, highlighting key cognitive \
                 and emotional issues, and proposed solutions. {JSON_ONLY}"
            ))
            .with_expected_output(
                "A comprehensive JSON report. For example:\n\
                 {\n  \"summary\": {\n    \"topics\": [...],\n    \"cognitive_dissonances\": [...],\n    \
                 \"emotional_issues\": [...],\n    \"action_plan\": {...}\n  }\n}",
            )
            .with_dependencies(["cognitive_plan", "forward_plan"])
            .with_required_key("summary"),
    ]
}

/// Returns the complete therapy pipeline definition.
#[must_use]
pub fn therapy_definition() -> PipelineDefinition {
    PipelineDefinition {
        name: THERAPY_PIPELINE.to_string(),
        agents: therapy_agents(),
        stages: therapy_stages(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_therapy_definition_builds() {
        let graph = therapy_definition().build().unwrap();

        assert_eq!(graph.name(), THERAPY_PIPELINE);
        assert_eq!(
            graph.execution_order(),
            &[
                "topics",
                "cognitive_biases",
                "emotional_analysis",
                "cognitive_plan",
                "forward_plan",
                "summary"
            ]
            .map(String::from)
        );
    }

    #[test]
    fn test_only_analysis_stages_read_the_transcript() {
        let with_transcript: Vec<_> = therapy_stages()
            .into_iter()
            .filter(|s| s.include_transcript)
            .map(|s| s.id)
            .collect();

        assert_eq!(with_transcript, vec!["topics", "cognitive_biases", "emotional_analysis"]);
    }

    #[test]
    fn test_every_stage_requires_a_key() {
        for stage in therapy_stages() {
            assert_eq!(stage.required_keys.len(), 1, "{}", stage.id);
            assert!(stage.expected_output.contains(&format!("\"{}\"", stage.required_keys[0])));
        }
    }

    #[test]
    fn test_definition_round_trips_through_json() {
        let json = serde_json::to_string_pretty(&therapy_definition()).unwrap();
        let restored = PipelineDefinition::from_json_str(&json).unwrap();
        assert_eq!(restored, therapy_definition());
    }
}
