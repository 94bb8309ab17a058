//! Stage results and the per-run result ledger.

use crate::contracts::ResponseShape;
use crate::errors::OutputConflictError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// The persisted output of one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    /// Stage id.
    pub stage: String,
    /// Agent that produced the result.
    pub agent: String,
    /// The backend's text, exactly as returned.
    pub raw_response: String,
    /// The text written to disk and handed to dependent stages.
    pub content: String,
    /// The decoded JSON, when the content is JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed: Option<serde_json::Value>,
    /// How the response was interpreted.
    pub shape: ResponseShape,
    /// Where the content was written.
    pub output_path: PathBuf,
    /// When the stage started.
    pub started_at: DateTime<Utc>,
    /// When the result was persisted.
    pub ended_at: DateTime<Utc>,
}

impl StageResult {
    /// Returns the duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).num_milliseconds()
    }

    /// Returns true if the content is JSON.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.parsed.is_some()
    }
}

/// Write-once collection of the results produced during one run.
#[derive(Debug, Default)]
pub struct RunResults {
    by_stage: HashMap<String, usize>,
    ordered: Vec<StageResult>,
}

impl RunResults {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a stage's result.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage already has a result in this run.
    pub fn record(&mut self, result: StageResult) -> Result<(), OutputConflictError> {
        if self.by_stage.contains_key(&result.stage) {
            return Err(OutputConflictError::new(
                &result.stage,
                "a result was already recorded for this stage in the current run",
            ));
        }
        self.by_stage.insert(result.stage.clone(), self.ordered.len());
        self.ordered.push(result);
        Ok(())
    }

    /// Gets a stage's result.
    #[must_use]
    pub fn get(&self, stage: &str) -> Option<&StageResult> {
        self.by_stage.get(stage).map(|&idx| &self.ordered[idx])
    }

    /// Checks if a stage has a result.
    #[must_use]
    pub fn contains(&self, stage: &str) -> bool {
        self.by_stage.contains_key(stage)
    }

    /// Returns the number of results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Consumes the ledger, yielding results in the order they were recorded.
    #[must_use]
    pub fn into_ordered(self) -> Vec<StageResult> {
        self.ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(stage: &str) -> StageResult {
        let now = Utc::now();
        StageResult {
            stage: stage.to_string(),
            agent: "agent".to_string(),
            raw_response: "{}".to_string(),
            content: "{}".to_string(),
            parsed: Some(serde_json::json!({})),
            shape: ResponseShape::Json,
            output_path: PathBuf::from(format!("{stage}.json")),
            started_at: now,
            ended_at: now,
        }
    }

    #[test]
    fn test_record_and_get() {
        let mut results = RunResults::new();
        assert!(results.is_empty());

        results.record(result("topics")).unwrap();
        results.record(result("summary")).unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.contains("topics"));
        assert_eq!(results.get("summary").unwrap().stage, "summary");
        assert!(results.get("missing").is_none());
    }

    #[test]
    fn test_record_is_write_once() {
        let mut results = RunResults::new();
        results.record(result("topics")).unwrap();

        let err = results.record(result("topics")).unwrap_err();
        assert_eq!(err.stage, "topics");
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_into_ordered_keeps_record_order() {
        let mut results = RunResults::new();
        for stage in ["c", "a", "b"] {
            results.record(result(stage)).unwrap();
        }

        let stages: Vec<_> = results.into_ordered().into_iter().map(|r| r.stage).collect();
        assert_eq!(stages, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_stage_result_serialization() {
        let original = result("topics");
        let json = serde_json::to_string(&original).unwrap();
        let restored: StageResult = serde_json::from_str(&json).unwrap();

        assert_eq!(original, restored);
        assert!(restored.is_json());
        assert_eq!(restored.duration_ms(), 0);
    }
}
