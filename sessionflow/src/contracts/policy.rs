//! Response policies: how backend text is checked before it is persisted.

use crate::errors::ContractViolation;
use crate::pipeline::StageSpec;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z]*\s*\n?(.*?)```").expect("valid fence pattern"));

/// How a stage's response was interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseShape {
    /// The response was JSON as returned.
    Json,
    /// JSON was recovered from surrounding prose or a code fence.
    Repaired,
    /// The response was kept as plain text.
    Raw,
}

impl fmt::Display for ResponseShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Repaired => write!(f, "repaired"),
            Self::Raw => write!(f, "raw"),
        }
    }
}

/// What to do with a backend response before persisting it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponsePolicy {
    /// Write the response verbatim, whatever it contains.
    PassThrough,
    /// Require a JSON object carrying every required key; fail the run otherwise.
    #[default]
    Validate,
    /// Recover JSON when possible, fall back to the raw text with a warning.
    Lenient,
}

impl fmt::Display for ResponsePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PassThrough => write!(f, "pass-through"),
            Self::Validate => write!(f, "validate"),
            Self::Lenient => write!(f, "lenient"),
        }
    }
}

impl FromStr for ResponsePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pass-through" | "passthrough" => Ok(Self::PassThrough),
            "validate" => Ok(Self::Validate),
            "lenient" => Ok(Self::Lenient),
            other => Err(format!(
                "unknown response policy '{other}' (expected validate, lenient or pass-through)"
            )),
        }
    }
}

/// A response after the policy has been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractOutcome {
    /// Text to persist and to hand to dependent stages.
    pub content: String,
    /// The decoded JSON, if any.
    pub parsed: Option<serde_json::Value>,
    /// How the response was interpreted.
    pub shape: ResponseShape,
}

impl ResponsePolicy {
    /// Applies the policy to a stage's raw response.
    ///
    /// # Errors
    ///
    /// Under [`ResponsePolicy::Validate`], returns a [`ContractViolation`]
    /// when the response is not a JSON object or misses a required key.
    pub fn apply(self, stage: &StageSpec, raw: &str) -> Result<ContractOutcome, ContractViolation> {
        match self {
            Self::PassThrough => {
                let parsed = serde_json::from_str(raw.trim()).ok();
                let shape = if parsed.is_some() { ResponseShape::Json } else { ResponseShape::Raw };
                Ok(ContractOutcome {
                    content: raw.to_string(),
                    parsed,
                    shape,
                })
            }
            Self::Validate => {
                let (value, shape) = repair_json(raw)
                    .ok_or_else(|| ContractViolation::new(&stage.id, "response is not valid JSON"))?;

                if !value.is_object() {
                    return Err(ContractViolation::new(&stage.id, "expected a JSON object"));
                }

                let missing = missing_keys(stage, &value);
                if !missing.is_empty() {
                    return Err(ContractViolation::new(
                        &stage.id,
                        format!("missing required keys: {}", missing.join(", ")),
                    ));
                }

                Ok(outcome_from_json(raw, value, shape))
            }
            Self::Lenient => match repair_json(raw) {
                Some((value, shape)) => {
                    let missing = missing_keys(stage, &value);
                    if !missing.is_empty() {
                        tracing::warn!(
                            stage = %stage.id,
                            missing = ?missing,
                            "Response is missing required keys"
                        );
                    }
                    Ok(outcome_from_json(raw, value, shape))
                }
                None => {
                    tracing::warn!(stage = %stage.id, "Response is not JSON; keeping raw text");
                    Ok(ContractOutcome {
                        content: raw.to_string(),
                        parsed: None,
                        shape: ResponseShape::Raw,
                    })
                }
            },
        }
    }
}

/// Recovers a JSON value from model output.
///
/// Tries, in order: the trimmed text itself, the first fenced code block,
/// and the span from the first `{` to the last `}`.
#[must_use]
pub fn repair_json(raw: &str) -> Option<(serde_json::Value, ResponseShape)> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some((value, ResponseShape::Json));
    }

    if let Some(block) = FENCED_BLOCK.captures(trimmed).and_then(|c| c.get(1)) {
        if let Ok(value) = serde_json::from_str(block.as_str().trim()) {
            return Some((value, ResponseShape::Repaired));
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end])
        .ok()
        .map(|value| (value, ResponseShape::Repaired))
}

fn missing_keys(stage: &StageSpec, value: &serde_json::Value) -> Vec<String> {
    stage
        .required_keys
        .iter()
        .filter(|key| value.get(key.as_str()).is_none())
        .cloned()
        .collect()
}

fn outcome_from_json(raw: &str, value: serde_json::Value, shape: ResponseShape) -> ContractOutcome {
    // Clean JSON is kept byte-for-byte; recovered JSON is re-rendered.
    let content = match shape {
        ResponseShape::Json => raw.trim().to_string(),
        _ => serde_json::to_string_pretty(&value).unwrap_or_else(|_| raw.trim().to_string()),
    };
    ContractOutcome {
        content,
        parsed: Some(value),
        shape,
    }
}
