use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of one interpreted step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Success without payload; contributes nothing to the output.
    Empty,
    /// Success carrying a payload (string, bool, list or object).
    Value(Value),
    /// Failure, message prefixed with the originating command name.
    Error(String),
}

impl StepOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, StepOutcome::Error(_))
    }

    /// Wire record for this outcome, if it carries one.
    pub fn into_record(self) -> Option<StepRecord> {
        match self {
            StepOutcome::Empty => None,
            StepOutcome::Value(value) => Some(StepRecord::Value { value }),
            StepOutcome::Error(error) => Some(StepRecord::Error { error }),
        }
    }
}

/// One element of the scenario output array: exactly one of `value` or
/// `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepRecord {
    Value { value: Value },
    Error { error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioStatus {
    Completed,
    Failed,
}

/// Result of driving a full scenario: ordered non-empty step records, with
/// the triggering error last when the run failed.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub status: ScenarioStatus,
    pub results: Vec<StepRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScenarioReport {
    pub fn completed(results: Vec<StepRecord>) -> Self {
        Self {
            status: ScenarioStatus::Completed,
            results,
            error: None,
        }
    }

    pub fn failed(results: Vec<StepRecord>, error: String) -> Self {
        Self {
            status: ScenarioStatus::Failed,
            results,
            error: Some(error),
        }
    }
}
