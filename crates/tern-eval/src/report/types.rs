use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use tern::message::Message;

use crate::case::ExpectedOutput;

/// Identity block for one evaluation run, stored as `metadata.json` in the
/// run directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub task_name: String,
    pub dataset_ids: Vec<String>,
}

/// A numeric score with an optional explanation from the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Score {
    pub fn new(value: f64) -> Self {
        Score { value, reason: None }
    }

    pub fn with_reason<S: Into<String>>(value: f64, reason: S) -> Self {
        Score {
            value,
            reason: Some(reason.into()),
        }
    }
}

/// Recorded outcome of a single case: metrics from the task, scores from
/// the evaluators, and the conversation that produced them.
///
/// Scores keep their insertion order; the report tables derive their
/// columns from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseResult {
    pub name: String,
    #[serde(default)]
    pub metrics: HashMap<String, f64>,
    #[serde(default)]
    pub scores: IndexMap<String, Score>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<Message>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<ExpectedOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CaseResult {
    /// Metric value, defaulting to 0 when the task never recorded it.
    pub fn metric(&self, name: &str) -> f64 {
        self.metrics.get(name).copied().unwrap_or(0.0)
    }

    /// Score value, defaulting to 0 when the case is missing the score.
    pub fn score_value(&self, name: &str) -> f64 {
        self.scores.get(name).map(|score| score.value).unwrap_or(0.0)
    }
}

/// The recorded outcome for one dataset within a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(default)]
    pub cases: Vec<CaseResult>,
}

/// A loaded run: its metadata plus whichever dataset reports were present
/// on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct RunData {
    pub metadata: RunMetadata,
    pub reports: HashMap<String, Report>,
}

impl RunData {
    /// Dataset ids listed in the metadata that have no report on disk.
    pub fn missing_datasets(&self) -> Vec<&str> {
        self.metadata
            .dataset_ids
            .iter()
            .filter(|id| !self.reports.contains_key(id.as_str()))
            .map(|id| id.as_str())
            .collect()
    }

    /// Whether every dataset listed in the metadata has a report.
    pub fn is_complete(&self) -> bool {
        self.missing_datasets().is_empty()
    }
}

/// Per-dataset aggregate over a run's cases.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetStats {
    pub dataset_id: String,
    pub run_id: String,
    pub task_name: String,
    pub num_cases: usize,
    pub avg_input_tokens: f64,
    pub avg_output_tokens: f64,
    pub avg_cost: f64,
    pub total_cost: f64,
    pub total_requests: f64,
    pub scores: IndexMap<String, ScoreStats>,
}

/// Mean, minimum and maximum of one score across a dataset's cases.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}
