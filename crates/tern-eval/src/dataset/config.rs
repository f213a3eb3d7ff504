use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use tern::message::Message;

use crate::case::{CaseSpec, ExpectedOutput};

/// Serializable definition of a dataset: the original case, its variants,
/// and optional hook ids.
///
/// Hooks are stored as plain ids. They resolve against a hook library at
/// evaluation time, so a reloaded config works in a process that built its
/// library differently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub dataset_id: String,
    pub name: String,
    pub original_case: CaseSpec,
    #[serde(default)]
    pub variants: Vec<CaseSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_task_hook_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_task_hook_id: Option<String>,
}

impl DatasetConfig {
    /// Original case plus all variants.
    pub fn case_count(&self) -> usize {
        1 + self.variants.len()
    }

    /// Build the runnable artifact: the original case first, then the
    /// variants in order.
    pub fn build(&self) -> BuiltDataset {
        let mut cases = Vec::with_capacity(self.case_count());
        cases.push(BuiltCase::from_spec(&self.original_case));
        cases.extend(self.variants.iter().map(BuiltCase::from_spec));
        BuiltDataset {
            name: self.name.clone(),
            cases,
        }
    }
}

/// A dataset in the shape the case runner consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuiltDataset {
    pub name: String,
    #[serde(default)]
    pub cases: Vec<BuiltCase>,
}

/// One runnable case of a built dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuiltCase {
    pub name: String,
    pub inputs: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<ExpectedOutput>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl BuiltCase {
    fn from_spec(spec: &CaseSpec) -> Self {
        BuiltCase {
            name: spec.name.clone(),
            inputs: spec.input_messages.clone(),
            expected_output: spec.expected_output.clone(),
            metadata: spec.metadata.clone(),
        }
    }
}
