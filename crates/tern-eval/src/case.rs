use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use tern::message::{Message, ToolCall};

/// Expected results for a case. Any combination of a final response text,
/// tool calls, and full model messages may be present; evaluators pick the
/// parts they care about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpectedOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_messages: Option<Vec<Message>>,
}

impl ExpectedOutput {
    pub fn with_output_message<S: Into<String>>(mut self, text: S) -> Self {
        self.output_message = Some(text.into());
        self
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = Some(tool_calls);
        self
    }

    pub fn with_model_messages(mut self, messages: Vec<Message>) -> Self {
        self.model_messages = Some(messages);
        self
    }
}

/// A test case definition: an input conversation plus expectations about
/// what the task should produce for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSpec {
    pub name: String,
    pub input_messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<ExpectedOutput>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<usize>,
}

impl CaseSpec {
    pub fn new<S: Into<String>>(name: S, input_messages: Vec<Message>) -> Self {
        CaseSpec {
            name: name.into(),
            input_messages,
            expected_output: None,
            metadata: Map::new(),
            description: None,
            variant: None,
        }
    }

    pub fn with_expected_output(mut self, expected: ExpectedOutput) -> Self {
        self.expected_output = Some(expected);
        self
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Derive variant number `index` of this case. A variant keeps the
    /// inputs and expectations and is renamed `"{name} - Variant {index}"`.
    pub fn variant_of(&self, index: usize) -> CaseSpec {
        let mut variant = self.clone();
        variant.name = format!("{} - Variant {}", self.name, index);
        variant.variant = Some(index);
        variant
    }
}
