use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use tern::message::{Message, ToolCall};

use crate::case::ExpectedOutput;
use crate::report::Score;
use crate::runner::{EvalContext, Evaluator};

/// Scores how well the tool calls in the output match the expected ones.
///
/// With `use_sets` (the default) unique tool names are compared, so
/// repeated calls to the same tool count once. Without it every occurrence
/// counts and repeats matter.
#[derive(Debug, Clone)]
pub struct ToolCallEvaluator {
    pub use_sets: bool,
}

impl Default for ToolCallEvaluator {
    fn default() -> Self {
        ToolCallEvaluator { use_sets: true }
    }
}

fn collect_tool_calls(messages: &[Message]) -> Vec<&ToolCall> {
    messages.iter().flat_map(|message| message.tool_calls()).collect()
}

// Model messages take precedence over the flat tool call list when both
// expectations are present.
fn expected_tool_calls(expected: &ExpectedOutput) -> Option<Vec<&ToolCall>> {
    if let Some(model_messages) = &expected.model_messages {
        if !model_messages.is_empty() {
            return Some(collect_tool_calls(model_messages));
        }
    }
    match &expected.tool_calls {
        Some(calls) if !calls.is_empty() => Some(calls.iter().collect()),
        _ => None,
    }
}

impl ToolCallEvaluator {
    pub fn new(use_sets: bool) -> Self {
        ToolCallEvaluator { use_sets }
    }

    fn score_value(&self, context: &EvalContext) -> f64 {
        let Some(expected) = &context.expected_output else {
            return 0.0;
        };

        let actual: Vec<&str> = collect_tool_calls(&context.output)
            .iter()
            .map(|call| call.name.as_str())
            .collect();

        let expected_names: Vec<&str> = match expected_tool_calls(expected) {
            Some(calls) if !calls.is_empty() => {
                calls.iter().map(|call| call.name.as_str()).collect()
            }
            // nothing expected: perfect only when nothing was called
            _ => return if actual.is_empty() { 1.0 } else { 0.0 },
        };

        if self.use_sets {
            let expected_set: HashSet<&str> = expected_names.iter().copied().collect();
            let actual_set: HashSet<&str> = actual.iter().copied().collect();
            let matches = expected_set.intersection(&actual_set).count();
            matches as f64 / expected_set.len() as f64
        } else {
            let mut actual_counts: HashMap<&str, usize> = HashMap::new();
            for name in actual.iter().copied() {
                *actual_counts.entry(name).or_insert(0) += 1;
            }
            let mut expected_counts: HashMap<&str, usize> = HashMap::new();
            for name in expected_names.iter().copied() {
                *expected_counts.entry(name).or_insert(0) += 1;
            }
            let matches: usize = expected_counts
                .iter()
                .map(|(name, count)| (*count).min(actual_counts.get(name).copied().unwrap_or(0)))
                .sum();
            matches as f64 / expected_names.len() as f64
        }
    }
}

#[async_trait]
impl Evaluator for ToolCallEvaluator {
    fn name(&self) -> &str {
        "ToolCallEvaluator"
    }

    async fn evaluate(&self, context: &EvalContext) -> anyhow::Result<Score> {
        Ok(Score::new(self.score_value(context)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn context_with(
        expected: Option<ExpectedOutput>,
        output_tool_names: &[&str],
    ) -> EvalContext {
        let mut output = vec![Message::assistant().with_text("working on it")];
        for (index, name) in output_tool_names.iter().enumerate() {
            output.push(
                Message::assistant()
                    .with_tool_request(format!("call_{}", index), ToolCall::new(*name, json!({}))),
            );
        }
        EvalContext {
            case_name: "case".to_string(),
            inputs: vec![Message::user().with_text("go")],
            output,
            expected_output: expected,
            metadata: Map::new(),
        }
    }

    fn expect_tools(names: &[&str]) -> ExpectedOutput {
        ExpectedOutput::default().with_tool_calls(
            names.iter().map(|name| ToolCall::new(*name, json!({}))).collect(),
        )
    }

    #[test]
    fn test_no_expected_output_scores_zero() {
        let evaluator = ToolCallEvaluator::default();
        let context = context_with(None, &["search"]);

        assert_eq!(evaluator.score_value(&context), 0.0);
    }

    #[test]
    fn test_nothing_expected_and_nothing_called_is_perfect() {
        let evaluator = ToolCallEvaluator::default();

        let quiet = context_with(Some(ExpectedOutput::default()), &[]);
        assert_eq!(evaluator.score_value(&quiet), 1.0);

        let chatty = context_with(Some(ExpectedOutput::default()), &["search"]);
        assert_eq!(evaluator.score_value(&chatty), 0.0);
    }

    #[test]
    fn test_exact_match_scores_one() {
        let evaluator = ToolCallEvaluator::default();
        let context = context_with(Some(expect_tools(&["search", "fetch"])), &["fetch", "search"]);

        assert_eq!(evaluator.score_value(&context), 1.0);
    }

    #[test]
    fn test_partial_match_in_set_mode() {
        let evaluator = ToolCallEvaluator::default();
        let context = context_with(Some(expect_tools(&["search", "fetch"])), &["search"]);

        assert_eq!(evaluator.score_value(&context), 0.5);
    }

    #[test]
    fn test_set_mode_ignores_repeats() {
        let evaluator = ToolCallEvaluator::default();
        let context = context_with(
            Some(expect_tools(&["search"])),
            &["search", "search", "search"],
        );

        assert_eq!(evaluator.score_value(&context), 1.0);
    }

    #[test]
    fn test_count_mode_penalizes_missing_repeats() {
        let evaluator = ToolCallEvaluator::new(false);
        let context = context_with(
            Some(expect_tools(&["search", "search", "fetch"])),
            &["search", "fetch", "fetch"],
        );

        // one of two searches plus one fetch out of three expected calls
        let score = evaluator.score_value(&context);
        assert!((score - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_model_messages_take_precedence() {
        let evaluator = ToolCallEvaluator::default();
        let model_messages = vec![
            Message::assistant().with_tool_request("call_0", ToolCall::new("fetch", json!({}))),
        ];
        let expected = ExpectedOutput::default()
            .with_tool_calls(vec![ToolCall::new("search", json!({}))])
            .with_model_messages(model_messages);

        let context = context_with(Some(expected), &["fetch"]);
        assert_eq!(evaluator.score_value(&context), 1.0);
    }

    #[test]
    fn test_empty_model_messages_fall_back_to_tool_calls() {
        let evaluator = ToolCallEvaluator::default();
        let expected = ExpectedOutput::default()
            .with_tool_calls(vec![ToolCall::new("search", json!({}))])
            .with_model_messages(vec![]);

        let context = context_with(Some(expected), &["search"]);
        assert_eq!(evaluator.score_value(&context), 1.0);
    }

    #[tokio::test]
    async fn test_evaluator_trait_produces_named_score() {
        let evaluator = ToolCallEvaluator::default();
        let context = context_with(Some(expect_tools(&["search"])), &["search"]);

        let score = evaluator.evaluate(&context).await.unwrap();

        assert_eq!(evaluator.name(), "ToolCallEvaluator");
        assert_eq!(score.value, 1.0);
        assert!(score.reason.is_none());
    }
}
