use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::{debug, info, warn};

use tern::message::Message;

use crate::case::ExpectedOutput;
use crate::dataset::{BuiltCase, BuiltDataset, Hook};
use crate::errors::{EvalError, EvalResult};
use crate::report::{CaseResult, Report, Score};

/// What a task produces for one case: its output messages plus any metrics
/// it wants recorded, conventionally `input_tokens`, `output_tokens`,
/// `requests` and `cost`.
#[derive(Debug, Clone, Default)]
pub struct TaskOutput {
    pub messages: Vec<Message>,
    pub metrics: HashMap<String, f64>,
}

impl TaskOutput {
    pub fn new(messages: Vec<Message>) -> Self {
        TaskOutput {
            messages,
            metrics: HashMap::new(),
        }
    }

    pub fn with_metric<S: Into<String>>(mut self, name: S, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }
}

/// The system under evaluation.
#[async_trait]
pub trait Task: Send + Sync {
    async fn run(&self, inputs: Vec<Message>) -> anyhow::Result<TaskOutput>;
}

/// Everything an evaluator can look at for one case.
#[derive(Debug, Clone)]
pub struct EvalContext {
    pub case_name: String,
    pub inputs: Vec<Message>,
    pub output: Vec<Message>,
    pub expected_output: Option<ExpectedOutput>,
    pub metadata: Map<String, Value>,
}

/// Scores one case; `name` becomes the score key in the report.
#[async_trait]
pub trait Evaluator: Send + Sync {
    fn name(&self) -> &str;

    async fn evaluate(&self, context: &EvalContext) -> anyhow::Result<Score>;
}

/// Retry policy for task or evaluator invocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total tries, including the first.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
    /// When true a final failure aborts the whole evaluation; when false
    /// it is recorded on the case and evaluation continues.
    pub reraise_last_error: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 3,
            base_delay_ms: 100,
            backoff_factor: 2,
            max_delay_ms: Some(10_000),
            reraise_last_error: true,
        }
    }
}

impl RetryConfig {
    fn sleeps(&self) -> Vec<Duration> {
        let mut backoff =
            ExponentialBackoff::from_millis(self.base_delay_ms).factor(self.backoff_factor);
        if let Some(cap) = self.max_delay_ms {
            backoff = backoff.max_delay(Duration::from_millis(cap));
        }
        backoff
            .map(jitter)
            .take(self.max_attempts.saturating_sub(1) as usize)
            .collect()
    }

    fn reraise(config: Option<&RetryConfig>) -> bool {
        config.map(|config| config.reraise_last_error).unwrap_or(true)
    }
}

/// Knobs for one evaluation call.
#[derive(Debug, Clone)]
pub struct EvaluateOptions {
    pub retry_task: Option<RetryConfig>,
    pub retry_evaluators: Option<RetryConfig>,
    pub max_concurrency: usize,
    pub wrap_with_hooks: bool,
}

impl Default for EvaluateOptions {
    fn default() -> Self {
        EvaluateOptions {
            retry_task: None,
            retry_evaluators: None,
            max_concurrency: 5,
            wrap_with_hooks: true,
        }
    }
}

async fn with_retry<T, F, Fut>(config: Option<&RetryConfig>, mut action: F) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<T>>,
{
    match config {
        None => action().await,
        Some(config) => Retry::spawn(config.sleeps(), action).await,
    }
}

struct CaseWorker {
    task: Arc<dyn Task>,
    evaluators: Vec<Arc<dyn Evaluator>>,
    pre_hook: Option<Arc<dyn Hook>>,
    post_hook: Option<Arc<dyn Hook>>,
    retry_task: Option<RetryConfig>,
    retry_evaluators: Option<RetryConfig>,
}

impl CaseWorker {
    async fn run_case(&self, case: BuiltCase) -> EvalResult<CaseResult> {
        let BuiltCase {
            name,
            inputs,
            expected_output,
            metadata,
        } = case;

        // hooks run once per case, outside any retry loop
        let mut inputs = inputs;
        if let Some(pre) = &self.pre_hook {
            inputs = pre.call(inputs).await.map_err(EvalError::from)?;
        }

        let task = self.task.clone();
        let task_inputs = inputs.clone();
        let outcome = with_retry(self.retry_task.as_ref(), move || {
            let task = task.clone();
            let inputs = task_inputs.clone();
            async move { task.run(inputs).await }
        })
        .await;

        let output = match outcome {
            Ok(output) => output,
            Err(err) => {
                if RetryConfig::reraise(self.retry_task.as_ref()) {
                    return Err(EvalError::Engine(format!(
                        "task failed for case '{}': {}",
                        name, err
                    )));
                }
                warn!(case = %name, error = %err, "task failed; recording error on case");
                return Ok(CaseResult {
                    name,
                    inputs,
                    expected_output,
                    error: Some(err.to_string()),
                    ..Default::default()
                });
            }
        };

        let mut output_messages = output.messages;
        if let Some(post) = &self.post_hook {
            output_messages = post.call(output_messages).await.map_err(EvalError::from)?;
        }

        let context = EvalContext {
            case_name: name.clone(),
            inputs,
            output: output_messages,
            expected_output,
            metadata,
        };

        let mut scores = IndexMap::new();
        let mut failures: Vec<String> = Vec::new();
        for evaluator in &self.evaluators {
            let action_evaluator = evaluator.clone();
            let context_ref = &context;
            let outcome = with_retry(self.retry_evaluators.as_ref(), move || {
                let evaluator = action_evaluator.clone();
                async move { evaluator.evaluate(context_ref).await }
            })
            .await;

            match outcome {
                Ok(score) => {
                    scores.insert(evaluator.name().to_string(), score);
                }
                Err(err) => {
                    if RetryConfig::reraise(self.retry_evaluators.as_ref()) {
                        return Err(EvalError::Engine(format!(
                            "evaluator '{}' failed for case '{}': {}",
                            evaluator.name(),
                            context.case_name,
                            err
                        )));
                    }
                    warn!(
                        case = %context.case_name,
                        evaluator = evaluator.name(),
                        error = %err,
                        "evaluator failed; omitting score"
                    );
                    failures.push(format!("evaluator '{}' failed: {}", evaluator.name(), err));
                }
            }
        }

        Ok(CaseResult {
            name,
            metrics: output.metrics,
            scores,
            inputs: context.inputs,
            output: context.output,
            expected_output: context.expected_output,
            error: if failures.is_empty() {
                None
            } else {
                Some(failures.join("; "))
            },
        })
    }
}

/// Evaluate every case of `dataset` with bounded concurrency.
///
/// Each case runs on its own tokio task; a semaphore holds parallelism at
/// `max_concurrency`. Results come back in case order regardless of
/// completion order.
pub async fn evaluate_cases(
    dataset: BuiltDataset,
    task: Arc<dyn Task>,
    evaluators: Vec<Arc<dyn Evaluator>>,
    pre_hook: Option<Arc<dyn Hook>>,
    post_hook: Option<Arc<dyn Hook>>,
    options: &EvaluateOptions,
) -> EvalResult<Report> {
    if options.max_concurrency == 0 {
        return Err(EvalError::Validation(
            "max_concurrency must be at least 1".to_string(),
        ));
    }

    info!(dataset = %dataset.name, cases = dataset.cases.len(), "starting evaluation");

    let worker = Arc::new(CaseWorker {
        task,
        evaluators,
        pre_hook,
        post_hook,
        retry_task: options.retry_task.clone(),
        retry_evaluators: options.retry_evaluators.clone(),
    });
    let semaphore = Arc::new(Semaphore::new(options.max_concurrency));

    let mut handles = Vec::with_capacity(dataset.cases.len());
    for case in dataset.cases {
        let worker = worker.clone();
        let semaphore = semaphore.clone();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| EvalError::Engine("case semaphore closed".to_string()))?;
            worker.run_case(case).await
        }));
    }

    let mut cases = Vec::with_capacity(handles.len());
    for handle in handles {
        let case_result = handle
            .await
            .map_err(|err| EvalError::Engine(format!("case task panicked: {}", err)))??;
        debug!(case = %case_result.name, "case complete");
        cases.push(case_result);
    }

    info!(cases = cases.len(), "evaluation complete");

    Ok(Report { cases })
}
