use std::path::Path;

use indexmap::IndexMap;

use crate::errors::EvalResult;
use crate::report::loader::load_run;
use crate::report::types::{CaseResult, DatasetStats, RunData, RunMetadata, ScoreStats};

fn aggregate_dataset(
    dataset_id: &str,
    cases: &[CaseResult],
    metadata: &RunMetadata,
) -> DatasetStats {
    let count = cases.len() as f64;
    let total_input: f64 = cases.iter().map(|case| case.metric("input_tokens")).sum();
    let total_output: f64 = cases.iter().map(|case| case.metric("output_tokens")).sum();
    let total_cost: f64 = cases.iter().map(|case| case.metric("cost")).sum();
    let total_requests: f64 = cases.iter().map(|case| case.metric("requests")).sum();

    // score columns come from the first case; later cases missing a score
    // count as zero
    let mut scores = IndexMap::new();
    if let Some(first) = cases.first() {
        for name in first.scores.keys() {
            let values: Vec<f64> = cases.iter().map(|case| case.score_value(name)).collect();
            let sum: f64 = values.iter().sum();
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            scores.insert(
                name.clone(),
                ScoreStats {
                    avg: sum / count,
                    min,
                    max,
                },
            );
        }
    }

    DatasetStats {
        dataset_id: dataset_id.to_string(),
        run_id: metadata.run_id.clone(),
        task_name: metadata.task_name.clone(),
        num_cases: cases.len(),
        avg_input_tokens: total_input / count,
        avg_output_tokens: total_output / count,
        avg_cost: total_cost / count,
        total_cost,
        total_requests,
        scores,
    }
}

/// Aggregate a run into one stats row per dataset, in metadata order.
///
/// Datasets with no report on disk or no cases are skipped rather than
/// producing empty rows.
pub fn aggregate_run(run_data: &RunData) -> Vec<DatasetStats> {
    run_data
        .metadata
        .dataset_ids
        .iter()
        .filter_map(|dataset_id| {
            let report = run_data.reports.get(dataset_id)?;
            if report.cases.is_empty() {
                return None;
            }
            Some(aggregate_dataset(dataset_id, &report.cases, &run_data.metadata))
        })
        .collect()
}

/// Load several runs and aggregate them into one list of stats rows, run
/// order first, dataset order within each run. Any run that fails to load
/// propagates its error.
pub fn compare_runs(base_dir: &Path, run_ids: &[String]) -> EvalResult<Vec<DatasetStats>> {
    let mut rows = Vec::new();
    for run_id in run_ids {
        let run_data = load_run(base_dir, run_id)?;
        rows.extend(aggregate_run(&run_data));
    }
    Ok(rows)
}
