use std::io::Write;
use std::path::Path;

use crate::errors::EvalResult;
use crate::report::stats::aggregate_run;
use crate::report::types::RunData;

// CSV columns use the same normalization everywhere: spaces and hyphens
// become underscores.
fn normalize_column(name: &str) -> String {
    name.replace([' ', '-'], "_")
}

/// Flatten a run into CSV at `path`.
///
/// With `aggregate` false, one row per case across every dataset in
/// metadata order: identity columns, the conventional metrics, then
/// `score_<name>` / `score_<name>_reason` column pairs. With `aggregate`
/// true, one row per dataset with `avg_score_<name>`, `min_score_<name>`
/// and `max_score_<name>` columns. Score cells a row does not have stay
/// empty.
pub fn export_run_csv(run_data: &RunData, path: &Path, aggregate: bool) -> EvalResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    if aggregate {
        write_aggregate_rows(run_data, &mut writer)?;
    } else {
        write_case_rows(run_data, &mut writer)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_case_rows<W: Write>(run_data: &RunData, writer: &mut csv::Writer<W>) -> EvalResult<()> {
    let mut score_columns: Vec<String> = Vec::new();
    for dataset_id in &run_data.metadata.dataset_ids {
        let Some(report) = run_data.reports.get(dataset_id) else {
            continue;
        };
        for case in &report.cases {
            for name in case.scores.keys() {
                let column = normalize_column(name);
                if !score_columns.contains(&column) {
                    score_columns.push(column);
                }
            }
        }
    }

    let mut header = vec![
        "case_name".to_string(),
        "dataset_id".to_string(),
        "input_tokens".to_string(),
        "output_tokens".to_string(),
        "requests".to_string(),
        "cost".to_string(),
    ];
    for column in &score_columns {
        header.push(format!("score_{}", column));
        header.push(format!("score_{}_reason", column));
    }
    writer.write_record(&header)?;

    for dataset_id in &run_data.metadata.dataset_ids {
        let Some(report) = run_data.reports.get(dataset_id) else {
            continue;
        };
        for case in &report.cases {
            let mut record = vec![
                case.name.clone(),
                dataset_id.clone(),
                case.metric("input_tokens").to_string(),
                case.metric("output_tokens").to_string(),
                case.metric("requests").to_string(),
                case.metric("cost").to_string(),
            ];
            for column in &score_columns {
                let found = case
                    .scores
                    .iter()
                    .find(|(name, _)| normalize_column(name) == *column);
                match found {
                    Some((_, score)) => {
                        record.push(score.value.to_string());
                        record.push(score.reason.clone().unwrap_or_default());
                    }
                    None => {
                        record.push(String::new());
                        record.push(String::new());
                    }
                }
            }
            writer.write_record(&record)?;
        }
    }

    Ok(())
}

fn write_aggregate_rows<W: Write>(
    run_data: &RunData,
    writer: &mut csv::Writer<W>,
) -> EvalResult<()> {
    let stats = aggregate_run(run_data);

    let mut score_columns: Vec<String> = Vec::new();
    for row in &stats {
        for name in row.scores.keys() {
            let column = normalize_column(name);
            if !score_columns.contains(&column) {
                score_columns.push(column);
            }
        }
    }

    let mut header = vec![
        "dataset_id".to_string(),
        "run_id".to_string(),
        "task_name".to_string(),
        "num_cases".to_string(),
        "avg_input_tokens".to_string(),
        "avg_output_tokens".to_string(),
        "avg_cost".to_string(),
        "total_cost".to_string(),
        "total_requests".to_string(),
    ];
    for column in &score_columns {
        header.push(format!("avg_score_{}", column));
        header.push(format!("min_score_{}", column));
        header.push(format!("max_score_{}", column));
    }
    writer.write_record(&header)?;

    for row in &stats {
        let mut record = vec![
            row.dataset_id.clone(),
            row.run_id.clone(),
            row.task_name.clone(),
            row.num_cases.to_string(),
            row.avg_input_tokens.to_string(),
            row.avg_output_tokens.to_string(),
            row.avg_cost.to_string(),
            row.total_cost.to_string(),
            row.total_requests.to_string(),
        ];
        for column in &score_columns {
            let found = row
                .scores
                .iter()
                .find(|(name, _)| normalize_column(name) == *column);
            match found {
                Some((_, score_stats)) => {
                    record.push(score_stats.avg.to_string());
                    record.push(score_stats.min.to_string());
                    record.push(score_stats.max.to_string());
                }
                None => {
                    record.extend([String::new(), String::new(), String::new()]);
                }
            }
        }
        writer.write_record(&record)?;
    }

    Ok(())
}
