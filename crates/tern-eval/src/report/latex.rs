use std::collections::HashMap;

use crate::errors::{EvalError, EvalResult};
use crate::report::stats::aggregate_run;
use crate::report::types::{Report, RunData};

/// Escape LaTeX structural characters in one pass over the text.
///
/// Backslash becomes `\textbackslash{}`. A single pass guarantees no
/// replacement is itself re-escaped, so the braces introduced for
/// backslash survive intact.
pub fn escape_latex(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\textbackslash{}"),
            '&' => escaped.push_str("\\&"),
            '%' => escaped.push_str("\\%"),
            '$' => escaped.push_str("\\$"),
            '#' => escaped.push_str("\\#"),
            '_' => escaped.push_str("\\_"),
            '{' => escaped.push_str("\\{"),
            '}' => escaped.push_str("\\}"),
            '~' => escaped.push_str("\\textasciitilde{}"),
            '^' => escaped.push_str("\\^{}"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn format_number(value: f64, precision: usize) -> String {
    format!("{:.*}", precision, value)
}

// Score names compare with spaces, hyphens and underscores interchangeable.
fn normalize_score_name(name: &str) -> String {
    name.replace([' ', '-'], "_")
}

fn display_score_name(name: &str) -> String {
    name.replace(['_', '-'], " ")
}

/// Keep the available columns that were requested, in data order. With no
/// request, every available column stays.
fn select_scores(available: Vec<String>, requested: Option<&[String]>) -> Vec<String> {
    match requested {
        None => available,
        Some(requested) => {
            let wanted: Vec<String> = requested
                .iter()
                .map(|name| normalize_score_name(name))
                .collect();
            available
                .into_iter()
                .filter(|name| wanted.contains(&normalize_score_name(name)))
                .collect()
        }
    }
}

fn render_table(headers: &[String], rows: &[Vec<String>], caption: &str, label: &str) -> String {
    let col_spec = format!("l{}", "r".repeat(headers.len().saturating_sub(1)));

    let mut lines = vec![
        "\\begin{table}[htbp]".to_string(),
        "\\centering".to_string(),
        format!("\\begin{{tabular}}{{{}}}", col_spec),
        "\\hline".to_string(),
        format!("{} \\\\", headers.join(" & ")),
        "\\hline".to_string(),
    ];

    for row in rows {
        lines.push(format!("{} \\\\", row.join(" & ")));
    }

    lines.extend([
        "\\hline".to_string(),
        "\\end{tabular}".to_string(),
        format!("\\caption{{{}}}", caption),
        format!("\\label{{{}}}", label),
        "\\end{table}".to_string(),
    ]);

    lines.join("\n")
}

fn render_empty_table(caption: &str, label: &str) -> String {
    [
        "\\begin{table}[htbp]".to_string(),
        "\\centering".to_string(),
        "\\begin{tabular}{l}".to_string(),
        "\\hline".to_string(),
        "No data available \\\\".to_string(),
        "\\hline".to_string(),
        "\\end{tabular}".to_string(),
        format!("\\caption{{{}}}", caption),
        format!("\\label{{{}}}", label),
        "\\end{table}".to_string(),
    ]
    .join("\n")
}

/// Render one dataset's cases as a LaTeX table.
///
/// Score columns default to the first case's scores in insertion order;
/// `score_names` narrows them (spaces, hyphens and underscores are
/// interchangeable when matching). Token counts print with 0 decimals,
/// cost with 4, scores with 2. A present-but-empty dataset renders a
/// "No data available" table rather than failing.
pub fn format_dataset_table(
    reports: &HashMap<String, Report>,
    dataset_id: &str,
    score_names: Option<&[String]>,
    include_metrics: bool,
) -> EvalResult<String> {
    let report = reports
        .get(dataset_id)
        .ok_or_else(|| EvalError::NotFound(format!("dataset '{}' in reports", dataset_id)))?;

    let caption = format!(
        "Evaluation results for dataset: {}",
        escape_latex(dataset_id)
    );
    let label = format!("tab:{}", dataset_id);

    if report.cases.is_empty() {
        return Ok(render_empty_table(&caption, &label));
    }

    let available: Vec<String> = report
        .cases
        .first()
        .map(|case| case.scores.keys().cloned().collect())
        .unwrap_or_default();
    let score_cols = select_scores(available, score_names);

    let mut headers = vec!["Case Name".to_string()];
    if include_metrics {
        headers.extend([
            "Input Tokens".to_string(),
            "Output Tokens".to_string(),
            "Cost".to_string(),
        ]);
    }
    headers.extend(score_cols.iter().map(|name| display_score_name(name)));

    let rows: Vec<Vec<String>> = report
        .cases
        .iter()
        .map(|case| {
            let mut row = vec![escape_latex(&case.name)];
            if include_metrics {
                row.push(format_number(case.metric("input_tokens"), 0));
                row.push(format_number(case.metric("output_tokens"), 0));
                row.push(format_number(case.metric("cost"), 4));
            }
            for name in &score_cols {
                row.push(format_number(case.score_value(name), 2));
            }
            row
        })
        .collect();

    Ok(render_table(&headers, &rows, &caption, &label))
}

/// Render the per-dataset summary table for a run, one row of means per
/// dataset in metadata order. Datasets with no report or no cases are
/// skipped; a run where everything is skipped renders the empty shell.
pub fn format_run_summary_table(
    run_data: &RunData,
    score_names: Option<&[String]>,
    include_metrics: bool,
) -> String {
    let metadata = &run_data.metadata;
    let caption = format!("Run summary: {}", escape_latex(&metadata.task_name));
    let label = format!("tab:run_{}", metadata.run_id);

    let stats = aggregate_run(run_data);
    if stats.is_empty() {
        return render_empty_table(&caption, &label);
    }

    // score columns in first appearance order across datasets
    let mut available: Vec<String> = Vec::new();
    for row in &stats {
        for name in row.scores.keys() {
            if !available.contains(name) {
                available.push(name.clone());
            }
        }
    }
    let score_cols = select_scores(available, score_names);

    let mut headers = vec!["Dataset".to_string()];
    if include_metrics {
        headers.extend([
            "Avg Input Tokens".to_string(),
            "Avg Output Tokens".to_string(),
            "Avg Cost".to_string(),
        ]);
    }
    headers.extend(score_cols.iter().map(|name| display_score_name(name)));

    let rows: Vec<Vec<String>> = stats
        .iter()
        .map(|row| {
            let mut cells = vec![escape_latex(&row.dataset_id)];
            if include_metrics {
                cells.push(format_number(row.avg_input_tokens, 0));
                cells.push(format_number(row.avg_output_tokens, 0));
                cells.push(format_number(row.avg_cost, 4));
            }
            for name in &score_cols {
                let avg = row.scores.get(name).map(|stats| stats.avg).unwrap_or(0.0);
                cells.push(format_number(avg, 2));
            }
            cells
        })
        .collect();

    render_table(&headers, &rows, &caption, &label)
}
