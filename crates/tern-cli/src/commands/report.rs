use std::path::Path;

use anyhow::Result;
use console::style;
use tracing::debug;

use tern_eval::report::{
    export_run_csv, format_dataset_table, format_run_summary_table, load_run, RunData,
};

fn warn_on_missing(run_data: &RunData) {
    let missing = run_data.missing_datasets();
    if !missing.is_empty() {
        eprintln!(
            "{}",
            style(format!("warning: no report found for: {}", missing.join(", "))).yellow()
        );
    }
}

pub fn handle_table(
    base_dir: &Path,
    run_id: &str,
    dataset_id: &str,
    score_names: Option<&[String]>,
    include_metrics: bool,
) -> Result<()> {
    let run_data = load_run(base_dir, run_id)?;
    debug!(run_id, reports = run_data.reports.len(), "run loaded");

    let table = format_dataset_table(&run_data.reports, dataset_id, score_names, include_metrics)?;
    println!("{}", table);

    warn_on_missing(&run_data);
    Ok(())
}

pub fn handle_summary(
    base_dir: &Path,
    run_id: &str,
    score_names: Option<&[String]>,
    include_metrics: bool,
) -> Result<()> {
    let run_data = load_run(base_dir, run_id)?;
    debug!(run_id, reports = run_data.reports.len(), "run loaded");

    let table = format_run_summary_table(&run_data, score_names, include_metrics);
    println!("{}", table);

    warn_on_missing(&run_data);
    Ok(())
}

pub fn handle_export(base_dir: &Path, run_id: &str, output: &Path, aggregate: bool) -> Result<()> {
    let run_data = load_run(base_dir, run_id)?;
    export_run_csv(&run_data, output, aggregate)?;

    println!(
        "{}",
        style(format!("Exported run '{}' to {}", run_id, output.display())).green()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tern_eval::report::{save_run, CaseResult, Report, RunMetadata};

    fn saved_run(base: &Path) {
        let mut metrics = HashMap::new();
        metrics.insert("input_tokens".to_string(), 100.0);
        let case = CaseResult {
            name: "case_a".to_string(),
            metrics,
            ..Default::default()
        };

        let mut reports = HashMap::new();
        reports.insert("alpha".to_string(), Report { cases: vec![case] });

        let run = RunData {
            metadata: RunMetadata {
                run_id: "run_1".to_string(),
                task_name: "demo".to_string(),
                dataset_ids: vec!["alpha".to_string()],
            },
            reports,
        };
        save_run(base, &run, false).unwrap();
    }

    #[test]
    fn test_handle_table_renders_saved_run() -> Result<()> {
        let base = tempfile::tempdir()?;
        saved_run(base.path());

        handle_table(base.path(), "run_1", "alpha", None, true)?;

        let result = handle_table(base.path(), "run_1", "missing_dataset", None, true);
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn test_handle_export_writes_csv() -> Result<()> {
        let base = tempfile::tempdir()?;
        saved_run(base.path());
        let output = base.path().join("out.csv");

        handle_export(base.path(), "run_1", &output, false)?;

        let contents = std::fs::read_to_string(&output)?;
        assert!(contents.starts_with("case_name,dataset_id"));
        assert!(contents.contains("case_a,alpha"));
        Ok(())
    }

    #[test]
    fn test_missing_run_is_an_error() -> Result<()> {
        let base = tempfile::tempdir()?;

        assert!(handle_summary(base.path(), "no_such_run", None, true).is_err());
        Ok(())
    }
}
