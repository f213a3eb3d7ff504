use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::errors::{EvalError, EvalResult};
use crate::persist::write_json_atomic;
use crate::report::types::RunData;

/// Produce a run id in the `{task_name}_{timestamp}` form the report
/// directory layout uses.
pub fn generate_run_id(task_name: &str) -> String {
    format!("{}_{}", task_name, Local::now().format("%Y%m%d_%H%M%S"))
}

/// Persist a run under `base_dir` in the layout `load_run` reads back:
/// `{run_id}/metadata.json` plus `{run_id}/reports/{dataset_id}.json` for
/// each dataset present in `run`.
///
/// Each file is written atomically. An existing run is left untouched
/// unless `overwrite` is set. Returns the run directory.
pub fn save_run(base_dir: &Path, run: &RunData, overwrite: bool) -> EvalResult<PathBuf> {
    let run_dir = base_dir.join(&run.metadata.run_id);
    let metadata_path = run_dir.join("metadata.json");

    if metadata_path.exists() && !overwrite {
        return Err(EvalError::AlreadyExists(metadata_path));
    }

    let reports_dir = run_dir.join("reports");
    fs::create_dir_all(&reports_dir)?;

    for dataset_id in &run.metadata.dataset_ids {
        if let Some(report) = run.reports.get(dataset_id) {
            write_json_atomic(&reports_dir.join(format!("{}.json", dataset_id)), report)?;
        }
    }
    write_json_atomic(&metadata_path, &run.metadata)?;

    Ok(run_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::loader::load_run;
    use crate::report::types::{CaseResult, Report, RunMetadata, Score};
    use std::collections::HashMap;

    fn sample_run(run_id: &str) -> RunData {
        let mut scores = indexmap::IndexMap::new();
        scores.insert("accuracy".to_string(), Score::new(0.75));

        let mut metrics = HashMap::new();
        metrics.insert("input_tokens".to_string(), 120.0);

        let case = CaseResult {
            name: "addone_case_1".to_string(),
            metrics,
            scores,
            ..Default::default()
        };

        let mut reports = HashMap::new();
        reports.insert("alpha".to_string(), Report { cases: vec![case] });

        RunData {
            metadata: RunMetadata {
                run_id: run_id.to_string(),
                task_name: "addone task".to_string(),
                dataset_ids: vec!["alpha".to_string()],
            },
            reports,
        }
    }

    #[test]
    fn test_save_then_load_round_trip() -> anyhow::Result<()> {
        let base = tempfile::tempdir()?;
        let run = sample_run("run_1");

        let run_dir = save_run(base.path(), &run, false)?;
        assert!(run_dir.join("metadata.json").is_file());
        assert!(run_dir.join("reports").join("alpha.json").is_file());

        let loaded = load_run(base.path(), "run_1")?;
        assert_eq!(loaded.metadata, run.metadata);
        assert_eq!(loaded.reports["alpha"].cases[0].name, "addone_case_1");
        assert_eq!(loaded.reports["alpha"].cases[0].score_value("accuracy"), 0.75);
        Ok(())
    }

    #[test]
    fn test_existing_run_is_not_overwritten_by_default() -> anyhow::Result<()> {
        let base = tempfile::tempdir()?;
        save_run(base.path(), &sample_run("run_1"), false)?;

        let result = save_run(base.path(), &sample_run("run_1"), false);
        assert!(matches!(result, Err(EvalError::AlreadyExists(_))));

        // with overwrite the second save wins
        let mut replacement = sample_run("run_1");
        replacement.metadata.task_name = "revised task".to_string();
        save_run(base.path(), &replacement, true)?;

        let loaded = load_run(base.path(), "run_1")?;
        assert_eq!(loaded.metadata.task_name, "revised task");
        Ok(())
    }

    #[test]
    fn test_generate_run_id_embeds_task_name() {
        let run_id = generate_run_id("demo");
        assert!(run_id.starts_with("demo_"));
        // timestamp suffix is yyyymmdd_hhmmss
        assert_eq!(run_id.len(), "demo_".len() + 15);
    }
}
