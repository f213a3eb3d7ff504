use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::errors::{EvalError, EvalResult};
use crate::report::types::{Report, RunData, RunMetadata};

/// Load one run's metadata and per-dataset reports from `base_dir`.
///
/// A run with no metadata file does not exist and fails before any report
/// is read. Reports listed in the metadata but absent on disk are skipped;
/// `RunData::missing_datasets` says which ones. A report that exists but
/// does not parse is an error, not a skip.
pub fn load_run(base_dir: &Path, run_id: &str) -> EvalResult<RunData> {
    let run_dir = base_dir.join(run_id);
    let metadata_path = run_dir.join("metadata.json");

    if !metadata_path.is_file() {
        return Err(EvalError::NotFound(format!(
            "metadata for run '{}' at {}",
            run_id,
            metadata_path.display()
        )));
    }

    let metadata: RunMetadata = serde_json::from_str(&fs::read_to_string(&metadata_path)?)?;

    let reports_dir = run_dir.join("reports");
    let mut reports = HashMap::new();
    for dataset_id in &metadata.dataset_ids {
        let report_path = reports_dir.join(format!("{}.json", dataset_id));
        if !report_path.is_file() {
            continue;
        }
        let report: Report = serde_json::from_str(&fs::read_to_string(&report_path)?)?;
        reports.insert(dataset_id.clone(), report);
    }

    Ok(RunData { metadata, reports })
}
