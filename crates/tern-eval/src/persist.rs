use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::errors::EvalResult;

/// Write a value as pretty-printed JSON through a temporary sibling file
/// and rename it into place.
///
/// The rename makes each file land atomically, so readers never observe a
/// half-written file. Multi-file layouts get per-file atomicity only;
/// callers needing cross-file consistency must order their writes.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> EvalResult<()> {
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, serde_json::to_string_pretty(value)?)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_write_then_read_back() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("value.json");

        write_json_atomic(&path, &json!({"answer": 42}))?;

        let loaded: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        assert_eq!(loaded["answer"], 42);
        Ok(())
    }

    #[test]
    fn test_no_temporary_file_left_behind() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("value.json");

        write_json_atomic(&path, &json!([1, 2, 3]))?;

        let entries: Vec<_> = fs::read_dir(dir.path())?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("value.json")]);
        Ok(())
    }

    #[test]
    fn test_overwrites_existing_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("value.json");

        write_json_atomic(&path, &json!({"version": 1}))?;
        write_json_atomic(&path, &json!({"version": 2}))?;

        let loaded: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        assert_eq!(loaded["version"], 2);
        Ok(())
    }
}
