use std::fs;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::case::CaseSpec;
use crate::dataset::config::{BuiltDataset, DatasetConfig};
use crate::dataset::hooks::{Hook, HookLibrary};
use crate::errors::{EvalError, EvalResult};
use crate::persist::write_json_atomic;
use crate::report::Report;
use crate::runner::{self, EvaluateOptions, Evaluator, Task};

/// Summary numbers for one registered dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub dataset_id: String,
    pub name: String,
    pub original_case: String,
    pub num_variants: usize,
    pub total_cases: usize,
    pub has_pre_hook: bool,
    pub has_post_hook: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ManagerMetadata {
    num_datasets: usize,
    dataset_ids: Vec<String>,
    saved_with_built_datasets: bool,
    #[serde(default)]
    hook_ids_used: Vec<String>,
}

struct ManagedDataset {
    config: DatasetConfig,
    built: Option<BuiltDataset>,
}

// Dataset ids may contain spaces and slashes; file names may not.
fn safe_file_id(dataset_id: &str) -> String {
    dataset_id.replace([' ', '/'], "_")
}

/// Registry of datasets with persistence and an evaluation entry point.
///
/// Hook ids on configs are late-bound: they stay plain ids until
/// `evaluate_dataset` resolves them against the attached library, so a
/// saved manager can be reloaded in a process whose library was built
/// differently.
#[derive(Default)]
pub struct DatasetManager {
    datasets: IndexMap<String, ManagedDataset>,
    hook_library: Option<Arc<dyn HookLibrary>>,
}

impl DatasetManager {
    pub fn new() -> Self {
        DatasetManager {
            datasets: IndexMap::new(),
            hook_library: None,
        }
    }

    pub fn with_hook_library(hook_library: Arc<dyn HookLibrary>) -> Self {
        DatasetManager {
            datasets: IndexMap::new(),
            hook_library: Some(hook_library),
        }
    }

    pub fn set_hook_library(&mut self, hook_library: Arc<dyn HookLibrary>) {
        self.hook_library = Some(hook_library);
    }

    /// Register a new dataset built from `case` plus `num_variants` derived
    /// copies tagged with variant indices. Returns the dataset id.
    pub fn create_dataset(
        &mut self,
        case: CaseSpec,
        dataset_id: impl Into<String>,
        num_variants: usize,
        name: Option<String>,
        description: Option<String>,
    ) -> EvalResult<String> {
        let dataset_id = dataset_id.into();
        if self.datasets.contains_key(&dataset_id) {
            return Err(EvalError::DuplicateId(dataset_id));
        }

        let variants = (1..=num_variants).map(|index| case.variant_of(index)).collect();
        let config = DatasetConfig {
            dataset_id: dataset_id.clone(),
            name: name.unwrap_or_else(|| case.name.clone()),
            original_case: case,
            variants,
            description,
            metadata: serde_json::Map::new(),
            pre_task_hook_id: None,
            post_task_hook_id: None,
        };

        let built = config.build();
        self.datasets.insert(
            dataset_id.clone(),
            ManagedDataset {
                config,
                built: Some(built),
            },
        );

        Ok(dataset_id)
    }

    /// Register a pre-assembled config, building its artifact immediately.
    /// Same duplicate policy as `create_dataset`.
    pub fn add_dataset_config(&mut self, config: DatasetConfig) -> EvalResult<()> {
        if self.datasets.contains_key(&config.dataset_id) {
            return Err(EvalError::DuplicateId(config.dataset_id.clone()));
        }
        let built = config.build();
        self.datasets.insert(
            config.dataset_id.clone(),
            ManagedDataset {
                config,
                built: Some(built),
            },
        );
        Ok(())
    }

    /// Append `num_variants` more variants, numbered after the existing
    /// ones, and rebuild the artifact. Returns the new variants.
    pub fn add_variants_to_dataset(
        &mut self,
        dataset_id: &str,
        num_variants: usize,
    ) -> EvalResult<Vec<CaseSpec>> {
        let entry = self
            .datasets
            .get_mut(dataset_id)
            .ok_or_else(|| EvalError::NotFound(format!("dataset '{}'", dataset_id)))?;

        let start = entry.config.variants.len() + 1;
        let new_variants: Vec<CaseSpec> = (start..start + num_variants)
            .map(|index| entry.config.original_case.variant_of(index))
            .collect();

        entry.config.variants.extend(new_variants.iter().cloned());
        entry.built = Some(entry.config.build());

        Ok(new_variants)
    }

    /// Drop a dataset, returning its config. The remaining datasets keep
    /// their registration order.
    pub fn remove_dataset(&mut self, dataset_id: &str) -> EvalResult<DatasetConfig> {
        self.datasets
            .shift_remove(dataset_id)
            .map(|entry| entry.config)
            .ok_or_else(|| EvalError::NotFound(format!("dataset '{}'", dataset_id)))
    }

    /// Registered ids in registration order.
    pub fn dataset_ids(&self) -> Vec<&str> {
        self.datasets.keys().map(|id| id.as_str()).collect()
    }

    pub fn get_dataset(&self, dataset_id: &str) -> Option<&DatasetConfig> {
        self.datasets.get(dataset_id).map(|entry| &entry.config)
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// The built artifact for a dataset, building from the config when no
    /// cached build exists.
    pub fn built_dataset(&self, dataset_id: &str) -> EvalResult<BuiltDataset> {
        let entry = self
            .datasets
            .get(dataset_id)
            .ok_or_else(|| EvalError::NotFound(format!("dataset '{}'", dataset_id)))?;
        Ok(entry.built.clone().unwrap_or_else(|| entry.config.build()))
    }

    pub fn dataset_stats(&self, dataset_id: &str) -> EvalResult<DatasetSummary> {
        let entry = self
            .datasets
            .get(dataset_id)
            .ok_or_else(|| EvalError::NotFound(format!("dataset '{}'", dataset_id)))?;
        let config = &entry.config;
        Ok(DatasetSummary {
            dataset_id: dataset_id.to_string(),
            name: config.name.clone(),
            original_case: config.original_case.name.clone(),
            num_variants: config.variants.len(),
            total_cases: config.case_count(),
            has_pre_hook: config.pre_task_hook_id.is_some(),
            has_post_hook: config.post_task_hook_id.is_some(),
        })
    }

    pub fn all_stats(&self) -> Vec<DatasetSummary> {
        self.datasets
            .keys()
            .filter_map(|id| self.dataset_stats(id).ok())
            .collect()
    }

    /// Record hook ids for a dataset. Ids are not resolved here; an
    /// unknown id only surfaces when evaluation tries to resolve it.
    pub fn set_dataset_hooks(
        &mut self,
        dataset_id: &str,
        pre_task_hook_id: Option<String>,
        post_task_hook_id: Option<String>,
    ) -> EvalResult<()> {
        let entry = self
            .datasets
            .get_mut(dataset_id)
            .ok_or_else(|| EvalError::NotFound(format!("dataset '{}'", dataset_id)))?;

        if let Some(pre) = pre_task_hook_id {
            entry.config.pre_task_hook_id = Some(pre);
        }
        if let Some(post) = post_task_hook_id {
            entry.config.post_task_hook_id = Some(post);
        }
        Ok(())
    }

    /// Remove both hook ids from a dataset.
    pub fn clear_dataset_hooks(&mut self, dataset_id: &str) -> EvalResult<()> {
        let entry = self
            .datasets
            .get_mut(dataset_id)
            .ok_or_else(|| EvalError::NotFound(format!("dataset '{}'", dataset_id)))?;
        entry.config.pre_task_hook_id = None;
        entry.config.post_task_hook_id = None;
        Ok(())
    }

    /// Persist the manager under `directory`: `metadata.json`, one config
    /// per dataset, and one built artifact per dataset when
    /// `save_built_datasets` is set.
    ///
    /// With `overwrite` false every target path is checked up front, so a
    /// collision aborts the save before anything is written. Each file
    /// lands atomically; the metadata goes last, after the files it
    /// promises exist.
    pub fn save(
        &self,
        directory: &Path,
        save_built_datasets: bool,
        overwrite: bool,
    ) -> EvalResult<()> {
        let configs_dir = directory.join("configs");
        let datasets_dir = directory.join("datasets");
        let metadata_path = directory.join("metadata.json");

        if !overwrite {
            let mut targets = vec![metadata_path.clone()];
            for dataset_id in self.datasets.keys() {
                let file_id = safe_file_id(dataset_id);
                targets.push(configs_dir.join(format!("{}.json", file_id)));
                if save_built_datasets {
                    targets.push(datasets_dir.join(format!("{}.json", file_id)));
                }
            }
            if let Some(existing) = targets.into_iter().find(|path| path.exists()) {
                return Err(EvalError::AlreadyExists(existing));
            }
        }

        fs::create_dir_all(&configs_dir)?;
        if save_built_datasets {
            fs::create_dir_all(&datasets_dir)?;
        }

        for (dataset_id, entry) in &self.datasets {
            let file_id = safe_file_id(dataset_id);
            write_json_atomic(&configs_dir.join(format!("{}.json", file_id)), &entry.config)?;

            if save_built_datasets {
                let built = entry.built.clone().unwrap_or_else(|| entry.config.build());
                write_json_atomic(&datasets_dir.join(format!("{}.json", file_id)), &built)?;
            }
        }

        let mut hook_ids_used: Vec<String> = Vec::new();
        for entry in self.datasets.values() {
            let hook_ids = [&entry.config.pre_task_hook_id, &entry.config.post_task_hook_id];
            for hook_id in hook_ids.into_iter().flatten() {
                if !hook_ids_used.contains(hook_id) {
                    hook_ids_used.push(hook_id.clone());
                }
            }
        }

        let metadata = ManagerMetadata {
            num_datasets: self.datasets.len(),
            dataset_ids: self.datasets.keys().cloned().collect(),
            saved_with_built_datasets: save_built_datasets,
            hook_ids_used,
        };
        write_json_atomic(&metadata_path, &metadata)?;

        Ok(())
    }

    /// Reload a saved manager from `directory`.
    ///
    /// Every dataset listed in the metadata must have a readable config,
    /// and a readable built artifact when the save recorded them;
    /// otherwise the saved state is corrupt. Hook ids stay unresolved
    /// until evaluation.
    pub fn load(
        directory: &Path,
        hook_library: Option<Arc<dyn HookLibrary>>,
    ) -> EvalResult<DatasetManager> {
        let metadata_path = directory.join("metadata.json");
        if !metadata_path.is_file() {
            return Err(EvalError::NotFound(format!(
                "manager metadata at {}",
                metadata_path.display()
            )));
        }

        let metadata: ManagerMetadata = serde_json::from_str(&fs::read_to_string(&metadata_path)?)
            .map_err(|err| EvalError::CorruptState(format!("metadata.json: {}", err)))?;

        let mut manager = DatasetManager {
            datasets: IndexMap::new(),
            hook_library,
        };

        for dataset_id in &metadata.dataset_ids {
            let file_id = safe_file_id(dataset_id);

            let config_path = directory.join("configs").join(format!("{}.json", file_id));
            if !config_path.is_file() {
                return Err(EvalError::CorruptState(format!(
                    "config for dataset '{}' missing at {}",
                    dataset_id,
                    config_path.display()
                )));
            }
            let config: DatasetConfig = serde_json::from_str(&fs::read_to_string(&config_path)?)
                .map_err(|err| {
                    EvalError::CorruptState(format!("config for dataset '{}': {}", dataset_id, err))
                })?;

            let built_path = directory.join("datasets").join(format!("{}.json", file_id));
            let built = if built_path.is_file() {
                let built: BuiltDataset = serde_json::from_str(&fs::read_to_string(&built_path)?)
                    .map_err(|err| {
                        EvalError::CorruptState(format!(
                            "built dataset '{}': {}",
                            dataset_id, err
                        ))
                    })?;
                Some(built)
            } else if metadata.saved_with_built_datasets {
                return Err(EvalError::CorruptState(format!(
                    "built dataset '{}' missing at {}",
                    dataset_id,
                    built_path.display()
                )));
            } else {
                None
            };

            manager
                .datasets
                .insert(dataset_id.clone(), ManagedDataset { config, built });
        }

        Ok(manager)
    }

    /// Read one built artifact directly from disk.
    pub fn load_dataset(path: &Path) -> EvalResult<BuiltDataset> {
        if !path.is_file() {
            return Err(EvalError::NotFound(format!(
                "built dataset at {}",
                path.display()
            )));
        }
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    fn resolve_hook(&self, hook_id: &Option<String>) -> EvalResult<Option<Arc<dyn Hook>>> {
        let Some(hook_id) = hook_id else {
            return Ok(None);
        };
        let library = self.hook_library.as_ref().ok_or_else(|| {
            EvalError::NotFound(format!("hook '{}' (no hook library attached)", hook_id))
        })?;
        library
            .get_hook(hook_id)
            .map(Some)
            .ok_or_else(|| EvalError::NotFound(format!("hook '{}' in hook library", hook_id)))
    }

    /// Run a dataset through the case runner with the given task and
    /// evaluators. Hook ids resolve here, against the current library.
    pub async fn evaluate_dataset(
        &self,
        dataset_id: &str,
        task: Arc<dyn Task>,
        evaluators: Vec<Arc<dyn Evaluator>>,
        options: &EvaluateOptions,
    ) -> EvalResult<Report> {
        let entry = self
            .datasets
            .get(dataset_id)
            .ok_or_else(|| EvalError::NotFound(format!("dataset '{}'", dataset_id)))?;

        let (pre_hook, post_hook) = if options.wrap_with_hooks {
            (
                self.resolve_hook(&entry.config.pre_task_hook_id)?,
                self.resolve_hook(&entry.config.post_task_hook_id)?,
            )
        } else {
            (None, None)
        };

        let dataset = entry.built.clone().unwrap_or_else(|| entry.config.build());
        runner::evaluate_cases(dataset, task, evaluators, pre_hook, post_hook, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::hooks::{HookConfig, HookRegistry, HookType};
    use crate::report::Score;
    use crate::runner::{EvalContext, TaskOutput};
    use async_trait::async_trait;
    use tern::message::Message;

    fn addone_case() -> CaseSpec {
        CaseSpec::new("addone_case_1", vec![Message::user().with_text("add one to 41")])
    }

    fn manager_with_dataset(num_variants: usize) -> DatasetManager {
        let mut manager = DatasetManager::new();
        manager
            .create_dataset(addone_case(), "addone_ds", num_variants, None, None)
            .unwrap();
        manager
    }

    #[test]
    fn test_create_dataset_registers_variants() {
        let manager = manager_with_dataset(2);

        assert_eq!(manager.len(), 1);
        assert_eq!(manager.dataset_ids(), vec!["addone_ds"]);

        let built = manager.built_dataset("addone_ds").unwrap();
        let names: Vec<&str> = built.cases.iter().map(|case| case.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "addone_case_1",
                "addone_case_1 - Variant 1",
                "addone_case_1 - Variant 2"
            ]
        );
    }

    #[test]
    fn test_duplicate_dataset_id_is_rejected() {
        let mut manager = manager_with_dataset(0);

        let result = manager.create_dataset(addone_case(), "addone_ds", 0, None, None);

        assert!(matches!(result, Err(EvalError::DuplicateId(id)) if id == "addone_ds"));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_add_variants_continues_numbering() {
        let mut manager = manager_with_dataset(2);

        let added = manager.add_variants_to_dataset("addone_ds", 2).unwrap();

        let names: Vec<&str> = added.iter().map(|case| case.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["addone_case_1 - Variant 3", "addone_case_1 - Variant 4"]
        );
        assert_eq!(manager.built_dataset("addone_ds").unwrap().cases.len(), 5);
    }

    #[test]
    fn test_remove_dataset() {
        let mut manager = manager_with_dataset(1);

        let removed = manager.remove_dataset("addone_ds").unwrap();
        assert_eq!(removed.dataset_id, "addone_ds");
        assert!(manager.is_empty());

        let result = manager.remove_dataset("addone_ds");
        assert!(matches!(result, Err(EvalError::NotFound(_))));
    }

    #[test]
    fn test_dataset_stats() {
        let mut manager = manager_with_dataset(3);
        manager
            .set_dataset_hooks("addone_ds", Some("trim_history".to_string()), None)
            .unwrap();

        let stats = manager.dataset_stats("addone_ds").unwrap();

        assert_eq!(stats.dataset_id, "addone_ds");
        assert_eq!(stats.original_case, "addone_case_1");
        assert_eq!(stats.num_variants, 3);
        assert_eq!(stats.total_cases, 4);
        assert!(stats.has_pre_hook);
        assert!(!stats.has_post_hook);
    }

    #[test]
    fn test_set_hooks_requires_known_dataset() {
        let mut manager = DatasetManager::new();

        let result = manager.set_dataset_hooks("missing", Some("trim_history".to_string()), None);

        assert!(matches!(result, Err(EvalError::NotFound(_))));
    }

    #[test]
    fn test_hook_ids_are_stored_without_a_library() {
        // ids are late-bound, so storing them needs no library at all
        let mut manager = manager_with_dataset(0);
        manager
            .set_dataset_hooks(
                "addone_ds",
                Some("trim_history".to_string()),
                Some("redact".to_string()),
            )
            .unwrap();

        let config = manager.get_dataset("addone_ds").unwrap();
        assert_eq!(config.pre_task_hook_id.as_deref(), Some("trim_history"));
        assert_eq!(config.post_task_hook_id.as_deref(), Some("redact"));

        manager.clear_dataset_hooks("addone_ds").unwrap();
        let config = manager.get_dataset("addone_ds").unwrap();
        assert!(config.pre_task_hook_id.is_none());
        assert!(config.post_task_hook_id.is_none());
    }

    fn walk_files(dir: &Path) -> Vec<std::path::PathBuf> {
        let mut files = Vec::new();
        let mut pending = vec![dir.to_path_buf()];
        while let Some(current) = pending.pop() {
            for entry in fs::read_dir(&current).unwrap().filter_map(|entry| entry.ok()) {
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                } else {
                    files.push(path);
                }
            }
        }
        files
    }

    #[test]
    fn test_save_then_load_round_trip() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut manager = manager_with_dataset(3);
        manager
            .set_dataset_hooks("addone_ds", Some("trim_history".to_string()), None)
            .unwrap();

        manager.save(dir.path(), true, false)?;

        assert!(dir.path().join("metadata.json").is_file());
        assert!(dir.path().join("configs").join("addone_ds.json").is_file());
        assert!(dir.path().join("datasets").join("addone_ds.json").is_file());
        assert!(walk_files(dir.path())
            .iter()
            .all(|path| path.extension().is_some_and(|ext| ext == "json")));

        let loaded = DatasetManager::load(dir.path(), None)?;
        assert_eq!(loaded.dataset_ids(), vec!["addone_ds"]);

        let config = loaded.get_dataset("addone_ds").unwrap();
        assert_eq!(config.variants.len(), 3);
        assert_eq!(config.pre_task_hook_id.as_deref(), Some("trim_history"));

        let built = loaded.built_dataset("addone_ds")?;
        assert_eq!(built.cases.len(), 4);
        assert_eq!(built.cases[3].name, "addone_case_1 - Variant 3");
        Ok(())
    }

    #[test]
    fn test_save_records_hook_ids_in_metadata() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut manager = manager_with_dataset(0);
        manager
            .set_dataset_hooks(
                "addone_ds",
                Some("trim_history".to_string()),
                Some("redact".to_string()),
            )
            .unwrap();

        manager.save(dir.path(), false, false)?;

        let metadata: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("metadata.json"))?)?;
        assert_eq!(metadata["num_datasets"], 1);
        assert_eq!(metadata["dataset_ids"][0], "addone_ds");
        assert_eq!(metadata["saved_with_built_datasets"], false);
        assert_eq!(
            metadata["hook_ids_used"],
            serde_json::json!(["trim_history", "redact"])
        );
        Ok(())
    }

    #[test]
    fn test_save_without_overwrite_rejects_existing() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let manager = manager_with_dataset(1);
        manager.save(dir.path(), true, false)?;

        let result = manager.save(dir.path(), true, false);
        assert!(matches!(result, Err(EvalError::AlreadyExists(_))));

        // overwrite replaces in place
        manager.save(dir.path(), true, true)?;
        Ok(())
    }

    #[test]
    fn test_load_missing_metadata_is_not_found() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;

        let result = DatasetManager::load(dir.path(), None);

        assert!(matches!(result, Err(EvalError::NotFound(_))));
        Ok(())
    }

    #[test]
    fn test_load_missing_config_is_corrupt_state() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        manager_with_dataset(1).save(dir.path(), false, false)?;
        fs::remove_file(dir.path().join("configs").join("addone_ds.json"))?;

        let result = DatasetManager::load(dir.path(), None);

        assert!(matches!(result, Err(EvalError::CorruptState(_))));
        Ok(())
    }

    #[test]
    fn test_load_unparseable_config_is_corrupt_state() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        manager_with_dataset(1).save(dir.path(), false, false)?;
        fs::write(dir.path().join("configs").join("addone_ds.json"), "{broken")?;

        let result = DatasetManager::load(dir.path(), None);

        assert!(matches!(result, Err(EvalError::CorruptState(_))));
        Ok(())
    }

    #[test]
    fn test_load_missing_promised_built_dataset_is_corrupt_state() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        manager_with_dataset(1).save(dir.path(), true, false)?;
        fs::remove_file(dir.path().join("datasets").join("addone_ds.json"))?;

        let result = DatasetManager::load(dir.path(), None);

        assert!(matches!(result, Err(EvalError::CorruptState(_))));
        Ok(())
    }

    #[test]
    fn test_load_without_built_artifacts_builds_on_demand() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        manager_with_dataset(2).save(dir.path(), false, false)?;
        assert!(!dir.path().join("datasets").exists());

        let loaded = DatasetManager::load(dir.path(), None)?;
        let built = loaded.built_dataset("addone_ds")?;

        assert_eq!(built.cases.len(), 3);
        Ok(())
    }

    #[test]
    fn test_dataset_id_with_spaces_and_slashes_round_trips() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut manager = DatasetManager::new();
        manager
            .create_dataset(addone_case(), "math/add one", 1, None, None)
            .unwrap();

        manager.save(dir.path(), true, false)?;

        // files use the sanitized id, metadata keeps the exact id
        assert!(dir.path().join("configs").join("math_add_one.json").is_file());
        let metadata: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("metadata.json"))?)?;
        assert_eq!(metadata["dataset_ids"][0], "math/add one");

        let loaded = DatasetManager::load(dir.path(), None)?;
        assert_eq!(loaded.dataset_ids(), vec!["math/add one"]);
        Ok(())
    }

    #[test]
    fn test_load_dataset_reads_built_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        manager_with_dataset(1).save(dir.path(), true, false)?;

        let built =
            DatasetManager::load_dataset(&dir.path().join("datasets").join("addone_ds.json"))?;
        assert_eq!(built.cases.len(), 2);

        let result = DatasetManager::load_dataset(&dir.path().join("datasets").join("nope.json"));
        assert!(matches!(result, Err(EvalError::NotFound(_))));
        Ok(())
    }

    struct EchoTask;

    #[async_trait]
    impl Task for EchoTask {
        async fn run(&self, inputs: Vec<Message>) -> anyhow::Result<TaskOutput> {
            let text = inputs
                .last()
                .map(|message| message.as_concat_text())
                .unwrap_or_default();
            Ok(TaskOutput::new(vec![
                Message::assistant().with_text(format!("echo: {}", text))
            ]))
        }
    }

    struct AlwaysOne;

    #[async_trait]
    impl Evaluator for AlwaysOne {
        fn name(&self) -> &str {
            "always_one"
        }

        async fn evaluate(&self, _context: &EvalContext) -> anyhow::Result<Score> {
            Ok(Score::new(1.0))
        }
    }

    struct AppendMarker {
        marker: &'static str,
    }

    #[async_trait]
    impl Hook for AppendMarker {
        async fn call(&self, mut messages: Vec<Message>) -> anyhow::Result<Vec<Message>> {
            messages.push(Message::user().with_text(self.marker));
            Ok(messages)
        }
    }

    fn registry_with_marker(hook_id: &str) -> Arc<HookRegistry> {
        let mut registry = HookRegistry::new();
        registry
            .register_hook(
                HookConfig {
                    hook_id: hook_id.to_string(),
                    name: hook_id.to_string(),
                    description: None,
                    hook_type: HookType::Pre,
                },
                Arc::new(AppendMarker { marker: "marked" }),
            )
            .unwrap();
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_evaluate_dataset_runs_every_case() -> anyhow::Result<()> {
        let manager = manager_with_dataset(2);

        let report = manager
            .evaluate_dataset(
                "addone_ds",
                Arc::new(EchoTask),
                vec![Arc::new(AlwaysOne)],
                &EvaluateOptions::default(),
            )
            .await?;

        assert_eq!(report.cases.len(), 3);
        assert_eq!(report.cases[0].name, "addone_case_1");
        assert_eq!(report.cases[0].score_value("always_one"), 1.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_evaluate_unknown_dataset_is_not_found() {
        let manager = DatasetManager::new();

        let result = manager
            .evaluate_dataset(
                "missing",
                Arc::new(EchoTask),
                vec![],
                &EvaluateOptions::default(),
            )
            .await;

        assert!(matches!(result, Err(EvalError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_evaluate_resolves_hook_ids_late() -> anyhow::Result<()> {
        let mut manager = manager_with_dataset(0);
        manager
            .set_dataset_hooks("addone_ds", Some("mark_input".to_string()), None)
            .unwrap();

        // no library attached: resolution fails at evaluation time
        let result = manager
            .evaluate_dataset(
                "addone_ds",
                Arc::new(EchoTask),
                vec![],
                &EvaluateOptions::default(),
            )
            .await;
        assert!(matches!(result, Err(EvalError::NotFound(_))));

        // attach a library that knows the id and the hook applies
        manager.set_hook_library(registry_with_marker("mark_input"));
        let report = manager
            .evaluate_dataset(
                "addone_ds",
                Arc::new(EchoTask),
                vec![],
                &EvaluateOptions::default(),
            )
            .await?;

        let last_input = report.cases[0].inputs.last().unwrap();
        assert_eq!(last_input.as_concat_text(), "marked");
        assert_eq!(report.cases[0].output[0].as_concat_text(), "echo: marked");
        Ok(())
    }

    #[tokio::test]
    async fn test_evaluate_with_unknown_hook_in_library() {
        let mut manager = manager_with_dataset(0);
        manager.set_hook_library(registry_with_marker("mark_input"));
        manager
            .set_dataset_hooks("addone_ds", Some("not_registered".to_string()), None)
            .unwrap();

        let result = manager
            .evaluate_dataset(
                "addone_ds",
                Arc::new(EchoTask),
                vec![],
                &EvaluateOptions::default(),
            )
            .await;

        assert!(matches!(result, Err(EvalError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_evaluate_can_skip_hook_wrapping() -> anyhow::Result<()> {
        let mut manager = manager_with_dataset(0);
        manager
            .set_dataset_hooks("addone_ds", Some("never_registered".to_string()), None)
            .unwrap();

        let options = EvaluateOptions {
            wrap_with_hooks: false,
            ..Default::default()
        };
        let report = manager
            .evaluate_dataset("addone_ds", Arc::new(EchoTask), vec![], &options)
            .await?;

        assert_eq!(report.cases.len(), 1);
        assert_eq!(
            report.cases[0].output[0].as_concat_text(),
            "echo: add one to 41"
        );
        Ok(())
    }
}
