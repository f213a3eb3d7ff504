use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use tern::message::Message;

use crate::errors::{EvalError, EvalResult};

/// Whether a hook runs before the task, transforming its inputs, or after
/// it, transforming its output messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookType {
    Pre,
    Post,
}

/// Descriptive record kept alongside a registered hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookConfig {
    pub hook_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub hook_type: HookType,
}

/// A message-list transform referenced by id from dataset configs.
#[async_trait]
pub trait Hook: Send + Sync {
    async fn call(&self, messages: Vec<Message>) -> anyhow::Result<Vec<Message>>;
}

/// Resolves hook ids to transforms at evaluation time.
pub trait HookLibrary: Send + Sync {
    fn get_hook(&self, hook_id: &str) -> Option<Arc<dyn Hook>>;

    fn get_config(&self, hook_id: &str) -> Option<HookConfig>;

    fn list_hooks(&self) -> Vec<HookConfig>;

    fn has_hook(&self, hook_id: &str) -> bool {
        self.get_hook(hook_id).is_some()
    }
}

/// In-memory hook library, listed in registration order.
#[derive(Default)]
pub struct HookRegistry {
    hooks: IndexMap<String, (HookConfig, Arc<dyn Hook>)>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook under its config's id. Re-registering an id is an
    /// error rather than a silent replacement.
    pub fn register_hook(&mut self, config: HookConfig, hook: Arc<dyn Hook>) -> EvalResult<()> {
        if self.hooks.contains_key(&config.hook_id) {
            return Err(EvalError::DuplicateId(config.hook_id));
        }
        self.hooks.insert(config.hook_id.clone(), (config, hook));
        Ok(())
    }
}

impl HookLibrary for HookRegistry {
    fn get_hook(&self, hook_id: &str) -> Option<Arc<dyn Hook>> {
        self.hooks.get(hook_id).map(|(_, hook)| hook.clone())
    }

    fn get_config(&self, hook_id: &str) -> Option<HookConfig> {
        self.hooks.get(hook_id).map(|(config, _)| config.clone())
    }

    fn list_hooks(&self) -> Vec<HookConfig> {
        self.hooks.values().map(|(config, _)| config.clone()).collect()
    }
}
