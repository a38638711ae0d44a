//! Node hooks and the built-in hook models.
//!
//! A hook is identified across versions of a workflow by its UUID. When no
//! UUID is available, two hooks are "the same" when their
//! [`NodeHook::reference`] matches: a digest of the model name and every
//! configuration key/value pair.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub const REPOSITORY_WEBHOOK_MODEL_NAME: &str = "RepositoryWebHook";
pub const REPOSITORY_WEBHOOK_MODEL_ID: i64 = 2;
pub const WEBHOOK_MODEL_NAME: &str = "WebHook";
pub const SCHEDULER_MODEL_NAME: &str = "Scheduler";
pub const GIT_POLLER_MODEL_NAME: &str = "Git Repository Poller";

pub const HOOK_CONFIG_PROJECT: &str = "project";
pub const HOOK_CONFIG_WORKFLOW: &str = "workflow";
pub const HOOK_CONFIG_VCS_SERVER: &str = "vcsServer";
pub const HOOK_CONFIG_REPO_FULLNAME: &str = "repoFullName";
pub const HOOK_CONFIG_EVENT_FILTER: &str = "eventFilter";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookConfigValue {
    pub value: String,
    #[serde(default)]
    pub configurable: bool,
}

impl HookConfigValue {
    pub fn fixed(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            configurable: false,
        }
    }

    pub fn configurable(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            configurable: true,
        }
    }
}

/// Key-ordered hook configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HookConfig(BTreeMap<String, HookConfigValue>);

impl HookConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&HookConfigValue> {
        self.0.get(key)
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|v| v.value.as_str())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: HookConfigValue) {
        self.0.insert(key.into(), value);
    }

    /// Insert every entry of `defaults` whose key is not set yet.
    pub fn fill_missing(&mut self, defaults: &HookConfig) {
        for (k, v) in &defaults.0 {
            self.0.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &HookConfigValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, HookConfigValue)> for HookConfig {
    fn from_iter<I: IntoIterator<Item = (K, HookConfigValue)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

// ---------------------------------------------------------------------------
// Hook models
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookModel {
    pub id: i64,
    pub name: &'static str,
    pub default_config: HookConfig,
}

impl HookModel {
    /// Look up a built-in hook model by name.
    pub fn builtin(name: &str) -> Option<HookModel> {
        builtin_models().into_iter().find(|m| m.name == name)
    }
}

/// The canonical repository webhook model.
pub fn repository_webhook_model() -> HookModel {
    HookModel {
        id: REPOSITORY_WEBHOOK_MODEL_ID,
        name: REPOSITORY_WEBHOOK_MODEL_NAME,
        default_config: [(HOOK_CONFIG_EVENT_FILTER, HookConfigValue::configurable(""))]
            .into_iter()
            .collect(),
    }
}

fn builtin_models() -> Vec<HookModel> {
    vec![
        HookModel {
            id: 1,
            name: WEBHOOK_MODEL_NAME,
            default_config: [("method", HookConfigValue::configurable("POST"))]
                .into_iter()
                .collect(),
        },
        repository_webhook_model(),
        HookModel {
            id: 3,
            name: SCHEDULER_MODEL_NAME,
            default_config: [
                ("cron", HookConfigValue::configurable("0 * * * *")),
                ("timezone", HookConfigValue::configurable("UTC")),
            ]
            .into_iter()
            .collect(),
        },
        HookModel {
            id: 4,
            name: GIT_POLLER_MODEL_NAME,
            default_config: HookConfig::new(),
        },
    ]
}

// ---------------------------------------------------------------------------
// NodeHook
// ---------------------------------------------------------------------------

/// A trigger attached to a workflow node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeHook {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
    pub hook_model_name: String,
    #[serde(default)]
    pub hook_model_id: i64,
    #[serde(default)]
    pub config: HookConfig,
}

impl NodeHook {
    /// A fresh hook of `model` with the model's default configuration.
    pub fn from_model(model: &HookModel) -> Self {
        Self {
            uuid: None,
            hook_model_name: model.name.to_string(),
            hook_model_id: model.id,
            config: model.default_config.clone(),
        }
    }

    pub fn is_repository_webhook(&self) -> bool {
        self.hook_model_name == REPOSITORY_WEBHOOK_MODEL_NAME
    }

    /// Stable reference derived from the model name and configuration.
    pub fn reference(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.hook_model_name.as_bytes());
        for (k, v) in self.config.iter() {
            hasher.update(k.as_bytes());
            hasher.update(b":");
            hasher.update(v.value.as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_ignores_uuid() {
        let a = NodeHook::from_model(&repository_webhook_model());
        let mut b = a.clone();
        b.uuid = Some(Uuid::new_v4());
        assert_eq!(a.reference(), b.reference());
    }

    #[test]
    fn reference_depends_on_config() {
        let a = NodeHook::from_model(&repository_webhook_model());
        let mut b = a.clone();
        b.config
            .insert(HOOK_CONFIG_EVENT_FILTER, HookConfigValue::configurable("push"));
        assert_ne!(a.reference(), b.reference());
    }

    #[test]
    fn fill_missing_keeps_existing_values() {
        let mut config: HookConfig = [(HOOK_CONFIG_EVENT_FILTER, HookConfigValue::fixed("push"))]
            .into_iter()
            .collect();
        config.fill_missing(&repository_webhook_model().default_config);
        assert_eq!(config.value(HOOK_CONFIG_EVENT_FILTER), Some("push"));
        assert_eq!(config.len(), 1);
    }

    #[test]
    fn builtin_lookup() {
        assert_eq!(
            HookModel::builtin(REPOSITORY_WEBHOOK_MODEL_NAME).map(|m| m.id),
            Some(REPOSITORY_WEBHOOK_MODEL_ID)
        );
        assert!(HookModel::builtin("Kafka").is_none());
    }
}
