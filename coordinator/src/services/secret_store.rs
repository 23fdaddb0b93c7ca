//! Key-file secret store
//!
//! Project secrets live in a JSON file mapping destination project id to
//! secret key, deliberately outside the rule configuration so rule files can
//! be shared and committed freely. The file is re-read on every lookup;
//! lookups are rare (startup validation plus one per dispatch) and this
//! picks up rotated keys without a restart.

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::traits::SecretStore;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::fs;

pub struct KeyFileSecretStore {
    path: PathBuf,
}

impl KeyFileSecretStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default key file location under the user configuration directory
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("crosstrigger")
            .join("trigger_keys.json")
    }
}

#[async_trait::async_trait]
impl SecretStore for KeyFileSecretStore {
    async fn get_secret(&self, project_id: &str) -> CoordinatorResult<Option<String>> {
        let raw = fs::read_to_string(&self.path).await.map_err(|e| {
            CoordinatorError::config(format!(
                "cannot read secret key file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        let keys: BTreeMap<String, String> = serde_json::from_str(&raw).map_err(|e| {
            CoordinatorError::config(format!(
                "malformed secret key file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(keys.get(project_id).cloned())
    }
}
