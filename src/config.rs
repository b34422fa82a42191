use anyhow::Result;
use std::path::PathBuf;

use crate::api::{ApiClient, DEFAULT_API_URL};
use crate::ledger::SuppressionLedger;
use crate::session::SessionUser;
use crate::store::{KeyValueStore, MemoryStore, SqliteStore};

/// Runtime settings, filled from command-line flags or their environment
/// variables (`HERHUB_API_URL`, `HERHUB_DATA_DIR`, `HERHUB_SCOPE_FLAGS`).
#[derive(Debug, Clone)]
pub struct HubConfig {
    pub api_url: String,
    pub data_dir: Option<PathBuf>,
    pub scope_flags_per_user: bool,
    pub ephemeral: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            data_dir: None,
            scope_flags_per_user: false,
            ephemeral: false,
        }
    }
}

impl HubConfig {
    pub fn open_store(&self) -> Result<Box<dyn KeyValueStore>> {
        if self.ephemeral {
            tracing::debug!("Using in-memory store");
            return Ok(Box::new(MemoryStore::new()));
        }
        let store = SqliteStore::open(self.data_dir.as_deref())?;
        tracing::debug!(path = %store.path().display(), "Opened store");
        Ok(Box::new(store))
    }

    pub fn client(&self, store: &dyn KeyValueStore) -> Result<ApiClient> {
        ApiClient::from_store(&self.api_url, store)
    }

    /// Flags are shared by everyone on this machine unless per-user scoping
    /// is on and someone is logged in.
    pub fn ledger<'a>(
        &self,
        store: &'a dyn KeyValueStore,
        user: Option<&SessionUser>,
    ) -> SuppressionLedger<&'a dyn KeyValueStore> {
        match user {
            Some(user) if self.scope_flags_per_user => SuppressionLedger::scoped(store, &user.id),
            _ => SuppressionLedger::new(store),
        }
    }
}
