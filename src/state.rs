use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reconcile::{ApiKeysRecord, ClusterRecord, Record, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::manifest::Address;
use crate::paths;

// ============================================================================
// State Structures
// ============================================================================

/// Every entity tscloud tracks, keyed by manifest name
///
/// API key secrets live only here, so the file is written owner-only.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TrackedState {
    #[serde(default)]
    pub clusters: BTreeMap<String, ClusterRecord>,

    #[serde(default)]
    pub api_keys: BTreeMap<String, ApiKeysRecord>,

    /// Last time the state was updated
    pub last_updated: DateTime<Utc>,
}

impl Default for TrackedState {
    fn default() -> Self {
        Self {
            clusters: BTreeMap::new(),
            api_keys: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }
}

// ============================================================================
// Persistence
// ============================================================================

/// A state file location plus its loaded contents
pub struct StateStore {
    path: PathBuf,
    pub state: TrackedState,
}

impl StateStore {
    /// Open the default state file
    pub fn open() -> Result<Self> {
        Self::open_at(paths::state_file()?)
    }

    /// Open `path`, starting empty if it does not exist
    pub fn open_at(path: PathBuf) -> Result<Self> {
        let state = TrackedState::load_from(&path)?;
        Ok(Self { path, state })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stamp and write the current state
    pub fn save(&mut self) -> Result<()> {
        self.state.last_updated = Utc::now();
        self.state.save_to(&self.path)
    }
}

impl TrackedState {
    /// Load state from `path`, or return default if the file doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file does not exist, using default state");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!("Loaded state from {}", path.display());
        Ok(state)
    }

    /// Save state to `path`, replacing it atomically
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize state to TOML")?;

        let tmp = path.with_extension("toml.tmp");
        fs::write(&tmp, &content)
            .with_context(|| format!("Failed to write state file: {}", tmp.display()))?;
        restrict_permissions(&tmp)?;
        fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    // ========================================================================
    // Record Helpers
    // ========================================================================

    pub fn get(&self, address: &Address) -> Option<Record> {
        match address.kind {
            ResourceKind::Cluster => self
                .clusters
                .get(&address.name)
                .cloned()
                .map(Record::Cluster),
            ResourceKind::ClusterApiKeys => self
                .api_keys
                .get(&address.name)
                .cloned()
                .map(Record::ApiKeys),
        }
    }

    /// Store `record` under `address`
    ///
    /// A record of the wrong kind for the address is ignored with a warning.
    pub fn set(&mut self, address: &Address, record: Record) {
        match (address.kind, record) {
            (ResourceKind::Cluster, Record::Cluster(r)) => {
                self.clusters.insert(address.name.clone(), r);
            }
            (ResourceKind::ClusterApiKeys, Record::ApiKeys(r)) => {
                self.api_keys.insert(address.name.clone(), r);
            }
            (_, other) => {
                log::warn!("Not storing a {} record under {address}", other.kind());
            }
        }
    }

    pub fn remove(&mut self, address: &Address) -> Option<Record> {
        match address.kind {
            ResourceKind::Cluster => self.clusters.remove(&address.name).map(Record::Cluster),
            ResourceKind::ClusterApiKeys => {
                self.api_keys.remove(&address.name).map(Record::ApiKeys)
            }
        }
    }

    /// Every tracked address, clusters first
    pub fn addresses(&self) -> Vec<Address> {
        self.clusters
            .keys()
            .map(Address::cluster)
            .chain(self.api_keys.keys().map(Address::api_keys))
            .collect()
    }

    /// Key sets that belong to `cluster_id`
    pub fn keys_for_cluster(&self, cluster_id: &str) -> Vec<Address> {
        self.api_keys
            .iter()
            .filter(|(_, r)| r.cluster_id == cluster_id)
            .map(|(name, _)| Address::api_keys(name))
            .collect()
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("Failed to set permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
