//! Desired-state manifest (`tscloud.toml`)
//!
//! ```toml
//! [clusters.search]
//! memory = "0.5_gb"
//! vcpu = "2_vcpus_1_hr_burst_per_day"
//! region = "oregon"
//!
//! [api_keys.search]
//! cluster = "search"
//! ```

use anyhow::{Context, Result, bail};
use reconcile::{ClusterSpec, ResourceKind};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

const CLUSTERS_TABLE: &str = "clusters";
const API_KEYS_TABLE: &str = "api_keys";

// ============================================================================
// Addresses
// ============================================================================

/// `clusters.<name>` or `api_keys.<name>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    pub kind: ResourceKind,
    pub name: String,
}

impl Address {
    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::Cluster,
            name: name.into(),
        }
    }

    pub fn api_keys(name: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::ClusterApiKeys,
            name: name.into(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = match self.kind {
            ResourceKind::Cluster => CLUSTERS_TABLE,
            ResourceKind::ClusterApiKeys => API_KEYS_TABLE,
        };
        write!(f, "{table}.{}", self.name)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("address `{0}` must look like clusters.<name> or api_keys.<name>")]
    Malformed(String),

    #[error("unknown entity type `{0}`; expected `clusters` or `api_keys`")]
    UnknownTable(String),

    #[error("invalid name `{0}`: use letters, digits, `-` and `_`")]
    InvalidName(String),
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (table, name) = s
            .split_once('.')
            .ok_or_else(|| AddressError::Malformed(s.to_string()))?;
        validate_name(name)?;
        match table {
            CLUSTERS_TABLE => Ok(Self::cluster(name)),
            API_KEYS_TABLE => Ok(Self::api_keys(name)),
            other => Err(AddressError::UnknownTable(other.to_string())),
        }
    }
}

fn validate_name(name: &str) -> Result<(), AddressError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(AddressError::InvalidName(name.to_string()))
    }
}

// ============================================================================
// Manifest
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub clusters: BTreeMap<String, ClusterEntry>,

    #[serde(default)]
    pub api_keys: BTreeMap<String, ApiKeysEntry>,
}

/// `[clusters.<name>]`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterEntry {
    pub name: Option<String>,
    pub memory: String,
    pub vcpu: String,
    pub region: String,
    #[serde(default)]
    pub high_availability: bool,
    #[serde(default)]
    pub high_performance_disk: bool,
    #[serde(default)]
    pub auto_upgrade_capacity: bool,
}

impl ClusterEntry {
    pub fn to_spec(&self) -> ClusterSpec {
        ClusterSpec {
            name: self.name.clone().filter(|n| !n.is_empty()),
            memory: self.memory.clone(),
            vcpu: self.vcpu.clone(),
            region: self.region.clone(),
            high_availability: self.high_availability,
            high_performance_disk: self.high_performance_disk,
            auto_upgrade_capacity: self.auto_upgrade_capacity,
        }
    }
}

/// `[api_keys.<name>]`: either a manifest cluster or a raw cluster id
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiKeysEntry {
    /// Name of a `[clusters.<name>]` entry
    pub cluster: Option<String>,
    /// Id of a cluster managed elsewhere
    pub cluster_id: Option<String>,
}

/// Which cluster a key set belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClusterRef<'a> {
    Managed(Address),
    External(&'a str),
}

impl ApiKeysEntry {
    pub fn target(&self) -> ClusterRef<'_> {
        match (&self.cluster, &self.cluster_id) {
            (Some(name), _) => ClusterRef::Managed(Address::cluster(name.clone())),
            (None, Some(id)) => ClusterRef::External(id),
            // Rejected by validate()
            (None, None) => ClusterRef::External(""),
        }
    }
}

impl Manifest {
    /// Load and validate a manifest file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        let manifest = Self::parse(&content)
            .with_context(|| format!("Invalid manifest: {}", path.display()))?;
        log::debug!(
            "Loaded manifest {} ({} clusters, {} key sets)",
            path.display(),
            manifest.clusters.len(),
            manifest.api_keys.len()
        );
        Ok(manifest)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let manifest: Self = toml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<()> {
        for (name, entry) in &self.clusters {
            validate_name(name)?;
            for (field, value) in [
                ("memory", &entry.memory),
                ("vcpu", &entry.vcpu),
                ("region", &entry.region),
            ] {
                if value.trim().is_empty() {
                    bail!("clusters.{name}: `{field}` must not be empty");
                }
            }
        }

        let mut targets: HashMap<ClusterRef<'_>, &str> = HashMap::new();
        for (name, entry) in &self.api_keys {
            validate_name(name)?;
            match (&entry.cluster, &entry.cluster_id) {
                (Some(_), Some(_)) => {
                    bail!("api_keys.{name}: set either `cluster` or `cluster_id`, not both")
                }
                (None, None) => bail!("api_keys.{name}: one of `cluster` or `cluster_id` is required"),
                (Some(cluster), None) if !self.clusters.contains_key(cluster) => {
                    bail!("api_keys.{name}: no [clusters.{cluster}] entry in this manifest")
                }
                (None, Some(id)) if id.trim().is_empty() => {
                    bail!("api_keys.{name}: `cluster_id` must not be empty")
                }
                _ => {}
            }
            if let Some(first) = targets.insert(entry.target(), name) {
                bail!(
                    "api_keys.{first} and api_keys.{name} target the same cluster; \
                     a cluster has one key set"
                );
            }
        }
        Ok(())
    }

    pub fn contains(&self, address: &Address) -> bool {
        match address.kind {
            ResourceKind::Cluster => self.clusters.contains_key(&address.name),
            ResourceKind::ClusterApiKeys => self.api_keys.contains_key(&address.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[clusters.search]
name = "prod-search"
memory = "0.5_gb"
vcpu = "2_vcpus_1_hr_burst_per_day"
region = "oregon"
auto_upgrade_capacity = true

[clusters.logs]
memory = "1_gb"
vcpu = "2_vcpus"
region = "frankfurt"

[api_keys.search]
cluster = "search"

[api_keys.legacy]
cluster_id = "abc123"
"#;

    #[test]
    fn test_parse_sample() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        assert_eq!(manifest.clusters.len(), 2);

        let spec = manifest.clusters["search"].to_spec();
        assert_eq!(spec.name.as_deref(), Some("prod-search"));
        assert!(spec.auto_upgrade_capacity);
        assert!(!spec.high_availability);

        assert_eq!(
            manifest.api_keys["search"].target(),
            ClusterRef::Managed(Address::cluster("search"))
        );
        assert_eq!(
            manifest.api_keys["legacy"].target(),
            ClusterRef::External("abc123")
        );
    }

    #[test]
    fn test_contains_by_kind() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        assert!(manifest.contains(&Address::cluster("logs")));
        assert!(manifest.contains(&Address::api_keys("legacy")));
        assert!(!manifest.contains(&Address::api_keys("logs")));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = Manifest::parse(
            "[clusters.a]\nmemory = \"1\"\nvcpu = \"2\"\nregion = \"x\"\nregions = [\"y\"]\n",
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_dangling_cluster_reference() {
        let err = Manifest::parse("[api_keys.a]\ncluster = \"missing\"\n").unwrap_err();
        assert!(err.to_string().contains("clusters.missing"));
    }

    #[test]
    fn test_keys_need_exactly_one_target() {
        assert!(Manifest::parse("[api_keys.a]\n").is_err());
        assert!(Manifest::parse(
            "[clusters.a]\nmemory = \"1\"\nvcpu = \"2\"\nregion = \"x\"\n\
             [api_keys.a]\ncluster = \"a\"\ncluster_id = \"id\"\n"
        )
        .is_err());
    }

    #[test]
    fn test_one_key_set_per_cluster() {
        let err = Manifest::parse(
            "[clusters.search]\nmemory = \"1\"\nvcpu = \"2\"\nregion = \"x\"\n\
             [api_keys.a]\ncluster = \"search\"\n\
             [api_keys.b]\ncluster = \"search\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("api_keys.a and api_keys.b"));

        assert!(Manifest::parse(
            "[api_keys.a]\ncluster_id = \"c1\"\n[api_keys.b]\ncluster_id = \"c1\"\n"
        )
        .is_err());
    }

    #[test]
    fn test_empty_region_rejected() {
        let err = Manifest::parse("[clusters.a]\nmemory = \"1\"\nvcpu = \"2\"\nregion = \"\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("region"));
    }

    #[test]
    fn test_empty_manifest_is_valid() {
        let manifest = Manifest::parse("").unwrap();
        assert!(manifest.clusters.is_empty());
        assert!(manifest.api_keys.is_empty());
    }

    #[test]
    fn test_address_parse_and_display() {
        let address: Address = "clusters.search".parse().unwrap();
        assert_eq!(address, Address::cluster("search"));
        assert_eq!(address.to_string(), "clusters.search");

        let keys: Address = "api_keys.search".parse().unwrap();
        assert_eq!(keys.kind, ResourceKind::ClusterApiKeys);
    }

    #[test]
    fn test_address_errors() {
        assert_eq!(
            "search".parse::<Address>(),
            Err(AddressError::Malformed("search".to_string()))
        );
        assert_eq!(
            "buckets.x".parse::<Address>(),
            Err(AddressError::UnknownTable("buckets".to_string()))
        );
        assert!(matches!(
            "clusters.a.b".parse::<Address>(),
            Err(AddressError::InvalidName(_))
        ));
    }
}
