//! Core types for cluster reconciliation

use cloudapi::{ApiKeys, Cluster, CreateClusterRequest, Secret};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phase of a tracked entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Not created yet
    #[default]
    Unprovisioned,
    /// Created remotely, not yet in service
    Provisioning,
    /// In service
    Ready,
    /// Mutable fields are being changed
    Updating,
    /// Teardown requested
    Terminating,
    /// Torn down; the local record may be discarded
    Gone,
    /// Last operation failed; remote state is uncertain
    Error,
}

impl Phase {
    /// Phase implied by a remote status string
    pub fn from_status(status: &str) -> Self {
        if status == cloudapi::READY_STATUS {
            Self::Ready
        } else {
            Self::Provisioning
        }
    }

    /// Whether a verb may start from this phase
    pub fn allows(&self, verb: Verb) -> bool {
        match self {
            Self::Unprovisioned | Self::Gone => matches!(verb, Verb::Create | Verb::Import),
            Self::Ready => matches!(verb, Verb::Read | Verb::Update | Verb::Delete),
            Self::Error => matches!(verb, Verb::Read | Verb::Delete),
            Self::Provisioning | Self::Updating | Self::Terminating => verb == Verb::Read,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unprovisioned => "unprovisioned",
            Self::Provisioning => "provisioning",
            Self::Ready => "ready",
            Self::Updating => "updating",
            Self::Terminating => "terminating",
            Self::Gone => "gone",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Operations a caller can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Create,
    Read,
    Update,
    Delete,
    Import,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Import => "import",
        };
        f.write_str(s)
    }
}

/// Kinds of managed entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Cluster,
    ClusterApiKeys,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cluster => f.write_str("cluster"),
            Self::ClusterApiKeys => f.write_str("cluster_api_keys"),
        }
    }
}

/// Desired configuration of a cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpec {
    /// Display name; the remote picks one when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Memory tier (fixed at creation)
    pub memory: String,
    /// vCPU tier (fixed at creation)
    pub vcpu: String,
    /// Primary region (fixed at creation)
    pub region: String,
    /// High availability (fixed at creation)
    #[serde(default)]
    pub high_availability: bool,
    /// High-performance disk (fixed at creation)
    #[serde(default)]
    pub high_performance_disk: bool,
    /// Automatically upgrade capacity
    #[serde(default)]
    pub auto_upgrade_capacity: bool,
}

impl ClusterSpec {
    /// Create a spec with the required tiers and region, defaults elsewhere
    pub fn new(memory: impl Into<String>, vcpu: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: None,
            memory: memory.into(),
            vcpu: vcpu.into(),
            region: region.into(),
            high_availability: false,
            high_performance_disk: false,
            auto_upgrade_capacity: false,
        }
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Build the create request; the region list always has one entry
    pub fn create_request(&self) -> CreateClusterRequest {
        let mut request = CreateClusterRequest::new(&self.memory, &self.vcpu, &self.region);
        request.high_availability = self.high_availability;
        request.high_performance_disk = self.high_performance_disk;
        request.name.clone_from(&self.name);
        request.auto_upgrade_capacity = self.auto_upgrade_capacity;
        request
    }

    /// Derive a spec from what the remote reports
    ///
    /// Only the first remote region is kept.
    pub fn from_observed(cluster: &Cluster) -> Self {
        let region = match cluster.primary_region() {
            Some(region) => region.to_string(),
            None => {
                log::warn!("Cluster {} reports no regions", cluster.id);
                String::new()
            }
        };
        Self {
            name: (!cluster.name.is_empty()).then(|| cluster.name.clone()),
            memory: cluster.memory.clone(),
            vcpu: cluster.vcpu.clone(),
            region,
            high_availability: cluster.high_availability,
            high_performance_disk: cluster.high_performance_disk,
            auto_upgrade_capacity: cluster.auto_upgrade_capacity,
        }
    }
}

/// A tracked cluster: desired half, observed half, and phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRecord {
    /// Remotely assigned identifier
    pub id: String,
    pub phase: Phase,
    /// What the caller asked for
    pub spec: ClusterSpec,
    /// What the remote last reported
    pub observed: Cluster,
}

impl ClusterRecord {
    /// Build a full record from an observed cluster (import and lookup)
    pub fn bootstrap(observed: Cluster) -> Self {
        Self {
            id: observed.id.clone(),
            phase: Phase::from_status(&observed.status),
            spec: ClusterSpec::from_observed(&observed),
            observed,
        }
    }

    /// Replace the observed half, keeping the desired half untouched
    pub fn refresh(&self, observed: Cluster) -> Self {
        Self {
            id: self.id.clone(),
            phase: Phase::from_status(&observed.status),
            spec: self.spec.clone(),
            observed,
        }
    }

    /// Same record in another phase
    pub fn with_phase(&self, phase: Phase) -> Self {
        Self {
            phase,
            ..self.clone()
        }
    }

    /// Whether the remote last reported the cluster in service
    pub fn is_ready(&self) -> bool {
        self.observed.is_ready()
    }
}

/// Desired key set: which cluster it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeysSpec {
    pub cluster_id: String,
}

/// A tracked key set
///
/// The secrets cannot be fetched again, so this record is the only copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeysRecord {
    /// Equal to the owning cluster id
    pub id: String,
    pub cluster_id: String,
    pub admin_key: Secret,
    pub search_only_key: Secret,
}

impl ApiKeysRecord {
    /// Record a freshly issued pair for a cluster
    pub fn issued(cluster_id: &str, keys: ApiKeys) -> Self {
        Self {
            id: cluster_id.to_string(),
            cluster_id: cluster_id.to_string(),
            admin_key: keys.admin_key,
            search_only_key: keys.search_only_key,
        }
    }
}

/// Desired configuration of any entity kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Desired {
    Cluster(ClusterSpec),
    ApiKeys(ApiKeysSpec),
}

impl Desired {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Cluster(_) => ResourceKind::Cluster,
            Self::ApiKeys(_) => ResourceKind::ClusterApiKeys,
        }
    }
}

/// Tracked record of any entity kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Cluster(ClusterRecord),
    ApiKeys(ApiKeysRecord),
}

impl Record {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Cluster(_) => ResourceKind::Cluster,
            Self::ApiKeys(_) => ResourceKind::ClusterApiKeys,
        }
    }

    /// Identifier of the entity
    pub fn id(&self) -> &str {
        match self {
            Self::Cluster(r) => &r.id,
            Self::ApiKeys(r) => &r.id,
        }
    }

    /// The cluster record, if this is one
    pub fn as_cluster(&self) -> Option<&ClusterRecord> {
        match self {
            Self::Cluster(r) => Some(r),
            Self::ApiKeys(_) => None,
        }
    }

    /// The key record, if this is one
    pub fn as_api_keys(&self) -> Option<&ApiKeysRecord> {
        match self {
            Self::ApiKeys(r) => Some(r),
            Self::Cluster(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observed(regions: &[&str], status: &str) -> Cluster {
        Cluster {
            id: "c1".to_string(),
            name: "prod".to_string(),
            memory: "0.5_gb".to_string(),
            vcpu: "2_vcpus_1_hr_burst_per_day".to_string(),
            regions: regions.iter().map(ToString::to_string).collect(),
            status: status.to_string(),
            ..Cluster::default()
        }
    }

    #[test]
    fn test_phase_allows() {
        assert!(Phase::Unprovisioned.allows(Verb::Create));
        assert!(Phase::Gone.allows(Verb::Import));
        assert!(!Phase::Unprovisioned.allows(Verb::Read));
        assert!(Phase::Ready.allows(Verb::Update));
        assert!(!Phase::Ready.allows(Verb::Create));
        assert!(Phase::Error.allows(Verb::Delete));
        assert!(!Phase::Error.allows(Verb::Update));
        assert!(Phase::Provisioning.allows(Verb::Read));
        assert!(!Phase::Provisioning.allows(Verb::Delete));
    }

    #[test]
    fn test_phase_from_status() {
        assert_eq!(Phase::from_status("in_service"), Phase::Ready);
        assert_eq!(Phase::from_status("provisioning"), Phase::Provisioning);
        assert_eq!(Phase::from_status(""), Phase::Provisioning);
    }

    #[test]
    fn test_create_request_single_region() {
        let spec = ClusterSpec::new("1_gb", "2_vcpus", "oregon").with_name("prod");
        let request = spec.create_request();
        assert_eq!(request.regions, vec!["oregon".to_string()]);
        assert_eq!(request.name.as_deref(), Some("prod"));
        assert_eq!(request.search_delivery_network, "off");
    }

    #[test]
    fn test_bootstrap_collapses_regions() {
        let record = ClusterRecord::bootstrap(observed(&["us-east-1", "us-west-2"], "in_service"));
        assert_eq!(record.spec.region, "us-east-1");
        assert_eq!(record.phase, Phase::Ready);
        assert_eq!(record.spec.name.as_deref(), Some("prod"));
        // Nothing discarded on the observed side.
        assert_eq!(record.observed.regions.len(), 2);
    }

    #[test]
    fn test_bootstrap_without_regions() {
        let record = ClusterRecord::bootstrap(observed(&[], "provisioning"));
        assert_eq!(record.spec.region, "");
        assert_eq!(record.phase, Phase::Provisioning);
    }

    #[test]
    fn test_refresh_keeps_spec() {
        let record = ClusterRecord::bootstrap(observed(&["us-east-1", "us-west-2"], "in_service"));
        let refreshed = record.refresh(observed(&["us-west-2", "us-east-1"], "in_service"));
        assert_eq!(refreshed.spec.region, "us-east-1");
        assert_eq!(refreshed.observed.regions[0], "us-west-2");
    }

    #[test]
    fn test_record_tagged_serialization() {
        let record = Record::ApiKeys(ApiKeysRecord::issued(
            "c1",
            ApiKeys {
                admin_key: Secret::new("a"),
                search_only_key: Secret::new("s"),
            },
        ));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["kind"], "api_keys");
        assert_eq!(value["id"], "c1");
        assert_eq!(record.kind(), ResourceKind::ClusterApiKeys);
        assert_eq!(record.id(), "c1");
    }
}
