//! Wire types for the cluster management API.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Status reported by the remote once a cluster can serve traffic.
pub const READY_STATUS: &str = "in_service";

/// Value the remote expects for the search delivery network on create.
pub const SEARCH_DELIVERY_NETWORK_OFF: &str = "off";

/// A cluster as reported by the remote system.
///
/// Every field tolerates `null` or absence, since the synchronous create
/// response is only a partial record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    /// Remotely assigned identifier.
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    /// Display name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Memory tier, e.g. `0.5_gb`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub memory: String,
    /// vCPU tier, e.g. `2_vcpus_1_hr_burst_per_day`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub vcpu: String,
    /// High-performance disk flag (`"yes"`/`"no"` on the wire).
    #[serde(default, with = "yes_no")]
    pub high_performance_disk: bool,
    /// Server version running on the nodes.
    #[serde(default, deserialize_with = "null_as_default")]
    pub typesense_server_version: String,
    /// High-availability flag (`"yes"`/`"no"` on the wire).
    #[serde(default, with = "yes_no")]
    pub high_availability: bool,
    /// Search delivery network mode.
    #[serde(default, deserialize_with = "null_as_default")]
    pub search_delivery_network: String,
    /// Load-balancing mode.
    #[serde(default, deserialize_with = "null_as_default")]
    pub load_balancing: String,
    /// Regions, in the order the remote reports them.
    #[serde(default, deserialize_with = "null_as_default")]
    pub regions: Vec<String>,
    /// Automatically upgrade capacity when usage grows.
    #[serde(default, deserialize_with = "null_as_default")]
    pub auto_upgrade_capacity: bool,
    /// Lifecycle status, e.g. `provisioning` or `in_service`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    /// Hostnames assigned to the cluster.
    #[serde(default, deserialize_with = "null_as_default")]
    pub hostnames: Hostnames,
}

impl Cluster {
    /// Whether the remote reports the cluster as usable.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status == READY_STATUS
    }

    /// The primary region (first in the remote list).
    #[must_use]
    pub fn primary_region(&self) -> Option<&str> {
        self.regions.first().map(String::as_str)
    }
}

/// Hostnames of a cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hostnames {
    /// Load-balanced endpoint.
    #[serde(default, deserialize_with = "null_as_default")]
    pub load_balanced: String,
    /// Per-node hostnames, in remote order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub nodes: Vec<String>,
}

/// Body of a create-cluster request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateClusterRequest {
    /// Memory tier.
    pub memory: String,
    /// vCPU tier.
    pub vcpu: String,
    /// Regions to provision in.
    pub regions: Vec<String>,
    /// High-availability flag.
    #[serde(with = "yes_no")]
    pub high_availability: bool,
    /// Always `"off"`.
    pub search_delivery_network: &'static str,
    /// High-performance disk flag.
    #[serde(with = "yes_no")]
    pub high_performance_disk: bool,
    /// Display name; the remote picks one when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Auto-upgrade-capacity flag.
    pub auto_upgrade_capacity: bool,
}

impl CreateClusterRequest {
    /// Create a request with the required tiers and region.
    pub fn new(memory: impl Into<String>, vcpu: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            memory: memory.into(),
            vcpu: vcpu.into(),
            regions: vec![region.into()],
            high_availability: false,
            search_delivery_network: SEARCH_DELIVERY_NETWORK_OFF,
            high_performance_disk: false,
            name: None,
            auto_upgrade_capacity: false,
        }
    }
}

/// Body of a patch-cluster request.
///
/// Only the always-mutable fields exist here, so creation-time settings
/// cannot be sent on update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClusterPatch {
    /// New display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New auto-upgrade-capacity flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_upgrade_capacity: Option<bool>,
}

/// A one-time key pair issued for a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeys {
    /// Key with full administrative access.
    pub admin_key: Secret,
    /// Key restricted to search requests.
    pub search_only_key: Secret,
}

/// An opaque secret whose `Debug` and `Display` never show the value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the raw secret value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Remote operations, used to label errors and recorded calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `POST /clusters`
    CreateCluster,
    /// `GET /clusters/{id}`
    FetchCluster,
    /// `PATCH /clusters/{id}`
    PatchCluster,
    /// `POST /clusters/{id}/lifecycle`
    TerminateCluster,
    /// `POST /clusters/{id}/api-keys`
    IssueApiKeys,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreateCluster => "create cluster",
            Self::FetchCluster => "fetch cluster",
            Self::PatchCluster => "patch cluster",
            Self::TerminateCluster => "terminate cluster",
            Self::IssueApiKeys => "issue API keys",
        };
        f.write_str(name)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `"yes"`/`"no"` string flags.
mod yes_no {
    use serde::{Deserialize, Deserializer, Serializer, de};

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "yes" } else { "no" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match Option::<String>::deserialize(deserializer)?.as_deref() {
            None | Some("" | "no") => Ok(false),
            // The remote sometimes qualifies the value, e.g. "yes_3_nodes".
            Some(v) if v.starts_with("yes") => Ok(true),
            Some(other) => Err(de::Error::invalid_value(
                de::Unexpected::Str(other),
                &"\"yes\" or \"no\"",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_from_full_response() {
        let json = r#"{
            "id": "abc123",
            "name": "prod",
            "memory": "0.5_gb",
            "vcpu": "2_vcpus_1_hr_burst_per_day",
            "high_performance_disk": "no",
            "typesense_server_version": "0.25.2",
            "high_availability": "yes",
            "search_delivery_network": "off",
            "load_balancing": "yes",
            "regions": ["oregon"],
            "auto_upgrade_capacity": true,
            "status": "in_service",
            "hostnames": {
                "load_balanced": "abc123.a1.typesense.net",
                "nodes": ["abc123-1.a1.typesense.net", "abc123-2.a1.typesense.net"]
            }
        }"#;

        let cluster: Cluster = serde_json::from_str(json).unwrap();
        assert_eq!(cluster.id, "abc123");
        assert!(cluster.high_availability);
        assert!(!cluster.high_performance_disk);
        assert!(cluster.auto_upgrade_capacity);
        assert!(cluster.is_ready());
        assert_eq!(cluster.primary_region(), Some("oregon"));
        assert_eq!(cluster.hostnames.nodes.len(), 2);
    }

    #[test]
    fn test_cluster_partial_response_with_nulls() {
        let json = r#"{"id": "abc123", "status": "provisioning", "hostnames": null, "high_availability": null}"#;

        let cluster: Cluster = serde_json::from_str(json).unwrap();
        assert_eq!(cluster.id, "abc123");
        assert!(!cluster.is_ready());
        assert!(!cluster.high_availability);
        assert_eq!(cluster.hostnames, Hostnames::default());
        assert_eq!(cluster.primary_region(), None);
    }

    #[test]
    fn test_yes_no_rejects_unknown_value() {
        let json = r#"{"high_availability": "maybe"}"#;
        assert!(serde_json::from_str::<Cluster>(json).is_err());
    }

    #[test]
    fn test_create_request_shape() {
        let mut request = CreateClusterRequest::new("0.5_gb", "2_vcpus_1_hr_burst_per_day", "oregon");
        request.high_availability = true;

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["regions"], serde_json::json!(["oregon"]));
        assert_eq!(value["high_availability"], "yes");
        assert_eq!(value["high_performance_disk"], "no");
        assert_eq!(value["search_delivery_network"], "off");
        assert_eq!(value["auto_upgrade_capacity"], false);
        assert!(value.get("name").is_none());
    }

    #[test]
    fn test_patch_only_sends_present_fields() {
        let patch = ClusterPatch {
            name: None,
            auto_upgrade_capacity: Some(true),
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            serde_json::json!({"auto_upgrade_capacity": true})
        );
        assert_eq!(
            serde_json::to_value(ClusterPatch::default()).unwrap(),
            serde_json::json!({})
        );
    }

    #[test]
    fn test_secret_is_redacted() {
        let keys: ApiKeys =
            serde_json::from_str(r#"{"admin_key": "adm-xyz", "search_only_key": "srch-xyz"}"#)
                .unwrap();

        assert_eq!(keys.admin_key.expose(), "adm-xyz");
        assert_eq!(keys.search_only_key.to_string(), "***");
        assert!(!format!("{keys:?}").contains("xyz"));
        assert_eq!(
            serde_json::to_value(&keys.admin_key).unwrap(),
            serde_json::json!("adm-xyz")
        );
    }

    #[test]
    fn test_operation_display() {
        assert_eq!(Operation::IssueApiKeys.to_string(), "issue API keys");
        assert_eq!(Operation::TerminateCluster.to_string(), "terminate cluster");
    }
}
