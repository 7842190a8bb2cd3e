//! Execution planner - compares the manifest with tracked state
//!
//! Planning is pure: it reads the manifest and an already refreshed
//! [`TrackedState`] and never talks to the remote.

use reconcile::{
    ApiKeysRecord, ClusterRecord, ClusterSpec, DiffSummary, FieldDiff, FieldDrift, Phase, Record,
    classify, detect_drift,
};

use crate::manifest::{Address, ClusterRef, Manifest};
use crate::state::TrackedState;

/// Which cluster a key set will be issued for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeysTarget {
    /// Id known now
    Known(String),
    /// Id assigned when this manifest cluster is created
    AfterCreate(Address),
}

#[derive(Debug, Clone)]
pub enum Action {
    CreateCluster {
        address: Address,
        spec: ClusterSpec,
    },
    UpdateCluster {
        address: Address,
        record: ClusterRecord,
        spec: ClusterSpec,
        changes: Vec<FieldDiff>,
        drift: Vec<FieldDrift>,
    },
    IssueKeys {
        address: Address,
        target: KeysTarget,
        /// Tracked keys for a different cluster, forgotten first
        replaces: Option<ApiKeysRecord>,
    },
    Delete {
        address: Address,
        record: Record,
    },
}

impl Action {
    pub fn address(&self) -> &Address {
        match self {
            Self::CreateCluster { address, .. }
            | Self::UpdateCluster { address, .. }
            | Self::IssueKeys { address, .. }
            | Self::Delete { address, .. } => address,
        }
    }
}

/// Something the user should know that apply will not act on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub address: Address,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct Plan {
    pub actions: Vec<Action>,
    pub notices: Vec<Notice>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn summary(&self) -> DiffSummary {
        let mut summary = DiffSummary::default();
        for action in &self.actions {
            match action {
                Action::CreateCluster { .. } => summary.additions += 1,
                Action::IssueKeys { replaces, .. } => {
                    if replaces.is_some() {
                        summary.modifications += 1;
                    } else {
                        summary.additions += 1;
                    }
                }
                Action::UpdateCluster { .. } => summary.modifications += 1,
                Action::Delete { .. } => summary.removals += 1,
            }
        }
        summary
    }

    /// Keep only what concerns `target`
    pub fn retain_target(&mut self, target: &Address) {
        self.actions.retain(|a| a.address() == target);
        self.notices.retain(|n| &n.address == target);
    }
}

/// Build the plan that moves tracked state towards the manifest
///
/// Order: key removals, cluster removals, cluster creates and updates,
/// then key issuance, so keys can name clusters created in the same run.
pub fn build_plan(manifest: &Manifest, state: &TrackedState) -> Plan {
    let mut plan = Plan::default();

    for address in state.addresses().into_iter().rev() {
        if !manifest.contains(&address)
            && let Some(record) = state.get(&address)
        {
            plan.actions.push(Action::Delete { address, record });
        }
    }

    for (name, entry) in &manifest.clusters {
        let address = Address::cluster(name);
        let spec = entry.to_spec();
        match state.clusters.get(name) {
            Some(record) => plan_tracked_cluster(&mut plan, address, record, spec),
            None => plan.actions.push(Action::CreateCluster { address, spec }),
        }
    }

    // Includes stale records of clusters that vanished remotely
    let creating: Vec<Address> = plan
        .actions
        .iter()
        .filter_map(|a| match a {
            Action::CreateCluster { address, .. } => Some(address.clone()),
            _ => None,
        })
        .collect();

    for (name, entry) in &manifest.api_keys {
        let address = Address::api_keys(name);
        let target = match entry.target() {
            ClusterRef::Managed(cluster) => {
                match state.clusters.get(&cluster.name) {
                    Some(record) if !creating.contains(&cluster) => {
                        KeysTarget::Known(record.id.clone())
                    }
                    _ => KeysTarget::AfterCreate(cluster),
                }
            }
            ClusterRef::External(id) => KeysTarget::Known(id.to_string()),
        };

        match state.api_keys.get(name) {
            None => plan.actions.push(Action::IssueKeys {
                address,
                target,
                replaces: None,
            }),
            Some(record) => {
                if target != KeysTarget::Known(record.cluster_id.clone()) {
                    plan.actions.push(Action::IssueKeys {
                        address,
                        target,
                        replaces: Some(record.clone()),
                    });
                }
            }
        }
    }

    plan
}

fn plan_tracked_cluster(
    plan: &mut Plan,
    address: Address,
    record: &ClusterRecord,
    spec: ClusterSpec,
) {
    match record.phase {
        Phase::Unprovisioned | Phase::Gone => {
            plan.actions.push(Action::CreateCluster { address, spec });
        }
        Phase::Provisioning | Phase::Updating | Phase::Terminating => {
            plan.notices.push(Notice {
                address,
                message: format!(
                    "cluster {} is still {}; run `tscloud refresh` once it settles",
                    record.id, record.phase
                ),
            });
        }
        Phase::Error => {
            plan.notices.push(Notice {
                address,
                message: format!(
                    "cluster {} is in the error phase; refresh it, or destroy it to start over",
                    record.id
                ),
            });
        }
        Phase::Ready => {
            let changes = classify(&record.spec, &spec);
            let drift = detect_drift(record);

            for change in changes.iter().filter(|c| !c.mutable) {
                plan.notices.push(Notice {
                    address: address.clone(),
                    message: format!(
                        "`{}` is fixed at creation ({} -> {}); change ignored",
                        change.field, change.current, change.desired
                    ),
                });
            }
            for field in drift.iter().filter(|d| !d.is_correctable()) {
                plan.notices.push(Notice {
                    address: address.clone(),
                    message: format!(
                        "drift on `{}`: tracked {}, remote reports {}",
                        field.field, field.desired, field.observed
                    ),
                });
            }

            let needs_update =
                changes.iter().any(|c| c.mutable) || drift.iter().any(FieldDrift::is_correctable);
            if needs_update {
                plan.actions.push(Action::UpdateCluster {
                    address,
                    record: record.clone(),
                    spec,
                    changes: changes.into_iter().filter(|c| c.mutable).collect(),
                    drift: drift.into_iter().filter(FieldDrift::is_correctable).collect(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudapi::{ApiKeys, Cluster, Secret};

    const MANIFEST: &str = r#"
[clusters.search]
name = "prod"
memory = "0.5_gb"
vcpu = "2_vcpus"
region = "oregon"

[api_keys.search]
cluster = "search"
"#;

    fn manifest() -> Manifest {
        Manifest::parse(MANIFEST).unwrap()
    }

    fn ready_record(id: &str) -> ClusterRecord {
        let spec = ClusterSpec::new("0.5_gb", "2_vcpus", "oregon").with_name("prod");
        ClusterRecord {
            id: id.to_string(),
            phase: Phase::Ready,
            spec,
            observed: Cluster {
                id: id.to_string(),
                name: "prod".to_string(),
                memory: "0.5_gb".to_string(),
                vcpu: "2_vcpus".to_string(),
                regions: vec!["oregon".to_string()],
                status: "in_service".to_string(),
                ..Cluster::default()
            },
        }
    }

    fn keys_for(cluster_id: &str) -> ApiKeysRecord {
        ApiKeysRecord::issued(
            cluster_id,
            ApiKeys {
                admin_key: Secret::new("a"),
                search_only_key: Secret::new("s"),
            },
        )
    }

    fn converged() -> TrackedState {
        let mut state = TrackedState::default();
        state.clusters.insert("search".to_string(), ready_record("c1"));
        state.api_keys.insert("search".to_string(), keys_for("c1"));
        state
    }

    #[test]
    fn test_empty_state_creates_everything() {
        let plan = build_plan(&manifest(), &TrackedState::default());
        assert_eq!(plan.actions.len(), 2);
        assert!(matches!(plan.actions[0], Action::CreateCluster { .. }));
        assert!(matches!(
            &plan.actions[1],
            Action::IssueKeys { target: KeysTarget::AfterCreate(a), replaces: None, .. }
                if *a == Address::cluster("search")
        ));
        assert_eq!(plan.summary().additions, 2);
    }

    #[test]
    fn test_converged_state_is_empty() {
        let plan = build_plan(&manifest(), &converged());
        assert!(plan.is_empty());
        assert!(plan.notices.is_empty());
    }

    #[test]
    fn test_mutable_change_plans_update() {
        let mut state = converged();
        state.clusters.get_mut("search").unwrap().spec.name = Some("old".to_string());
        state.clusters.get_mut("search").unwrap().observed.name = "old".to_string();

        let plan = build_plan(&manifest(), &state);
        assert_eq!(plan.actions.len(), 1);
        let Action::UpdateCluster { changes, .. } = &plan.actions[0] else {
            panic!("expected update, got {:?}", plan.actions[0]);
        };
        assert_eq!(changes[0].field, "name");
        assert_eq!(plan.summary().modifications, 1);
    }

    #[test]
    fn test_fixed_change_is_a_notice_only() {
        let plan = build_plan(
            &Manifest::parse(&MANIFEST.replace("0.5_gb", "4_gb")).unwrap(),
            &converged(),
        );
        assert!(plan.is_empty());
        assert_eq!(plan.notices.len(), 1);
        assert!(plan.notices[0].message.contains("memory"));
    }

    #[test]
    fn test_remote_rename_is_corrected() {
        let mut state = converged();
        state.clusters.get_mut("search").unwrap().observed.name = "renamed".to_string();

        let plan = build_plan(&manifest(), &state);
        assert!(matches!(
            &plan.actions[0],
            Action::UpdateCluster { changes, drift, .. } if changes.is_empty() && drift.len() == 1
        ));
    }

    #[test]
    fn test_multi_region_drift_is_a_notice() {
        let mut state = converged();
        state.clusters.get_mut("search").unwrap().observed.regions =
            vec!["oregon".to_string(), "virginia".to_string()];

        let plan = build_plan(&manifest(), &state);
        assert!(plan.is_empty());
        assert!(plan.notices[0].message.contains("regions"));
    }

    #[test]
    fn test_removed_entities_are_deleted_keys_first() {
        let plan = build_plan(&Manifest::default(), &converged());
        let addresses: Vec<String> = plan.actions.iter().map(|a| a.address().to_string()).collect();
        assert_eq!(addresses, vec!["api_keys.search", "clusters.search"]);
        assert_eq!(plan.summary().removals, 2);
    }

    #[test]
    fn test_gone_cluster_is_recreated_and_keys_reissued() {
        let mut state = converged();
        state.clusters.get_mut("search").unwrap().phase = Phase::Gone;

        let plan = build_plan(&manifest(), &state);
        assert!(matches!(plan.actions[0], Action::CreateCluster { .. }));
        assert!(matches!(
            &plan.actions[1],
            Action::IssueKeys { target: KeysTarget::AfterCreate(_), replaces: Some(_), .. }
        ));
    }

    #[test]
    fn test_provisioning_cluster_waits() {
        let mut state = converged();
        state.clusters.get_mut("search").unwrap().phase = Phase::Provisioning;

        let plan = build_plan(&manifest(), &state);
        assert!(plan.is_empty());
        assert!(plan.notices[0].message.contains("provisioning"));
    }

    #[test]
    fn test_external_cluster_id_for_keys() {
        let manifest = Manifest::parse("[api_keys.legacy]\ncluster_id = \"x9\"\n").unwrap();
        let plan = build_plan(&manifest, &TrackedState::default());
        assert!(matches!(
            &plan.actions[0],
            Action::IssueKeys { target: KeysTarget::Known(id), .. } if id == "x9"
        ));
    }

    #[test]
    fn test_retain_target() {
        let mut plan = build_plan(&manifest(), &TrackedState::default());
        plan.retain_target(&Address::api_keys("search"));
        assert_eq!(plan.actions.len(), 1);
        assert_eq!(plan.actions[0].address(), &Address::api_keys("search"));
    }
}
