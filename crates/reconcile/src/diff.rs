//! Diff computation between desired and tracked cluster state
//!
//! Everything here is pure: no remote calls, no logging.

use crate::types::{ClusterRecord, ClusterSpec};
use cloudapi::ClusterPatch;
use serde::Serialize;

/// Fields that can only be set when the cluster is created
pub const CREATION_TIME_FIELDS: &[&str] = &[
    "memory",
    "vcpu",
    "region",
    "high_availability",
    "high_performance_disk",
];

/// Fields an update can change in place
pub const MUTABLE_FIELDS: &[&str] = &["name", "auto_upgrade_capacity"];

/// One field that differs between two specs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDiff {
    pub field: &'static str,
    pub current: String,
    pub desired: String,
    /// Whether an update can change it in place
    pub mutable: bool,
}

impl FieldDiff {
    fn new(field: &'static str, current: impl ToString, desired: impl ToString) -> Self {
        Self {
            field,
            current: current.to_string(),
            desired: desired.to_string(),
            mutable: !CREATION_TIME_FIELDS.contains(&field),
        }
    }
}

/// Compare a tracked spec with a desired one
///
/// An absent desired name keeps the tracked one, so it never differs.
pub fn classify(current: &ClusterSpec, desired: &ClusterSpec) -> Vec<FieldDiff> {
    let mut diffs = Vec::new();

    if let Some(name) = &desired.name
        && current.name.as_ref() != Some(name)
    {
        diffs.push(FieldDiff::new(
            "name",
            current.name.as_deref().unwrap_or("(unset)"),
            name,
        ));
    }
    if current.auto_upgrade_capacity != desired.auto_upgrade_capacity {
        diffs.push(FieldDiff::new(
            "auto_upgrade_capacity",
            current.auto_upgrade_capacity,
            desired.auto_upgrade_capacity,
        ));
    }
    if current.memory != desired.memory {
        diffs.push(FieldDiff::new("memory", &current.memory, &desired.memory));
    }
    if current.vcpu != desired.vcpu {
        diffs.push(FieldDiff::new("vcpu", &current.vcpu, &desired.vcpu));
    }
    if current.region != desired.region {
        diffs.push(FieldDiff::new("region", &current.region, &desired.region));
    }
    if current.high_availability != desired.high_availability {
        diffs.push(FieldDiff::new(
            "high_availability",
            current.high_availability,
            desired.high_availability,
        ));
    }
    if current.high_performance_disk != desired.high_performance_disk {
        diffs.push(FieldDiff::new(
            "high_performance_disk",
            current.high_performance_disk,
            desired.high_performance_disk,
        ));
    }

    diffs
}

/// What an update will send and what it will keep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePlan {
    /// Spec to track after a successful update
    pub next: ClusterSpec,
    /// Request body; only always-mutable fields
    pub patch: ClusterPatch,
    /// Creation-time fields that differ and will not be sent
    pub ignored: Vec<&'static str>,
}

/// Plan an in-place update from `current` towards `desired`
pub fn plan_update(current: &ClusterSpec, desired: &ClusterSpec) -> UpdatePlan {
    let next = ClusterSpec {
        name: desired.name.clone().or_else(|| current.name.clone()),
        auto_upgrade_capacity: desired.auto_upgrade_capacity,
        ..current.clone()
    };

    let patch = ClusterPatch {
        name: desired.name.clone(),
        auto_upgrade_capacity: Some(desired.auto_upgrade_capacity),
    };

    let ignored = classify(current, desired)
        .into_iter()
        .filter(|d| !d.mutable)
        .map(|d| d.field)
        .collect();

    UpdatePlan {
        next,
        patch,
        ignored,
    }
}

/// A field where the remote no longer matches the tracked spec
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDrift {
    pub field: &'static str,
    pub desired: String,
    pub observed: String,
}

impl FieldDrift {
    fn new(field: &'static str, desired: impl ToString, observed: impl ToString) -> Self {
        Self {
            field,
            desired: desired.to_string(),
            observed: observed.to_string(),
        }
    }

    /// Whether an update can bring the remote back in line
    pub fn is_correctable(&self) -> bool {
        MUTABLE_FIELDS.contains(&self.field)
    }
}

/// Compare the desired half of a record with its observed half
pub fn detect_drift(record: &ClusterRecord) -> Vec<FieldDrift> {
    let spec = &record.spec;
    let observed = &record.observed;
    let mut drift = Vec::new();

    if let Some(name) = &spec.name
        && *name != observed.name
    {
        drift.push(FieldDrift::new("name", name, &observed.name));
    }
    if spec.auto_upgrade_capacity != observed.auto_upgrade_capacity {
        drift.push(FieldDrift::new(
            "auto_upgrade_capacity",
            spec.auto_upgrade_capacity,
            observed.auto_upgrade_capacity,
        ));
    }
    if spec.memory != observed.memory {
        drift.push(FieldDrift::new("memory", &spec.memory, &observed.memory));
    }
    if spec.vcpu != observed.vcpu {
        drift.push(FieldDrift::new("vcpu", &spec.vcpu, &observed.vcpu));
    }
    if observed.regions.len() != 1 || observed.regions[0] != spec.region {
        drift.push(FieldDrift::new(
            "regions",
            format!("[{}]", spec.region),
            format!("[{}]", observed.regions.join(", ")),
        ));
    }
    if spec.high_availability != observed.high_availability {
        drift.push(FieldDrift::new(
            "high_availability",
            spec.high_availability,
            observed.high_availability,
        ));
    }
    if spec.high_performance_disk != observed.high_performance_disk {
        drift.push(FieldDrift::new(
            "high_performance_disk",
            spec.high_performance_disk,
            observed.high_performance_disk,
        ));
    }

    drift
}

/// Counts of planned changes across entities
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub additions: usize,
    pub removals: usize,
    pub modifications: usize,
}

impl DiffSummary {
    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.modifications
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}
