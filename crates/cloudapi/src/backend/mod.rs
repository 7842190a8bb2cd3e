//! The [`ManagementApi`] trait and its implementations.
//!
//! [`http::CloudClient`] talks to the hosted management API over HTTPS.
//! [`MockApi`] keeps clusters in memory, replays scripted responses, and
//! records every call, so engine tests never need the network.
//!
//! # Testing
//!
//! ```
//! use cloudapi::{CreateClusterRequest, ManagementApi, MockApi, Operation};
//!
//! let mock = MockApi::new();
//! let created = mock
//!     .create_cluster(&CreateClusterRequest::new("0.5_gb", "2_vcpus_1_hr_burst_per_day", "oregon"))
//!     .unwrap();
//! assert_eq!(created.status, "provisioning");
//!
//! let fetched = mock.fetch_cluster(&created.id).unwrap();
//! assert!(fetched.is_ready());
//! assert_eq!(mock.call_count(Operation::FetchCluster), 1);
//! ```

pub mod http;

use crate::error::{Error, Result};
use crate::types::{ApiKeys, Cluster, ClusterPatch, CreateClusterRequest, Hostnames, Operation, Secret};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Request/response contract with the remote management API.
///
/// Implementations are stateless with respect to callers: each method maps
/// one request to one response and surfaces failures as [`Error`].
pub trait ManagementApi: Send + Sync {
    /// Fetch the full observed state of a cluster.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the cluster does not exist.
    fn fetch_cluster(&self, id: &str) -> Result<Cluster>;

    /// Request a new cluster.
    ///
    /// Returns the synchronous partial record, carrying the assigned id and
    /// usually a `provisioning` status.
    fn create_cluster(&self, request: &CreateClusterRequest) -> Result<Cluster>;

    /// Change the always-mutable fields of a cluster.
    fn patch_cluster(&self, id: &str, patch: &ClusterPatch) -> Result<()>;

    /// Ask the remote to tear a cluster down.
    ///
    /// Succeeds once the request is accepted; teardown continues remotely.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the cluster is already gone.
    fn terminate_cluster(&self, id: &str) -> Result<()>;

    /// Generate a new key pair for a cluster.
    ///
    /// The remote never returns these secrets again.
    fn issue_api_keys(&self, cluster_id: &str) -> Result<ApiKeys>;
}

/// A call recorded by [`MockApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `fetch_cluster(id)`
    Fetch(String),
    /// `create_cluster(request)`
    Create(CreateClusterRequest),
    /// `patch_cluster(id, patch)`
    Patch(String, ClusterPatch),
    /// `terminate_cluster(id)`
    Terminate(String),
    /// `issue_api_keys(cluster_id)`
    IssueKeys(String),
}

impl Call {
    /// The operation this call exercised.
    #[must_use]
    pub fn operation(&self) -> Operation {
        match self {
            Self::Fetch(_) => Operation::FetchCluster,
            Self::Create(_) => Operation::CreateCluster,
            Self::Patch(..) => Operation::PatchCluster,
            Self::Terminate(_) => Operation::TerminateCluster,
            Self::IssueKeys(_) => Operation::IssueApiKeys,
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    clusters: HashMap<String, Cluster>,
    fetch_scripts: HashMap<String, VecDeque<Result<Cluster>>>,
    failures: HashMap<Operation, VecDeque<Error>>,
    next_id: u32,
    issued: u32,
    calls: Vec<Call>,
}

impl MockState {
    fn take_failure(&mut self, operation: Operation) -> Option<Error> {
        self.failures.get_mut(&operation).and_then(VecDeque::pop_front)
    }
}

/// In-memory management API for testing without network access.
///
/// Created clusters start out `provisioning` and become `in_service` on the
/// first unscripted fetch. Use [`MockApi::script_fetch`] to control the
/// exact sequence of fetch results for a cluster, and
/// [`MockApi::fail_next`] to make the next call of an operation fail.
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockApi {
    state: Arc<Mutex<MockState>>,
}

impl MockApi {
    /// Create an empty mock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a cluster as if it already existed remotely.
    pub fn insert_cluster(&self, cluster: Cluster) {
        self.lock().clusters.insert(cluster.id.clone(), cluster);
    }

    /// Current remote copy of a cluster, without recording a call.
    #[must_use]
    pub fn cluster(&self, id: &str) -> Option<Cluster> {
        self.lock().clusters.get(id).cloned()
    }

    /// Queue results for upcoming fetches of `id`, consumed in order.
    ///
    /// Once the script runs out, fetches fall back to the stored cluster.
    pub fn script_fetch(&self, id: &str, results: impl IntoIterator<Item = Result<Cluster>>) {
        self.lock()
            .fetch_scripts
            .entry(id.to_string())
            .or_default()
            .extend(results);
    }

    /// Make the next call of `operation` fail with `error`.
    pub fn fail_next(&self, operation: Operation, error: Error) {
        self.lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// All calls made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Number of calls made for one operation.
    #[must_use]
    pub fn call_count(&self, operation: Operation) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    /// Forget recorded calls.
    pub fn reset_calls(&self) {
        self.lock().calls.clear();
    }
}

impl ManagementApi for MockApi {
    fn fetch_cluster(&self, id: &str) -> Result<Cluster> {
        let mut state = self.lock();
        state.calls.push(Call::Fetch(id.to_string()));
        if let Some(err) = state.take_failure(Operation::FetchCluster) {
            return Err(err);
        }

        if let Some(scripted) = state.fetch_scripts.get_mut(id).and_then(VecDeque::pop_front) {
            if let Ok(cluster) = &scripted {
                state.clusters.insert(id.to_string(), cluster.clone());
            }
            return scripted;
        }

        let cluster = state.clusters.get_mut(id).ok_or_else(|| Error::not_found(id))?;
        if cluster.status == "provisioning" {
            cluster.status = crate::types::READY_STATUS.to_string();
            cluster.hostnames = Hostnames {
                load_balanced: format!("{id}.a1.example.net"),
                nodes: vec![format!("{id}-1.a1.example.net")],
            };
        }
        Ok(cluster.clone())
    }

    fn create_cluster(&self, request: &CreateClusterRequest) -> Result<Cluster> {
        let mut state = self.lock();
        state.calls.push(Call::Create(request.clone()));
        if let Some(err) = state.take_failure(Operation::CreateCluster) {
            return Err(err);
        }

        state.next_id += 1;
        let id = format!("mock{}", state.next_id);
        let cluster = Cluster {
            id: id.clone(),
            name: request.name.clone().unwrap_or_else(|| format!("cluster-{id}")),
            memory: request.memory.clone(),
            vcpu: request.vcpu.clone(),
            high_performance_disk: request.high_performance_disk,
            typesense_server_version: "0.25.2".to_string(),
            high_availability: request.high_availability,
            search_delivery_network: request.search_delivery_network.to_string(),
            load_balancing: "no".to_string(),
            regions: request.regions.clone(),
            auto_upgrade_capacity: request.auto_upgrade_capacity,
            status: "provisioning".to_string(),
            hostnames: Hostnames::default(),
        };
        state.clusters.insert(id, cluster.clone());
        Ok(cluster)
    }

    fn patch_cluster(&self, id: &str, patch: &ClusterPatch) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(Call::Patch(id.to_string(), patch.clone()));
        if let Some(err) = state.take_failure(Operation::PatchCluster) {
            return Err(err);
        }

        let cluster = state.clusters.get_mut(id).ok_or_else(|| Error::not_found(id))?;
        if let Some(name) = &patch.name {
            cluster.name.clone_from(name);
        }
        if let Some(auto_upgrade) = patch.auto_upgrade_capacity {
            cluster.auto_upgrade_capacity = auto_upgrade;
        }
        Ok(())
    }

    fn terminate_cluster(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(Call::Terminate(id.to_string()));
        if let Some(err) = state.take_failure(Operation::TerminateCluster) {
            return Err(err);
        }

        state
            .clusters
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(id))
    }

    fn issue_api_keys(&self, cluster_id: &str) -> Result<ApiKeys> {
        let mut state = self.lock();
        state.calls.push(Call::IssueKeys(cluster_id.to_string()));
        if let Some(err) = state.take_failure(Operation::IssueApiKeys) {
            return Err(err);
        }
        if !state.clusters.contains_key(cluster_id) {
            return Err(Error::not_found(cluster_id));
        }

        state.issued += 1;
        let n = state.issued;
        Ok(ApiKeys {
            admin_key: Secret::new(format!("admin-{cluster_id}-{n}")),
            search_only_key: Secret::new(format!("search-{cluster_id}-{n}")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateClusterRequest {
        CreateClusterRequest::new("0.5_gb", "2_vcpus_1_hr_burst_per_day", "oregon")
    }

    #[test]
    fn test_mock_create_then_fetch() {
        let mock = MockApi::new();
        let created = mock.create_cluster(&request()).unwrap();
        assert_eq!(created.id, "mock1");
        assert_eq!(created.status, "provisioning");

        let fetched = mock.fetch_cluster("mock1").unwrap();
        assert!(fetched.is_ready());
        assert!(!fetched.hostnames.load_balanced.is_empty());
        assert_eq!(fetched.regions, vec!["oregon".to_string()]);
    }

    #[test]
    fn test_mock_fetch_missing() {
        let mock = MockApi::new();
        assert!(mock.fetch_cluster("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn test_mock_script_fetch_in_order() {
        let mock = MockApi::new();
        let provisioning = Cluster {
            id: "c1".to_string(),
            status: "provisioning".to_string(),
            ..Cluster::default()
        };
        mock.script_fetch(
            "c1",
            [
                Ok(provisioning.clone()),
                Err(Error::transport("reset", None)),
            ],
        );

        assert_eq!(mock.fetch_cluster("c1").unwrap(), provisioning);
        assert!(mock.fetch_cluster("c1").unwrap_err().is_retryable());
        // Script exhausted; the last scripted success was stored.
        assert!(mock.fetch_cluster("c1").unwrap().is_ready());
    }

    #[test]
    fn test_mock_fail_next_is_one_shot() {
        let mock = MockApi::new();
        mock.fail_next(
            Operation::CreateCluster,
            Error::RemoteRejected {
                operation: Operation::CreateCluster,
                body: "{\"success\":false}".to_string(),
            },
        );

        assert!(mock.create_cluster(&request()).is_err());
        assert!(mock.create_cluster(&request()).is_ok());
        assert_eq!(mock.call_count(Operation::CreateCluster), 2);
    }

    #[test]
    fn test_mock_patch_and_terminate() {
        let mock = MockApi::new();
        let created = mock.create_cluster(&request()).unwrap();

        let patch = ClusterPatch {
            name: Some("renamed".to_string()),
            auto_upgrade_capacity: None,
        };
        mock.patch_cluster(&created.id, &patch).unwrap();
        assert_eq!(mock.cluster(&created.id).unwrap().name, "renamed");

        mock.terminate_cluster(&created.id).unwrap();
        assert!(mock.terminate_cluster(&created.id).unwrap_err().is_not_found());
        assert_eq!(
            mock.calls().last(),
            Some(&Call::Terminate(created.id.clone()))
        );
    }

    #[test]
    fn test_mock_issue_keys_are_fresh() {
        let mock = MockApi::new();
        let created = mock.create_cluster(&request()).unwrap();

        let first = mock.issue_api_keys(&created.id).unwrap();
        let second = mock.issue_api_keys(&created.id).unwrap();
        assert_ne!(first, second);
        assert!(mock.issue_api_keys("missing").is_err());
    }

    #[test]
    fn test_mock_clones_share_state() {
        let mock = MockApi::new();
        let other = mock.clone();
        other.create_cluster(&request()).unwrap();
        assert_eq!(mock.call_count(Operation::CreateCluster), 1);
        mock.reset_calls();
        assert!(other.calls().is_empty());
    }
}
