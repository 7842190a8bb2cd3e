//! Read-only cluster lookup by id.

use crate::error::Result;
use crate::retry::{LogRetry, RetryConfig, with_retry};
use crate::types::ClusterRecord;
use cloudapi::ManagementApi;
use std::sync::Arc;

/// Fetches a cluster without touching any tracked record.
#[derive(Clone)]
pub struct Lookup {
    api: Arc<dyn ManagementApi>,
    retry: RetryConfig,
}

impl Lookup {
    pub fn new(api: Arc<dyn ManagementApi>, retry: RetryConfig) -> Self {
        Self { api, retry }
    }

    /// Project the remote state of `id` into a record, as import would.
    pub fn get(&self, id: &str) -> Result<ClusterRecord> {
        let what = format!("lookup of {id}");
        let observed = with_retry(&self.retry, Some(&LogRetry { what: &what }), || {
            self.api.fetch_cluster(id)
        })?;
        Ok(ClusterRecord::bootstrap(observed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Phase;
    use cloudapi::{Cluster, MockApi, Operation};

    #[test]
    fn test_get_projects_observed() {
        let mock = MockApi::new();
        mock.insert_cluster(Cluster {
            id: "c1".to_string(),
            memory: "1_gb".to_string(),
            regions: vec!["us-east-1".to_string(), "us-west-2".to_string()],
            status: "in_service".to_string(),
            ..Cluster::default()
        });
        let lookup = Lookup::new(Arc::new(mock.clone()), RetryConfig::no_retry());

        let record = lookup.get("c1").unwrap();
        assert_eq!(record.phase, Phase::Ready);
        assert_eq!(record.spec.memory, "1_gb");
        assert_eq!(record.spec.region, "us-east-1");
        assert_eq!(mock.calls().len(), 1);
        assert_eq!(mock.call_count(Operation::FetchCluster), 1);
    }

    #[test]
    fn test_get_missing() {
        let lookup = Lookup::new(Arc::new(MockApi::new()), RetryConfig::no_retry());
        assert!(lookup.get("nope").unwrap_err().is_not_found());
    }
}
