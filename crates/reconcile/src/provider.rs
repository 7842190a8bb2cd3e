//! Provider facade - dispatches tagged records to the matching controller

use crate::api_keys::ApiKeysController;
use crate::cluster::ClusterController;
use crate::context::ApplyContext;
use crate::error::{Error, Result};
use crate::lookup::Lookup;
use crate::resource::Lifecycle;
use crate::retry::RetryConfig;
use crate::types::{ClusterRecord, Desired, Phase, Record, ResourceKind, Verb};
use cloudapi::ManagementApi;
use rayon::prelude::*;
use std::sync::Arc;

/// Entry point for hosts: one management API, every entity kind
#[derive(Clone)]
pub struct Provider {
    clusters: ClusterController,
    api_keys: ApiKeysController,
    lookup: Lookup,
}

impl Provider {
    /// Create a provider with the default fetch retry policy
    pub fn new(api: Arc<dyn ManagementApi>) -> Self {
        Self::with_retry(api, RetryConfig::default())
    }

    /// Create a provider with a custom fetch retry policy
    pub fn with_retry(api: Arc<dyn ManagementApi>, retry: RetryConfig) -> Self {
        Self {
            clusters: ClusterController::with_retry(Arc::clone(&api), retry.clone()),
            api_keys: ApiKeysController::new(Arc::clone(&api)),
            lookup: Lookup::new(api, retry),
        }
    }

    pub fn clusters(&self) -> &ClusterController {
        &self.clusters
    }

    pub fn api_keys(&self) -> &ApiKeysController {
        &self.api_keys
    }

    /// Create the entity described by `desired`
    pub fn create(
        &self,
        tracked: Option<&Record>,
        desired: &Desired,
        ctx: &ApplyContext<'_>,
    ) -> Result<Record> {
        match (tracked, desired) {
            (None | Some(Record::Cluster(_)), Desired::Cluster(spec)) => {
                let tracked = tracked.and_then(Record::as_cluster);
                self.clusters.create(tracked, spec, ctx).map(Record::Cluster)
            }
            (None | Some(Record::ApiKeys(_)), Desired::ApiKeys(spec)) => {
                let tracked = tracked.and_then(Record::as_api_keys);
                self.api_keys.create(tracked, spec, ctx).map(Record::ApiKeys)
            }
            (Some(record), _) => Err(mismatch(Verb::Create, record, desired.kind())),
        }
    }

    /// Refresh a tracked entity; `None` means it is gone
    pub fn read(&self, tracked: &Record, ctx: &ApplyContext<'_>) -> Result<Option<Record>> {
        match tracked {
            Record::Cluster(r) => Ok(self.clusters.read(r, ctx)?.map(Record::Cluster)),
            Record::ApiKeys(r) => Ok(self.api_keys.read(r, ctx)?.map(Record::ApiKeys)),
        }
    }

    /// Update a tracked entity towards `desired`
    pub fn update(
        &self,
        tracked: &Record,
        desired: &Desired,
        ctx: &ApplyContext<'_>,
    ) -> Result<Record> {
        match (tracked, desired) {
            (Record::Cluster(r), Desired::Cluster(spec)) => {
                self.clusters.update(r, spec, ctx).map(Record::Cluster)
            }
            (Record::ApiKeys(r), Desired::ApiKeys(spec)) => {
                self.api_keys.update(r, spec, ctx).map(Record::ApiKeys)
            }
            _ => Err(mismatch(Verb::Update, tracked, desired.kind())),
        }
    }

    /// Delete a tracked entity
    pub fn delete(&self, tracked: &Record, ctx: &ApplyContext<'_>) -> Result<()> {
        match tracked {
            Record::Cluster(r) => self.clusters.delete(r, ctx),
            Record::ApiKeys(r) => self.api_keys.delete(r, ctx),
        }
    }

    /// Start tracking an existing entity of `kind` by id
    pub fn import(
        &self,
        kind: ResourceKind,
        tracked: Option<&Record>,
        id: &str,
        ctx: &ApplyContext<'_>,
    ) -> Result<Record> {
        match kind {
            ResourceKind::Cluster => match tracked {
                None | Some(Record::Cluster(_)) => self
                    .clusters
                    .import(tracked.and_then(Record::as_cluster), id, ctx)
                    .map(Record::Cluster),
                Some(other) => Err(mismatch(Verb::Import, other, kind)),
            },
            ResourceKind::ClusterApiKeys => self.api_keys.import(id).map(Record::ApiKeys),
        }
    }

    /// Look a cluster up by id without tracking it
    pub fn lookup(&self, id: &str) -> Result<ClusterRecord> {
        self.lookup.get(id)
    }

    /// Read many clusters in parallel
    ///
    /// Results come back in input order. Each read is independent; one
    /// failure does not stop the others.
    pub fn refresh_all(
        &self,
        records: &[ClusterRecord],
        ctx: &ApplyContext<'_>,
        jobs: usize,
    ) -> Vec<Result<Option<ClusterRecord>>> {
        let read = |record: &ClusterRecord| self.clusters.read(record, ctx);

        if jobs <= 1 || records.len() <= 1 {
            return records.iter().map(read).collect();
        }

        match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
            Ok(pool) => pool.install(|| records.par_iter().map(read).collect()),
            Err(e) => {
                log::warn!("Failed to create thread pool, refreshing sequentially: {e}");
                records.iter().map(read).collect()
            }
        }
    }
}

fn mismatch(verb: Verb, tracked: &Record, wanted: ResourceKind) -> Error {
    let phase = match tracked {
        Record::Cluster(r) => r.phase,
        Record::ApiKeys(_) => Phase::Ready,
    };
    Error::precondition(
        verb,
        phase,
        format!("tracked entity is a {}, not a {wanted}", tracked.kind()),
    )
}
