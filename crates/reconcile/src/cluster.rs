//! Cluster lifecycle controller.
//!
//! Create blocks until the remote reports the cluster in service. Update
//! only ever sends the always-mutable fields. Delete treats a cluster that
//! is already gone as success.

use crate::context::ApplyContext;
use crate::diff::plan_update;
use crate::error::{Error, Result};
use crate::resource::Lifecycle;
use crate::retry::{LogRetry, RetryConfig, with_retry, with_retry_until};
use crate::types::{ClusterRecord, ClusterSpec, Phase, ResourceKind, Verb};
use crate::wait::{WaitFailure, until_ready};
use cloudapi::{Cluster, ManagementApi};
use std::sync::Arc;
use std::time::Instant;

/// Controller for [`ResourceKind::Cluster`].
#[derive(Clone)]
pub struct ClusterController {
    api: Arc<dyn ManagementApi>,
    retry: RetryConfig,
}

impl ClusterController {
    pub fn new(api: Arc<dyn ManagementApi>) -> Self {
        Self::with_retry(api, RetryConfig::default())
    }

    /// Use a custom retry policy for fetches.
    pub fn with_retry(api: Arc<dyn ManagementApi>, retry: RetryConfig) -> Self {
        Self { api, retry }
    }

    fn fetch(&self, id: &str) -> cloudapi::Result<Cluster> {
        let what = format!("fetch of {id}");
        with_retry(&self.retry, Some(&LogRetry { what: &what }), || {
            self.api.fetch_cluster(id)
        })
    }

    /// Fetch while provisioning: retries stop at cancel or the deadline.
    fn poll(
        &self,
        id: &str,
        ctx: &ApplyContext<'_>,
        deadline: Option<Instant>,
    ) -> cloudapi::Result<Cluster> {
        let what = format!("poll of {id}");
        let stop = || ctx.cancel.is_cancelled() || deadline.is_some_and(|d| Instant::now() >= d);
        with_retry_until(&self.retry, Some(&LogRetry { what: &what }), stop, || {
            self.api.fetch_cluster(id)
        })
    }

    /// Start tracking a cluster that already exists remotely.
    ///
    /// The desired half is derived from what the remote reports.
    pub fn import(
        &self,
        tracked: Option<&ClusterRecord>,
        id: &str,
        ctx: &ApplyContext<'_>,
    ) -> Result<ClusterRecord> {
        let phase = tracked.map_or(Phase::Unprovisioned, |r| r.phase);
        if !phase.allows(Verb::Import) {
            return Err(Error::precondition(
                Verb::Import,
                phase,
                format!("already tracking cluster {}", tracked.map_or(id, |r| r.id.as_str())),
            ));
        }

        let record = ClusterRecord::bootstrap(self.fetch(id)?);
        if record.observed.regions.len() > 1 {
            log::warn!(
                "{id}: remote reports {} regions; tracking only {}",
                record.observed.regions.len(),
                record.spec.region
            );
        }
        ctx.transition(id, phase, record.phase);
        Ok(record)
    }

    fn wait_failed(pending: &ClusterRecord, failure: WaitFailure, ctx: &ApplyContext<'_>) -> Error {
        let id = pending.id.clone();
        let record = Box::new(pending.with_phase(Phase::Error));
        ctx.transition(&id, pending.phase, Phase::Error);

        match failure {
            WaitFailure::Fetch(source) => Error::Provisioning { id, record, source },
            WaitFailure::Timeout {
                waited,
                last_status,
            } => Error::ProvisioningTimeout {
                id,
                waited,
                last_status,
                record,
            },
            WaitFailure::Cancelled { last_status } => Error::Cancelled {
                id,
                last_status,
                record,
            },
        }
    }
}

impl Lifecycle for ClusterController {
    type Desired = ClusterSpec;
    type Record = ClusterRecord;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Cluster
    }

    fn create(
        &self,
        tracked: Option<&ClusterRecord>,
        desired: &ClusterSpec,
        ctx: &ApplyContext<'_>,
    ) -> Result<ClusterRecord> {
        let phase = tracked.map_or(Phase::Unprovisioned, |r| r.phase);
        if !phase.allows(Verb::Create) {
            return Err(Error::precondition(
                Verb::Create,
                phase,
                "cluster is already tracked",
            ));
        }

        let created = self.api.create_cluster(&desired.create_request())?;
        if created.id.is_empty() {
            return Err(cloudapi::Error::Decode("create response has no cluster id".to_string()).into());
        }
        log::debug!("{}: created with status {}", created.id, created.status);

        let pending = ClusterRecord {
            id: created.id.clone(),
            phase: Phase::Provisioning,
            spec: desired.clone(),
            observed: created,
        };
        ctx.transition(&pending.id, phase, Phase::Provisioning);

        let deadline = Instant::now().checked_add(ctx.wait.max_wait);
        let ready = until_ready(&pending.id, &pending.observed.status, ctx, || {
            self.poll(&pending.id, ctx, deadline)
        })
        .map_err(|failure| Self::wait_failed(&pending, failure, ctx))?;

        let record = pending.refresh(ready);
        ctx.transition(&record.id, Phase::Provisioning, record.phase);
        Ok(record)
    }

    fn read(&self, tracked: &ClusterRecord, ctx: &ApplyContext<'_>) -> Result<Option<ClusterRecord>> {
        if !tracked.phase.allows(Verb::Read) {
            return Err(Error::precondition(
                Verb::Read,
                tracked.phase,
                "nothing to read",
            ));
        }

        match self.fetch(&tracked.id) {
            Ok(observed) => {
                let record = tracked.refresh(observed);
                ctx.transition(&record.id, tracked.phase, record.phase);
                Ok(Some(record))
            }
            Err(e) if e.is_not_found() => {
                log::warn!("{}: cluster no longer exists remotely", tracked.id);
                ctx.transition(&tracked.id, tracked.phase, Phase::Gone);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn update(
        &self,
        tracked: &ClusterRecord,
        desired: &ClusterSpec,
        ctx: &ApplyContext<'_>,
    ) -> Result<ClusterRecord> {
        if !tracked.phase.allows(Verb::Update) {
            return Err(Error::precondition(
                Verb::Update,
                tracked.phase,
                "cluster is not ready",
            ));
        }

        let plan = plan_update(&tracked.spec, desired);
        for field in &plan.ignored {
            log::warn!(
                "{}: {field} can only be set at creation; ignoring the change",
                tracked.id
            );
        }

        let id = tracked.id.as_str();
        ctx.transition(id, tracked.phase, Phase::Updating);

        let outcome = self
            .api
            .patch_cluster(id, &plan.patch)
            .and_then(|()| self.fetch(id));

        match outcome {
            Ok(observed) => {
                let record = ClusterRecord {
                    id: tracked.id.clone(),
                    phase: Phase::from_status(&observed.status),
                    spec: plan.next,
                    observed,
                };
                ctx.transition(id, Phase::Updating, record.phase);
                Ok(record)
            }
            Err(source) => {
                ctx.transition(id, Phase::Updating, Phase::Error);
                Err(Error::UpdateFailed {
                    id: tracked.id.clone(),
                    record: Box::new(tracked.with_phase(Phase::Error)),
                    source,
                })
            }
        }
    }

    fn delete(&self, tracked: &ClusterRecord, ctx: &ApplyContext<'_>) -> Result<()> {
        if !tracked.phase.allows(Verb::Delete) {
            return Err(Error::precondition(
                Verb::Delete,
                tracked.phase,
                "wait for the cluster to settle, then refresh",
            ));
        }

        let id = tracked.id.as_str();
        ctx.transition(id, tracked.phase, Phase::Terminating);

        match self.api.terminate_cluster(id) {
            Ok(()) => {}
            Err(e) if e.is_not_found() => log::debug!("{id}: already gone"),
            Err(e) => {
                ctx.transition(id, Phase::Terminating, Phase::Error);
                return Err(e.into());
            }
        }

        ctx.transition(id, Phase::Terminating, Phase::Gone);
        Ok(())
    }
}
