//! Cluster API key controller.
//!
//! Keys are issued once and never readable again, so everything after
//! create is local: read and update return the tracked record, delete just
//! forgets it.

use crate::context::ApplyContext;
use crate::error::{Error, Result};
use crate::resource::Lifecycle;
use crate::types::{ApiKeysRecord, ApiKeysSpec, Phase, ResourceKind, Verb};
use cloudapi::ManagementApi;
use std::sync::Arc;

/// Controller for [`ResourceKind::ClusterApiKeys`].
#[derive(Clone)]
pub struct ApiKeysController {
    api: Arc<dyn ManagementApi>,
}

impl ApiKeysController {
    pub fn new(api: Arc<dyn ManagementApi>) -> Self {
        Self { api }
    }

    /// Always refused: issued keys cannot be retrieved.
    pub fn import(&self, id: &str) -> Result<ApiKeysRecord> {
        Err(Error::precondition(
            Verb::Import,
            Phase::Unprovisioned,
            format!("API keys for cluster {id} cannot be retrieved after issuance"),
        ))
    }
}

impl Lifecycle for ApiKeysController {
    type Desired = ApiKeysSpec;
    type Record = ApiKeysRecord;

    fn kind(&self) -> ResourceKind {
        ResourceKind::ClusterApiKeys
    }

    fn create(
        &self,
        tracked: Option<&ApiKeysRecord>,
        desired: &ApiKeysSpec,
        ctx: &ApplyContext<'_>,
    ) -> Result<ApiKeysRecord> {
        if let Some(existing) = tracked {
            return Err(Error::precondition(
                Verb::Create,
                Phase::Ready,
                format!(
                    "keys for cluster {} are already tracked; destroy them to issue a new pair",
                    existing.cluster_id
                ),
            ));
        }

        let keys = self.api.issue_api_keys(&desired.cluster_id)?;
        let record = ApiKeysRecord::issued(&desired.cluster_id, keys);
        ctx.transition(&record.id, Phase::Unprovisioned, Phase::Ready);
        Ok(record)
    }

    fn read(&self, tracked: &ApiKeysRecord, _ctx: &ApplyContext<'_>) -> Result<Option<ApiKeysRecord>> {
        Ok(Some(tracked.clone()))
    }

    fn update(
        &self,
        tracked: &ApiKeysRecord,
        desired: &ApiKeysSpec,
        _ctx: &ApplyContext<'_>,
    ) -> Result<ApiKeysRecord> {
        if desired.cluster_id != tracked.cluster_id {
            log::warn!(
                "{}: keys cannot move to cluster {}; destroy and recreate them instead",
                tracked.id,
                desired.cluster_id
            );
        }
        Ok(tracked.clone())
    }

    fn delete(&self, tracked: &ApiKeysRecord, ctx: &ApplyContext<'_>) -> Result<()> {
        log::debug!("{}: forgetting keys; they stay valid remotely", tracked.id);
        ctx.transition(&tracked.id, Phase::Ready, Phase::Gone);
        Ok(())
    }
}
