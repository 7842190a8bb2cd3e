//! Lifecycle trait shared by every managed entity kind
//!
//! A controller maps the four verbs onto remote calls for one kind of
//! entity. Records go in and come out by value; the controller never keeps
//! state of its own, so the caller decides what gets persisted.

use crate::context::ApplyContext;
use crate::error::Result;
use crate::types::ResourceKind;

/// Core trait for managed entities
///
/// Implemented by [`ClusterController`](crate::ClusterController) and
/// [`ApiKeysController`](crate::ApiKeysController). Import is not part of
/// the contract, since each kind bootstraps (or refuses to) differently.
pub trait Lifecycle: Send + Sync {
    /// What the caller asks for
    type Desired;
    /// What the caller tracks
    type Record;

    /// Entity kind handled by this controller
    fn kind(&self) -> ResourceKind;

    /// Bring a new entity into existence
    ///
    /// `tracked` is the record the caller holds for this address, if any;
    /// creation is refused when it is still live.
    fn create(
        &self,
        tracked: Option<&Self::Record>,
        desired: &Self::Desired,
        ctx: &ApplyContext<'_>,
    ) -> Result<Self::Record>;

    /// Refresh a tracked record
    ///
    /// Returns `None` when the entity no longer exists and the caller
    /// should forget it.
    fn read(&self, tracked: &Self::Record, ctx: &ApplyContext<'_>) -> Result<Option<Self::Record>>;

    /// Move a tracked entity towards the desired configuration
    fn update(
        &self,
        tracked: &Self::Record,
        desired: &Self::Desired,
        ctx: &ApplyContext<'_>,
    ) -> Result<Self::Record>;

    /// Tear the entity down; the caller discards the record on success
    fn delete(&self, tracked: &Self::Record, ctx: &ApplyContext<'_>) -> Result<()>;
}
