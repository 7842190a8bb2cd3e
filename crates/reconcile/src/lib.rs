//! # Reconcile
//!
//! Reconciliation engine for hosted search clusters and their API keys.
//!
//! The engine takes a desired record and a verb, talks to the management
//! API through [`cloudapi::ManagementApi`], and hands back the record the
//! caller should persist. It keeps no state of its own.
//!
//! ## Core Concepts
//!
//! - **ClusterRecord**: desired half ([`ClusterSpec`]) + observed half
//!   ([`cloudapi::Cluster`]) + [`Phase`]
//! - **Lifecycle**: create/read/update/delete for one entity kind
//! - **Provider**: dispatches tagged [`Desired`]/[`Record`] values to the
//!   matching controller
//! - **diff**: pure functions for update planning and drift detection
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use reconcile::{ApplyContext, ClusterSpec, Desired, Provider, Record, WaitOptions, NoProgress};
//! use std::time::Duration;
//!
//! let provider = Provider::new(Arc::new(cloudapi::MockApi::new()));
//! let wait = WaitOptions { poll_interval: Duration::from_millis(1), ..WaitOptions::default() };
//! let ctx = ApplyContext::with_progress(wait, &NoProgress);
//!
//! let desired = Desired::Cluster(ClusterSpec::new("0.5_gb", "2_vcpus_1_hr_burst_per_day", "oregon"));
//! let record = provider.create(None, &desired, &ctx)?;
//! assert!(matches!(record, Record::Cluster(ref c) if c.is_ready()));
//! # Ok::<(), reconcile::Error>(())
//! ```
//!
//! ## Provider Traits
//!
//! - [`ProgressCallback`]: receives phase transitions and poll ticks
//! - [`RetryCallback`]: notified before a fetch is retried
//!
//! Hosts plug in their own UI through these; the engine only logs.

pub mod api_keys;
pub mod cluster;
pub mod context;
pub mod diff;
pub mod error;
pub mod lookup;
pub mod provider;
pub mod resource;
pub mod retry;
pub mod types;
pub mod wait;

// Re-export main types at crate root
pub use api_keys::ApiKeysController;
pub use cluster::ClusterController;
pub use context::{ApplyContext, CancelToken, NoProgress, ProgressCallback, WaitOptions};
pub use diff::{DiffSummary, FieldDiff, FieldDrift, UpdatePlan, classify, detect_drift, plan_update};
pub use error::{Error, ErrorCategory, Result};
pub use lookup::Lookup;
pub use provider::Provider;
pub use resource::Lifecycle;
pub use retry::{LogRetry, RetryCallback, RetryConfig, with_retry, with_retry_until};
pub use types::{
    ApiKeysRecord, ApiKeysSpec, ClusterRecord, ClusterSpec, Desired, Phase, Record, ResourceKind,
    Verb,
};
