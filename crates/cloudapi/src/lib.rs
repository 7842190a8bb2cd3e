//! # cloudapi
//!
//! Client for the hosted search-cluster management API.
//!
//! This crate maps the five remote capabilities to typed calls:
//! - Create, fetch, patch and terminate a cluster
//! - Issue a cluster's one-time API key pair
//!
//! It owns request shaping and response decoding, and surfaces every
//! failure as an [`Error`] with a category callers can act on. It does not
//! poll, retry, or keep state; that belongs to the caller.
//!
//! ## Example
//!
//! ```no_run
//! use cloudapi::{CloudClient, CreateClusterRequest, ManagementApi};
//!
//! let client = CloudClient::new("my-management-key");
//!
//! let mut request = CreateClusterRequest::new("0.5_gb", "2_vcpus_1_hr_burst_per_day", "oregon");
//! request.name = Some("prod-search".to_string());
//!
//! let cluster = client.create_cluster(&request).expect("create failed");
//! println!("requested {} ({})", cluster.id, cluster.status);
//! ```
//!
//! ## Endpoints
//!
//! | Call                | Method | Path                          |
//! |---------------------|--------|-------------------------------|
//! | `fetch_cluster`     | GET    | `/clusters/{id}`              |
//! | `create_cluster`    | POST   | `/clusters`                   |
//! | `patch_cluster`     | PATCH  | `/clusters/{id}`              |
//! | `terminate_cluster` | POST   | `/clusters/{id}/lifecycle`    |
//! | `issue_api_keys`    | POST   | `/clusters/{id}/api-keys`     |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod types;

pub use backend::http::{CloudClient, DEFAULT_API_BASE};
pub use backend::{Call, ManagementApi, MockApi};
pub use error::{Error, ErrorCategory, Result};
pub use types::{
    ApiKeys, Cluster, ClusterPatch, CreateClusterRequest, Hostnames, Operation, READY_STATUS,
    Secret,
};
