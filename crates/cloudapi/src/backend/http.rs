//! HTTPS client for the hosted management API.
//!
//! Responses are read as text first and decoded by pure functions, so the
//! error mapping can be tested without a server:
//!
//! - HTTP 404 is `NotFound`.
//! - Other non-2xx statuses become `Transport` carrying the status and the
//!   raw body, unless the body is an envelope with `success = false`. The
//!   status decides the category: 401/403 is a refused key, other 4xx a
//!   rejected request, 5xx a retryable network failure.
//! - Mutating calls require `success = true` in the envelope, otherwise the
//!   call is `RemoteRejected` with the raw body kept verbatim.

use crate::backend::ManagementApi;
use crate::error::{Error, Result};
use crate::types::{ApiKeys, Cluster, ClusterPatch, CreateClusterRequest, Operation, Secret};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// Default API base URL.
pub const DEFAULT_API_BASE: &str = "https://cloud.typesense.org/api/v1";

/// Header carrying the management key.
pub const KEY_HEADER: &str = "X-TYPESENSE-CLOUD-MANAGEMENT-API-KEY";

/// Upper bound for a single request, connect to last byte.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Management API client over HTTPS.
///
/// # Example
///
/// ```no_run
/// use cloudapi::{CloudClient, ManagementApi};
///
/// let client = CloudClient::new("my-management-key");
/// let cluster = client.fetch_cluster("abc123").unwrap();
/// println!("{} is {}", cluster.id, cluster.status);
/// ```
pub struct CloudClient {
    agent: ureq::Agent,
    api_base: String,
    key: Secret,
}

impl CloudClient {
    /// Create a client against the default API base.
    pub fn new(key: impl Into<String>) -> Self {
        Self::with_api_base(key, DEFAULT_API_BASE)
    }

    /// Create a client with a custom API base (for testing or staging).
    pub fn with_api_base(key: impl Into<String>, api_base: impl Into<String>) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            key: Secret::new(key),
        }
    }

    /// Get the current API base URL.
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn clusters_url(&self) -> String {
        format!("{}/clusters", self.api_base)
    }

    fn cluster_url(&self, id: &str) -> String {
        format!("{}/clusters/{id}", self.api_base)
    }

    fn lifecycle_url(&self, id: &str) -> String {
        format!("{}/clusters/{id}/lifecycle", self.api_base)
    }

    fn api_keys_url(&self, id: &str) -> String {
        format!("{}/clusters/{id}/api-keys", self.api_base)
    }

    fn read_reply(mut response: ureq::http::Response<ureq::Body>) -> Result<Reply> {
        let status = response.status().as_u16();
        let body = response.body_mut().read_to_string()?;
        Ok(Reply { status, body })
    }
}

impl ManagementApi for CloudClient {
    fn fetch_cluster(&self, id: &str) -> Result<Cluster> {
        let url = self.cluster_url(id);
        log::debug!("GET {url}");

        let response = self
            .agent
            .get(&url)
            .header("Accept", "application/json")
            .header(KEY_HEADER, self.key.expose())
            .call()?;

        decode_cluster(id, &Self::read_reply(response)?)
    }

    fn create_cluster(&self, request: &CreateClusterRequest) -> Result<Cluster> {
        let url = self.clusters_url();
        log::debug!("POST {url} (memory={}, vcpu={})", request.memory, request.vcpu);

        let response = self
            .agent
            .post(&url)
            .header("Accept", "application/json")
            .header(KEY_HEADER, self.key.expose())
            .send_json(request)?;

        decode_envelope(Operation::CreateCluster, None, &Self::read_reply(response)?, "cluster")
    }

    fn patch_cluster(&self, id: &str, patch: &ClusterPatch) -> Result<()> {
        let url = self.cluster_url(id);
        log::debug!("PATCH {url}");

        let response = self
            .agent
            .patch(&url)
            .header("Accept", "application/json")
            .header(KEY_HEADER, self.key.expose())
            .send_json(patch)?;

        decode_ack(Operation::PatchCluster, id, &Self::read_reply(response)?)
    }

    fn terminate_cluster(&self, id: &str) -> Result<()> {
        let url = self.lifecycle_url(id);
        log::debug!("POST {url} (terminate)");

        let response = self
            .agent
            .post(&url)
            .header("Accept", "application/json")
            .header(KEY_HEADER, self.key.expose())
            .send_json(serde_json::json!({ "lifecycle_action": "terminate" }))?;

        decode_ack(Operation::TerminateCluster, id, &Self::read_reply(response)?)
    }

    fn issue_api_keys(&self, cluster_id: &str) -> Result<ApiKeys> {
        let url = self.api_keys_url(cluster_id);
        log::debug!("POST {url}");

        let response = self
            .agent
            .post(&url)
            .header("Accept", "application/json")
            .header(KEY_HEADER, self.key.expose())
            .send_empty()?;

        decode_envelope(
            Operation::IssueApiKeys,
            Some(cluster_id),
            &Self::read_reply(response)?,
            "api_keys",
        )
    }
}

// =============================================================================
// Response decoding
// =============================================================================

/// Status and body of a response, read before any decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Reply {
    status: u16,
    body: String,
}

impl Reply {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Map statuses that never carry a usable payload.
fn check_status(id: Option<&str>, reply: &Reply) -> Result<()> {
    if reply.status == 404 {
        return Err(Error::not_found(id.unwrap_or_default()));
    }
    if reply.is_success() {
        return Ok(());
    }
    // A failing status with a rejection envelope is handled by the caller.
    match serde_json::from_str::<Value>(&reply.body) {
        Ok(Value::Object(map)) if map.contains_key("success") => Ok(()),
        _ => Err(Error::transport(reply.body.clone(), Some(reply.status))),
    }
}

/// Decode `GET /clusters/{id}`, which returns the cluster unwrapped.
fn decode_cluster(id: &str, reply: &Reply) -> Result<Cluster> {
    check_status(Some(id), reply)?;
    if !reply.is_success() {
        return Err(Error::transport(reply.body.clone(), Some(reply.status)));
    }
    Ok(serde_json::from_str(&reply.body)?)
}

/// Parse a `{ "success": bool, ... }` envelope and check the flag.
fn accepted_envelope(operation: Operation, id: Option<&str>, reply: &Reply) -> Result<Value> {
    check_status(id, reply)?;
    let envelope: Value = serde_json::from_str(&reply.body)?;
    match envelope.get("success").and_then(Value::as_bool) {
        Some(true) if reply.is_success() => Ok(envelope),
        _ => Err(Error::RemoteRejected {
            operation,
            body: reply.body.clone(),
        }),
    }
}

fn decode_envelope<T: DeserializeOwned>(
    operation: Operation,
    id: Option<&str>,
    reply: &Reply,
    payload_key: &str,
) -> Result<T> {
    let mut envelope = accepted_envelope(operation, id, reply)?;
    let payload = envelope
        .get_mut(payload_key)
        .map(Value::take)
        .ok_or_else(|| Error::Decode(format!("{operation} response has no `{payload_key}`")))?;
    Ok(serde_json::from_value(payload)?)
}

fn decode_ack(operation: Operation, id: &str, reply: &Reply) -> Result<()> {
    accepted_envelope(operation, Some(id), reply).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    fn reply(status: u16, body: &str) -> Reply {
        Reply {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_urls() {
        let client = CloudClient::with_api_base("k", "http://localhost:8080/api/v1/");
        assert_eq!(client.api_base(), "http://localhost:8080/api/v1");
        assert_eq!(client.clusters_url(), "http://localhost:8080/api/v1/clusters");
        assert_eq!(client.cluster_url("c1"), "http://localhost:8080/api/v1/clusters/c1");
        assert_eq!(
            client.lifecycle_url("c1"),
            "http://localhost:8080/api/v1/clusters/c1/lifecycle"
        );
        assert_eq!(
            client.api_keys_url("c1"),
            "http://localhost:8080/api/v1/clusters/c1/api-keys"
        );
        assert_eq!(CloudClient::new("k").api_base(), DEFAULT_API_BASE);
    }

    #[test]
    fn test_decode_cluster_unwrapped() {
        let cluster = decode_cluster("c1", &reply(200, r#"{"id":"c1","status":"in_service"}"#)).unwrap();
        assert!(cluster.is_ready());
    }

    #[test]
    fn test_decode_cluster_not_found() {
        let err = decode_cluster("c1", &reply(404, r#"{"message":"Not Found"}"#)).unwrap_err();
        assert_eq!(err, Error::not_found("c1"));
    }

    #[test]
    fn test_decode_cluster_server_error_keeps_body() {
        let err = decode_cluster("c1", &reply(502, "<html>Bad Gateway</html>")).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.detail(), Some("<html>Bad Gateway</html>"));
    }

    #[test]
    fn test_decode_cluster_bad_key_is_not_retried() {
        let body = r#"{"message":"Forbidden - a valid `x-typesense-cloud-management-api-key` header must be sent."}"#;
        let err = decode_cluster("c1", &reply(401, body)).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Unauthorized);
        assert!(!err.is_retryable());
        assert_eq!(err.detail(), Some(body));
    }

    #[test]
    fn test_decode_cluster_bad_json() {
        let err = decode_cluster("c1", &reply(200, "not json")).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_create_success() {
        let body = r#"{"success":true,"cluster":{"id":"new1","status":"provisioning","regions":["oregon"]}}"#;
        let cluster: Cluster =
            decode_envelope(Operation::CreateCluster, None, &reply(201, body), "cluster").unwrap();
        assert_eq!(cluster.id, "new1");
        assert_eq!(cluster.status, "provisioning");
    }

    #[test]
    fn test_success_false_is_rejected_even_on_2xx() {
        let body = r#"{"success":false,"message":"Invalid vcpu"}"#;
        let err = decode_envelope::<Cluster>(Operation::CreateCluster, None, &reply(200, body), "cluster")
            .unwrap_err();
        assert_eq!(
            err,
            Error::RemoteRejected {
                operation: Operation::CreateCluster,
                body: body.to_string(),
            }
        );
    }

    #[test]
    fn test_missing_success_flag_is_rejected() {
        let body = r#"{"cluster":{"id":"x"}}"#;
        let err = decode_envelope::<Cluster>(Operation::CreateCluster, None, &reply(200, body), "cluster")
            .unwrap_err();
        assert!(matches!(err, Error::RemoteRejected { .. }));
    }

    #[test]
    fn test_rejection_envelope_on_4xx() {
        let body = r#"{"success":false,"message":"quota exceeded"}"#;
        let err = decode_ack(Operation::PatchCluster, "c1", &reply(422, body)).unwrap_err();
        assert_eq!(err.detail(), Some(body));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_missing_payload_is_decode_error() {
        let err = decode_envelope::<ApiKeys>(
            Operation::IssueApiKeys,
            Some("c1"),
            &reply(200, r#"{"success":true}"#),
            "api_keys",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Decode(msg) if msg.contains("api_keys")));
    }

    #[test]
    fn test_issue_keys_success() {
        let body = r#"{"success":true,"api_keys":{"admin_key":"A","search_only_key":"S"}}"#;
        let keys: ApiKeys =
            decode_envelope(Operation::IssueApiKeys, Some("c1"), &reply(201, body), "api_keys").unwrap();
        assert_eq!(keys.admin_key.expose(), "A");
        assert_eq!(keys.search_only_key.expose(), "S");
    }

    #[test]
    fn test_terminate_not_found() {
        let err = decode_ack(Operation::TerminateCluster, "gone", &reply(404, "")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_ack_success() {
        assert!(decode_ack(Operation::TerminateCluster, "c1", &reply(200, r#"{"success":true}"#)).is_ok());
    }
}
