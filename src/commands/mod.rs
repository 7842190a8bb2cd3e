pub mod cluster;
pub mod plan;
pub mod state;

use anyhow::Result;
use cloudapi::CloudClient;
use reconcile::Provider;
use std::sync::Arc;

use crate::config::Settings;

/// Build a provider talking to the configured management API
pub fn provider(settings: &Settings) -> Result<Provider> {
    let key = settings.resolve_key()?;
    let client = CloudClient::with_api_base(key, settings.api_base());
    log::debug!("Management API at {}", client.api_base());
    Ok(Provider::with_retry(
        Arc::new(client),
        settings.retry_config(),
    ))
}
