//! Shared helpers for command handlers.

use std::path::Path;

use xsync_api::{TransportConfig, XrayClient};
use xsync_core::{CoreError, JsonStore, OpPolicy};

use crate::config::Config;
use crate::error::CliError;

/// Dial the Xray API and bind the client to `tags`.
pub async fn connect(cfg: &Config, tags: &[String]) -> Result<XrayClient, CliError> {
    let xray = cfg.xray_config();
    let transport = TransportConfig::with_timeout(xray.timeout);
    let client = XrayClient::connect(&xray.address, tags.to_vec(), &transport)
        .await
        .map_err(CoreError::from)?;
    Ok(client)
}

/// Open the state store named by `--store`, if any.
pub fn open_store(path: Option<&Path>) -> Result<Option<JsonStore>, CliError> {
    path.map(JsonStore::open).transpose().map_err(CliError::from)
}

/// Retry and idempotency settings for one-off calls.
pub fn op_policy(cfg: &Config) -> Result<OpPolicy, CliError> {
    let sync = cfg.sync_config()?;
    Ok(OpPolicy {
        retry: sync.retry,
        idempotency: sync.idempotency,
    })
}
