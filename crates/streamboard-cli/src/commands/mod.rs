//! CLI command implementations for `streamboard`.
//!
//! - [`run`] -- Demo plugin over stdin/stdout.
//! - [`form`] -- Form export.
//! - [`config_cmd`] -- Configuration display.

pub mod config_cmd;
pub mod form;
pub mod run;

use anyhow::Context;
use streamboard_types::SdkConfig;

/// Load configuration from `path`, or use defaults when no path is given.
pub async fn load_config(path: Option<&str>) -> anyhow::Result<SdkConfig> {
    match path {
        Some(path) => streamboard_sdk::load_config(path)
            .await
            .with_context(|| format!("failed to load config from {path}")),
        None => {
            tracing::debug!("no config file given, using defaults");
            Ok(SdkConfig::default())
        }
    }
}
