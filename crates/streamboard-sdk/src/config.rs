//! Configuration file loading.
//!
//! The format follows the file extension: `.json` or `.toml`.

use std::path::Path;

use tracing::debug;

use streamboard_types::SdkConfig;

use crate::error::{Result, SdkError};

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    /// Pick the format from a path's extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::Json),
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(Self::Toml),
            _ => Err(SdkError::Config(format!(
                "unsupported config file {}: expected .json or .toml",
                path.display()
            ))),
        }
    }
}

/// Parse configuration text in the given format.
pub fn parse_config(contents: &str, format: ConfigFormat) -> Result<SdkConfig> {
    let config = match format {
        ConfigFormat::Json => serde_json::from_str(contents)?,
        ConfigFormat::Toml => toml::from_str(contents)?,
    };
    Ok(config)
}

/// Read and parse a configuration file.
pub async fn load_config(path: impl AsRef<Path>) -> Result<SdkConfig> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)?;
    debug!(path = %path.display(), ?format, "loading config file");
    let contents = tokio::fs::read_to_string(path).await?;
    parse_config(&contents, format)
}
