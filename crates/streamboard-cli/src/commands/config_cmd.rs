//! `streamboard config` -- display resolved configuration.
//!
//! ```text
//! streamboard config show --config plugin.toml
//! ```

use streamboard_types::SdkConfig;

/// Print the resolved configuration as formatted JSON.
pub fn config_show(config: &SdkConfig) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_show_default() {
        config_show(&SdkConfig::default()).unwrap();
    }
}
