//! `streamboard form` -- export a configuration form.
//!
//! Builds the global settings form, or the form contexts of one action are
//! created with, from the configuration file and prints the export the host
//! would receive.
//!
//! ```text
//! streamboard form --config plugin.toml
//! streamboard form --config plugin.toml --action counter
//! ```

use anyhow::bail;
use clap::Args;
use serde_json::Value;

use streamboard_sdk::ConfigForm;
use streamboard_types::SdkConfig;

/// Arguments for `streamboard form`.
#[derive(Args)]
pub struct FormArgs {
    /// Config file path (.json or .toml).
    #[arg(short, long)]
    pub config: Option<String>,

    /// Export this action's form instead of the global one.
    #[arg(short, long)]
    pub action: Option<String>,
}

pub async fn run(args: FormArgs) -> anyhow::Result<()> {
    let config = super::load_config(args.config.as_deref()).await?;
    let exported = export_form(&config, args.action.as_deref()).await?;
    println!("{}", serde_json::to_string_pretty(&exported)?);
    Ok(())
}

/// Export the global form, or the form of `action`.
pub async fn export_form(config: &SdkConfig, action: Option<&str>) -> anyhow::Result<Value> {
    let defs = match action {
        None => &config.forms.global,
        Some(action) => match config.forms.actions.get(action) {
            Some(defs) => defs,
            None => {
                let known: Vec<&str> = config.forms.actions.keys().map(String::as_str).collect();
                bail!(
                    "no form for action '{action}' (configured: {})",
                    if known.is_empty() {
                        "none".to_owned()
                    } else {
                        known.join(", ")
                    }
                );
            }
        },
    };
    let form = ConfigForm::from_defs(defs.iter().cloned()).get_form();
    Ok(form.export_value().await)
}
