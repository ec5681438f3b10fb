//! `streamboard` -- CLI binary for StreamBoard plugins.
//!
//! Provides the following subcommands:
//!
//! - `streamboard run` -- Run a demo plugin speaking JSON lines on stdin/stdout.
//! - `streamboard form` -- Print the exported global or per-action form.
//! - `streamboard config` -- Show the resolved SDK configuration.

use clap::{Parser, Subcommand};

mod commands;

/// StreamBoard plugin CLI.
#[derive(Parser)]
#[command(name = "streamboard", about = "StreamBoard plugin CLI", version)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Run the demo plugin over stdin/stdout.
    Run(commands::run::RunArgs),

    /// Print an exported configuration form as JSON.
    Form(commands::form::FormArgs),

    /// Show resolved configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCmd,
    },
}

/// Subcommands for `streamboard config`.
#[derive(Subcommand)]
enum ConfigCmd {
    /// Show the full resolved configuration.
    Show {
        /// Config file path (.json or .toml).
        #[arg(short, long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries the plugin channel; logs go to stderr.
    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    match cli.command {
        Commands::Run(args) => commands::run::run(args).await?,
        Commands::Form(args) => commands::form::run(args).await?,
        Commands::Config { action } => match action {
            ConfigCmd::Show { config } => {
                let cfg = commands::load_config(config.as_deref()).await?;
                commands::config_cmd::config_show(&cfg)?;
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_form_with_action() {
        let cli = Cli::try_parse_from([
            "streamboard",
            "form",
            "--config",
            "plugin.toml",
            "--action",
            "counter",
        ])
        .unwrap();
        match cli.command {
            Commands::Form(args) => {
                assert_eq!(args.config.as_deref(), Some("plugin.toml"));
                assert_eq!(args.action.as_deref(), Some("counter"));
            }
            _ => panic!("expected form subcommand"),
        }
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::try_parse_from(["streamboard", "run", "-v"]).unwrap();
        assert!(cli.verbose);
    }
}
