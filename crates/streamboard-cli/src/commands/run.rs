//! `streamboard run` -- demo plugin over stdin/stdout.
//!
//! Speaks one JSON envelope per line with the host. Every new context shows
//! its action name; releasing the key shows how long it was held. Settings
//! pushes are logged.
//!
//! The plugin exits when the host closes stdin, or on Ctrl+C after asking
//! the host to stop every context.

use std::time::Duration;

use clap::Args;
use tracing::{info, warn};

use streamboard_sdk::{Context, JsonLinesTransport, StreamBoard};

/// How long to wait for stop acknowledgements on Ctrl+C.
const STOP_GRACE: Duration = Duration::from_secs(5);

/// Arguments for `streamboard run`.
#[derive(Args)]
pub struct RunArgs {
    /// Config file path (.json or .toml).
    #[arg(short, long)]
    pub config: Option<String>,

    /// Skip the `ready` call on startup.
    #[arg(long)]
    pub no_ready: bool,
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = super::load_config(args.config.as_deref()).await?;
    let (transport, inbound) = JsonLinesTransport::stdio();
    let sdk = StreamBoard::with_config(transport.clone(), &config)?;

    sdk.on_context(None, attach_demo);
    sdk.on_settings(|settings| info!(?settings, "global settings updated"));

    let listener = sdk.listen(inbound);
    info!("plugin listening on stdin");

    let ready = (!args.no_ready).then(|| {
        let sdk = sdk.clone();
        tokio::spawn(async move {
            match sdk.ready().await {
                Ok(ack) => info!(ack, "host answered ready"),
                Err(e) => warn!(error = %e, "ready call failed"),
            }
        })
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, stopping contexts");
            match tokio::time::timeout(STOP_GRACE, sdk.stop()).await {
                Ok(stopped) => info!(stopped, "contexts stopped"),
                Err(_) => warn!("host did not acknowledge stop in time"),
            }
        }
        _ = listener => info!("host closed the channel"),
    }

    if let Some(ready) = ready {
        ready.abort();
    }
    transport.close().await;
    Ok(())
}

fn attach_demo(ctx: Context) {
    if let Err(e) = ctx.set_text(ctx.action()) {
        warn!(uuid = ctx.uuid(), error = %e, "setText failed");
    }

    let target = ctx.clone();
    ctx.on_press_up(move |event| {
        let text = format!("{}ms", event.press_duration_ms);
        if let Err(e) = target.set_text(&text) {
            warn!(uuid = target.uuid(), error = %e, "setText failed");
        }
    });

    let uuid = ctx.uuid().to_owned();
    ctx.on_settings(move |settings| info!(uuid = %uuid, ?settings, "context settings updated"));

    let uuid = ctx.uuid().to_owned();
    ctx.on_stop(move || info!(uuid = %uuid, "context released"));
}
