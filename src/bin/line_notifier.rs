use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};

use cix_line_notifier::api::CixClient;
use cix_line_notifier::config::Config;
use cix_line_notifier::notifier::WebhookNotifier;
use cix_line_notifier::poller::Poller;

#[derive(Parser)]
#[command(name = "line_notifier", about = "Publish CIX line changes to a chat webhook")]
struct Args {
    /// Path to the JSON config file
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Usage errors exit 1 like config errors; --help/--version still exit 0.
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            std::process::exit(1);
        }
        Err(e) => e.exit(),
    };

    let config = Config::load(&args.config)?;
    info!(
        "Loaded config from {} (game={} interval={}s)",
        args.config.display(),
        config.game_id,
        config.refresh_interval.as_secs(),
    );

    let client = CixClient::new(&config.host, config.apid.clone())?;
    let notifier = WebhookNotifier::new(
        config.webhook_url.clone(),
        config.host.clone(),
        config.game_id.clone(),
    )?;
    let mut poller = Poller::from_config(&config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = signal_tx.send(true);
            }
            Err(e) => warn!("Failed to listen for Ctrl+C: {e}"),
        }
    });

    info!("Entering polling loop. Press Ctrl+C to stop.");
    poller.run(&client, &notifier, shutdown_rx).await;
    drop(shutdown_tx);

    Ok(())
}
