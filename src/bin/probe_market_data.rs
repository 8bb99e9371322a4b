//! Probe: fetch the current market data once and print it.
//!
//! Uses the same config file as `line_notifier`. With `--team`, also dumps
//! that team's order book.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;

use cix_line_notifier::api::CixClient;
use cix_line_notifier::config::Config;
use cix_line_notifier::engine::is_cleared;

#[derive(Parser)]
#[command(name = "probe_market_data", about = "Dump current CIX market data")]
struct Args {
    /// Path to the JSON config file
    config: PathBuf,

    /// Also fetch the order book for this team
    #[arg(long)]
    team: Option<String>,

    /// Book depth to request with --team
    #[arg(long, requires = "team")]
    depth: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = Config::load(&args.config)?;
    let client = CixClient::new(&config.host, config.apid.clone())?;

    println!("=== Probe: market data ===");
    println!("Host: {}", config.host);
    println!();

    let start = Instant::now();
    let snapshot = client
        .all_market_data()
        .await
        .context("market_data call failed")?;
    println!("Latency: {:?}", start.elapsed());
    println!("Fetched at: {}", snapshot.fetched_at.to_rfc3339());
    println!("Teams: {}", snapshot.len());
    println!();

    let mut lines: Vec<_> = snapshot.iter().collect();
    lines.sort_by(|a, b| a.0.cmp(b.0));
    for (team, line) in lines {
        let status = if is_cleared(line) { "  (cleared)" } else { "" };
        println!(
            "  {team:<12} bid {:>4} @ {:.2}   ask {:>4} @ {:.2}{status}",
            line.bid_size, line.bid, line.ask_size, line.ask
        );
    }

    if let Some(team) = &args.team {
        println!();
        println!("--- Book: {team} ---");
        let book = client
            .get_book(team, args.depth)
            .await
            .context("get_book call failed")?;
        println!("{}", serde_json::to_string_pretty(&book)?);
    }

    Ok(())
}
