//! Analytics Bridge — replays recorded analytics messages through the mobile
//! SDK adapters.
//!
//! Reads newline-delimited JSON messages from a file (or stdin), dispatches
//! them through the registry and writes every resulting plugin call as a
//! structured log line. Useful for checking a configuration against captured
//! traffic without a device.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use bridge_core::{Analytics, BridgeConfig, Message};
use bridge_integrations::ga::LoggingGaTracker;
use bridge_integrations::quantcast::LoggingQuantcast;
use bridge_integrations::register_configured;
use clap::Parser;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "analytics-bridge")]
#[command(about = "Replay analytics messages through the mobile SDK adapters")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, env = "ANALYTICS_BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Newline-delimited JSON messages (reads stdin when omitted)
    #[arg(long)]
    events: Option<PathBuf>,

    /// Messages held per integration until it is ready (overrides config)
    #[arg(long)]
    queue_capacity: Option<usize>,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ReplayStats {
    dispatched: usize,
    skipped: usize,
}

/// Dispatch every message in `reader`, polling readiness after each one.
/// Blank lines are ignored; malformed lines are logged and counted.
fn replay(analytics: &mut Analytics, reader: impl BufRead) -> io::Result<ReplayStats> {
    let mut stats = ReplayStats::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match Message::from_json(&line) {
            Ok(message) => {
                analytics.dispatch(message);
                analytics.poll();
                stats.dispatched += 1;
            }
            Err(e) => {
                warn!(line = index + 1, error = %e, "skipping malformed message");
                stats.skipped += 1;
            }
        }
    }

    Ok(stats)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "analytics_bridge=info,bridge_core=info,bridge_integrations=info".into()
            }),
        )
        .json()
        .init();

    let cli = Cli::parse();

    let mut config =
        BridgeConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(capacity) = cli.queue_capacity {
        config.queue_capacity = capacity;
    }

    let mut analytics = Analytics::from_config(&config);
    let registered = register_configured(
        &mut analytics,
        &config,
        Arc::new(LoggingGaTracker),
        Arc::new(LoggingQuantcast),
    )
    .context("failed to register integrations")?;
    if registered.is_empty() {
        warn!("no integrations configured, messages will not be forwarded");
    }

    analytics.initialize();

    let stats = match &cli.events {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            replay(&mut analytics, BufReader::new(file))?
        }
        None => replay(&mut analytics, io::stdin().lock())?,
    };

    info!(
        dispatched = stats.dispatched,
        skipped = stats.skipped,
        ready = analytics.is_ready(),
        "replay finished"
    );

    Ok(())
}
