//! # XMR Agent
//!
//! Runs an XMR client for one player channel, logs every command the CMS
//! pushes and reports connection status over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings (disabled unless XMR_URL is set)
//! xmr-agent
//!
//! # Run with custom config
//! xmr-agent --config /path/to/xmr.toml
//!
//! # Run with environment variables
//! XMR_CHANNEL=player-1 XMR_URL=ws://cms.example:9505 XMR_KEY=secret xmr-agent
//! ```

mod config;
mod metrics;
mod status;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use xmr_client::{EventKind, XmrClient, XmrEvent};
use xmr_transport::WebSocketConnector;

/// XMR push-channel agent.
#[derive(Parser, Debug)]
#[command(name = "xmr-agent", version, about = "XMR push-channel agent")]
struct Cli {
    /// Path to the TOML config file (default: search xmr.toml, /etc/xmr, ~/.config/xmr).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xmr=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load(cli.config.as_deref())?;

    info!("Starting XMR agent for channel {}", config.channel);

    // Initialize metrics
    if config.metrics.enabled {
        metrics::init_metrics();
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let connector = WebSocketConnector::new(config.websocket.to_transport_config());
    let client = Arc::new(XmrClient::spawn(
        config.channel.clone(),
        Arc::new(connector),
        config.client.clone(),
    ));

    let _subscriptions: Vec<_> = EventKind::ALL
        .iter()
        .map(|&kind| client.on(kind, log_event))
        .collect();

    client.start(config.url.clone(), config.key.clone()).await?;

    if config.status.enabled {
        let addr = config.status.bind_addr()?;
        let server = status::run_server(addr, client.clone());
        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!("Status endpoint failed: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {}
        }
    } else {
        tokio::signal::ctrl_c().await?;
    }

    info!("Shutting down");
    client.shutdown().await?;

    Ok(())
}

/// Log and count one client event.
fn log_event(event: &XmrEvent) {
    metrics::record_event(event);

    match event {
        XmrEvent::Error(message) => warn!(event = %event.kind(), "{}", message),
        XmrEvent::StatusChange(at) => info!(event = %event.kind(), at = %at, "Frame received"),
        XmrEvent::ShowStatusWindow(seconds) => {
            info!(event = %event.kind(), timeout_seconds = seconds, "Show status window");
        }
        XmrEvent::CriteriaUpdate(updates) => {
            info!(event = %event.kind(), count = updates.len(), "Criteria update");
            for update in updates {
                info!(
                    metric = %update.metric,
                    value = %update.value,
                    ttl = ?update.ttl.seconds(),
                    "Criterion"
                );
            }
        }
        _ => info!(event = %event.kind(), "XMR event"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_to_search() {
        let cli = Cli::parse_from(["xmr-agent"]);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_config_forms() {
        let cli = Cli::parse_from(["xmr-agent", "--config", "/etc/xmr/agent.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/xmr/agent.toml")));

        let cli = Cli::parse_from(["xmr-agent", "--config=/etc/xmr/agent.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/xmr/agent.toml")));
    }

    #[test]
    fn test_cli_rejects_unknown_flags() {
        assert!(Cli::try_parse_from(["xmr-agent", "--confg", "x.toml"]).is_err());
        assert!(Cli::try_parse_from(["xmr-agent", "--config"]).is_err());
    }
}
