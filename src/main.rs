//! # wicket
//!
//! Signaling server binary: loads settings, initializes logging and metrics,
//! and serves the pairing WebSocket until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use wicket_core::logging::{LogFormat, init_subscriber};
use wicket_server::config::ServerConfig;
use wicket_server::metrics::install_recorder;
use wicket_server::server::WicketServer;
use wicket_settings::WicketSettings;

/// Pairing and signaling relay server.
#[derive(Parser, Debug)]
#[command(name = "wicket", about = "Pairing and signaling relay server")]
struct Cli {
    /// Settings file (defaults to `~/.wicket/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Grace period for dropped pairings in milliseconds (overrides settings).
    #[arg(long)]
    grace_period_ms: Option<u64>,
}

impl Cli {
    fn load_settings(&self) -> Result<WicketSettings> {
        let mut settings = match &self.config {
            Some(path) => wicket_settings::load_settings_from_path(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => wicket_settings::load_settings().context("Failed to load settings")?,
        };
        self.apply(&mut settings);
        settings.validate().context("Invalid settings")?;
        Ok(settings)
    }

    fn apply(&self, settings: &mut WicketSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ms) = self.grace_period_ms {
            settings.server.grace_period_ms = ms;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.load_settings()?;

    init_subscriber(
        &settings.logging.level,
        LogFormat::from_json_flag(settings.logging.json),
    );

    let metrics = match install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "metrics disabled");
            None
        }
    };

    let server = WicketServer::new(ServerConfig::from(&settings.server), metrics);
    let (addr, handle) = server.listen().await.context("Failed to start server")?;
    info!(%addr, "wicket ready, ws endpoint at /ws");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("shutdown signal received");
    if !server.shutdown().drain(handle, None).await {
        warn!("exiting with sessions still open");
    }
    info!("wicket stopped");
    Ok(())
}
