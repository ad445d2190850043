//! Command-line options shared by the stockpile-dash binaries.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use stockpile_dash_core::Config;

/// Where to find the Stockpile server.
#[derive(Args, Debug, Clone, Default)]
pub struct ServerArgs {
    /// Server address (host or host:port), overrides the configuration file
    #[arg(short, long)]
    pub server: Option<String>,

    /// Socket.IO path on the server
    #[arg(long)]
    pub path: Option<String>,

    /// Configuration file (default: ~/.config/stockpile-dash/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Loads the configuration and applies command-line overrides.
pub fn load_config(args: &ServerArgs) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Config::load().context("failed to load configuration")?,
    };

    if let Some(server) = &args.server {
        config.server.address = server.clone();
    }
    if let Some(path) = &args.path {
        config.server.path = path.clone();
    }

    config
        .server
        .validate()
        .context("invalid server settings")?;

    Ok(config)
}
