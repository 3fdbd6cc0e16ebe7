// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! SmartTrash mock classifier
//!
//! Standalone stand-in for the classification service, for local development.

use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use smarttrash::config::AppConfig;
use smarttrash::Result;

#[derive(Parser, Debug)]
#[command(name = "smarttrash-mock")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Local mock of the SmartTrash classification service")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Host to bind to
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Confidence to report for accepted uploads (0.0-1.0)
    #[arg(long)]
    confidence: Option<f64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("SmartTrash mock classifier v{}", env!("CARGO_PKG_VERSION"));

    let mut config = AppConfig::load(&args.config)?;

    // Apply CLI overrides
    if let Some(host) = args.host {
        config.mock.host = host;
    }
    if let Some(port) = args.port {
        config.mock.port = port;
    }
    if let Some(confidence) = args.confidence {
        config.mock.confidence = confidence;
    }

    smarttrash::mock_service::start_server(config.mock).await
}
