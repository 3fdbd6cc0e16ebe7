// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! SmartTrash: which bin does this go in?
//!
//! Command-line front end. Each `analyze` run is one session: select the
//! photo, analyze it, print the result, reset.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use smarttrash::client::ClassificationClient;
use smarttrash::config::AppConfig;
use smarttrash::image_source::PickedFile;
use smarttrash::{AnalysisResult, Result, SessionController};

/// SmartTrash CLI - classify a photo of a waste item
#[derive(Parser, Debug)]
#[command(name = "smarttrash")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Photograph a waste item and find out which bin it belongs in", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Classification endpoint (overrides config)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for results
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify a photo
    Analyze {
        /// Image file to upload
        image: PathBuf,

        /// Upload the original bytes without compressing
        #[arg(long)]
        no_compress: bool,
    },

    /// Check that the classification service is reachable
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let mut config = AppConfig::load(&cli.config)?;
    if let Some(endpoint) = cli.endpoint {
        config.classifier.endpoint = endpoint;
        config.validate()?;
    }

    match cli.command {
        Commands::Analyze { image, no_compress } => {
            if no_compress {
                config.compression.enabled = false;
            }
            run_analyze(config, &image, &cli.format).await
        }
        Commands::Status => run_status(config).await,
        Commands::Config { action } => run_config_command(config, action, &cli.config),
    }
}

/// Run one select/analyze/reset session for a file
async fn run_analyze(config: AppConfig, image: &Path, format: &str) -> Result<()> {
    let session = SessionController::from_config(&config)?;
    info!("Classifier: {}", config.classifier.endpoint);

    let picked = PickedFile::from_path(image)?;
    session.select_image(Some(picked))?;

    let result = session.analyze().await?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&session.view())?),
        _ => print!("{}", render_text(&result)),
    }

    if result.is_failure() {
        warn!("Analysis did not produce a bin recommendation");
    }

    session.reset()?;
    Ok(())
}

/// Plain-text rendering of a result card
fn render_text(result: &AnalysisResult) -> String {
    let mut out = String::new();

    match result {
        AnalysisResult::Success {
            bin_label,
            bin_color,
            tip,
            confidence_percent_text,
            ..
        } => {
            out.push_str(&format!("✔ {}\n", result.headline()));
            out.push_str(&format!("  AI confidence: {}\n", confidence_percent_text));
            out.push_str(&format!("  Put it in the bin: {} ({})\n", bin_label, bin_color));
            out.push_str(&format!("  Tip: {}\n", tip));
        }
        AnalysisResult::LowConfidence {
            material,
            confidence_percent_text,
            guidance_tips,
        } => {
            out.push_str(&format!("? {}\n", result.headline()));
            out.push_str(&format!(
                "  I found {}, but confidence is only {}.\n",
                material, confidence_percent_text
            ));
            out.push_str("  Tips for a better photo:\n");
            for tip in guidance_tips {
                out.push_str(&format!("   - {}\n", tip));
            }
        }
        AnalysisResult::Failure { display_message, .. } => {
            out.push_str(&format!("✖ {}\n", result.headline()));
            out.push_str(&format!("  {}\n", display_message));
        }
    }

    out.push_str(&format!("  [{}]\n", result.recovery_action().label()));
    out
}

/// Run status check
async fn run_status(config: AppConfig) -> Result<()> {
    let client = ClassificationClient::new(&config.classifier.endpoint)?;

    println!("SmartTrash v{} Status", env!("CARGO_PKG_VERSION"));
    println!("======================");

    match client.health_check().await {
        Ok(()) => println!("Classifier: Running ({})", client.endpoint()),
        Err(e) => println!("Classifier: Error - {}", e),
    }

    println!("\nCompression:");
    println!("  Enabled: {}", config.compression.enabled);
    println!("  Max size: {} bytes", config.compression.max_size_bytes);
    println!("  Max dimension: {} px", config.compression.max_dimension_pixels);

    Ok(())
}

/// Run config commands
fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("Configuration at {:?} is valid", config_path);
            println!("  Endpoint: {}", config.classifier.endpoint);
            println!("  Compression: {}", config.compression.enabled);
        }
    }

    Ok(())
}
