//! lumen: operator CLI for the studio client core
//!
//! Derives invoice totals offline, and against the hosted platform prints the
//! project board, moves projects and approves estimates.

mod commands;

use std::path::Path;

use clap::Parser;
use tracing::{error, info};

use commands::{Commands, Credentials};
use lumen_sdk::LumenConfig;

#[derive(Parser)]
#[command(name = "lumen")]
#[command(about = "Operator CLI for the Lumen studio client core")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "LUMEN_CONFIG", default_value = "lumen.toml")]
    config: String,

    /// Hosted platform URL (overrides config file)
    #[arg(long, env = "LUMEN_BASE_URL")]
    base_url: Option<String>,

    /// Public API key (overrides config file)
    #[arg(long, env = "LUMEN_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Account to sign in with when auth is live
    #[arg(long, env = "LUMEN_EMAIL")]
    email: Option<String>,

    #[arg(long, env = "LUMEN_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Log level for lumen crates (RUST_LOG takes precedence)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("lumen={}", cli.log_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli)?;
    let credentials = Credentials {
        email: cli.email,
        password: cli.password,
    };

    match commands::execute(&config, &credentials, cli.command).await {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// File (when present), then `LUMEN_*` environment, then flags
fn load_config(cli: &Cli) -> anyhow::Result<LumenConfig> {
    let mut config = if Path::new(&cli.config).exists() {
        LumenConfig::load(&cli.config)?
    } else {
        info!(path = %cli.config, "config file not found, using defaults");
        LumenConfig::default()
    };
    config.apply_env();

    if let Some(base_url) = &cli.base_url {
        config.gateway.base_url = base_url.trim_end_matches('/').to_string();
    }
    if let Some(api_key) = &cli.api_key {
        config.gateway.api_key = api_key.clone();
    }

    config.validate()?;
    Ok(config)
}
