//! # Notification Configuration Validator
//!
//! Loads the layered configuration for an environment and reports the
//! effective settings, exiting non-zero when validation fails.
//!
//! ```text
//! config-validator [--environment <env>] [--config-dir <dir>] [--json]
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use notification_core::config::{ConfigManager, NotificationConfig};
use notification_core::logging::init_structured_logging;
use notification_core::orchestration::{BackoffCalculator, BackoffCalculatorConfig};
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate notification configuration files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment to validate (defaults to NOTIFY_ENV, then APP_ENV, then development)
    #[arg(short, long, default_value_t = ConfigManager::detect_environment())]
    environment: String,

    /// Configuration directory path (default: config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Print the merged configuration as JSON
    #[arg(long)]
    json: bool,
}

fn run(cli: Cli) -> Result<()> {
    let manager = ConfigManager::load_from_directory_with_env(cli.config_dir, &cli.environment)
        .with_context(|| {
            format!("failed to load configuration for environment '{}'", cli.environment)
        })?;
    let config = manager.config();
    init_structured_logging(&config.logging);

    info!(
        environment = %manager.environment(),
        config_directory = %manager.config_directory().display(),
        "Configuration loaded"
    );

    if cli.json {
        let rendered =
            serde_json::to_string_pretty(config).context("failed to serialize configuration")?;
        println!("{rendered}");
    } else {
        print_summary(manager.environment(), config);
    }
    Ok(())
}

fn print_summary(environment: &str, config: &NotificationConfig) {
    let backoff = BackoffCalculator::new(BackoffCalculatorConfig::from_config(config));
    let schedule: Vec<String> = (1..config.retry.max_attempts)
        .map(|attempt| format!("{}ms", backoff.base_delay_ms(attempt)))
        .collect();

    println!("Environment:              {environment}");
    println!("Default language:         {}", config.engine.default_language);
    println!("Provider call timeout:    {}ms", config.engine.provider_call_timeout_ms);
    println!("Max attempts:             {}", config.retry.max_attempts);
    println!("Backoff schedule:         [{}]", schedule.join(", "));
    println!("Jitter window:            {}ms", config.retry.jitter_window_ms);
    println!("Workers per channel:      {}", config.workers.concurrency_per_channel);
    println!("Config cache TTL:         {}s", config.cache.config_ttl_seconds);
    println!("Ledger write retries:     {}", config.ledger.write_retry_attempts);
    println!("Configuration is valid");
}

fn main() {
    if let Err(e) = run(Cli::parse()) {
        error!("Configuration validation failed: {e:#}");
        eprintln!("Configuration validation failed: {e:#}");
        process::exit(1);
    }
}
