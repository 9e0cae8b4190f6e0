//! # Structured Logging Module
//!
//! Environment-aware structured logging for the notification pipeline.
//! Every lifecycle event is emitted with `tenant_id`, `request_id`,
//! `task_id` and `channel` fields so a single delivery can be followed
//! across intake, dispatch, retry and dead-lettering.

use crate::config::LoggingConfig;
use crate::constants::ChannelKind;
use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// Safe to call more than once; only the first call installs a subscriber,
/// and an already-installed global subscriber is left in place.
pub fn init_structured_logging(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = config
            .level
            .clone()
            .unwrap_or_else(|| get_log_level(&environment));
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

        let layer = if config.json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // A host application may already own the global subscriber
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized; keeping it");
        }

        tracing::info!(
            environment = %environment,
            level = %log_level,
            json = config.json,
            "Structured logging initialized"
        );
    });
}

/// Get current environment from environment variables
pub fn get_environment() -> String {
    std::env::var("NOTIFY_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
pub fn get_log_level(environment: &str) -> String {
    match environment {
        "test" => "debug".to_string(),
        "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for delivery task operations
pub fn log_task_operation(
    operation: &str,
    tenant_id: &str,
    request_id: &str,
    task_id: Option<Uuid>,
    channel: Option<ChannelKind>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        tenant_id = %tenant_id,
        request_id = %request_id,
        task_id = task_id.map(|id| id.to_string()),
        channel = channel.map(|c| c.as_str()),
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "TASK_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "ERROR"
    );
}
