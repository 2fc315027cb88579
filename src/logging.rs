//! # Structured Logging Module
//!
//! Environment-aware `tracing` setup plus one-line summaries for client
//! operations, so a whole paginated fetch or batch create can be followed
//! from a single event.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// `RUST_LOG` wins when set. Output is JSON when `PHANTOM_LOG_FORMAT=json`.
/// Safe to call more than once, and safe when another subscriber is installed.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));
        let json_output = std::env::var("PHANTOM_LOG_FORMAT")
            .map(|format| format.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let console_layer = if json_output {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        if tracing_subscriber::registry()
            .with(console_layer)
            .try_init()
            .is_err()
        {
            tracing::debug!(
                "Global tracing subscriber already initialized - using existing subscriber"
            );
        }

        tracing::info!(
            environment = %environment,
            json_output = json_output,
            "Structured logging initialized"
        );
    });
}

/// Current environment from `PHANTOM_ENV`, defaulting to development
fn get_environment() -> String {
    std::env::var("PHANTOM_ENV").unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        "test" => "warn",
        _ => "debug",
    }
}

/// Summary of one paginated fetch
pub fn log_fetch_operation(
    endpoint: &str,
    pages: usize,
    success: usize,
    failure: usize,
    date_filtered: bool,
) {
    tracing::info!(
        endpoint = %endpoint,
        pages = pages,
        success = success,
        failure = failure,
        date_filtered = date_filtered,
        timestamp = %Utc::now().to_rfc3339(),
        "FETCH_OPERATION"
    );
}

/// Summary of one batch create
pub fn log_batch_operation(
    operation: &str,
    parents: usize,
    children: usize,
    success: usize,
    failure: usize,
) {
    tracing::info!(
        operation = %operation,
        parents = parents,
        children = children,
        success = success,
        failure = failure,
        timestamp = %Utc::now().to_rfc3339(),
        "BATCH_OPERATION"
    );
}
