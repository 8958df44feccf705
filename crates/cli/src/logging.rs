//! Logging setup
//!
//! Logs always go to stderr: stdout carries the JSON result of a command.

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "rtenv=info,rtenv_core=info,rtenv_infra_system=info";

/// Initialize tracing
///
/// # Environment Variables
///
/// - `RUST_LOG`: filter directives (default: info for rtenv crates)
/// - `RTENV_LOG_FORMAT`: `json` for structured output, anything else for pretty
pub fn init_logging() -> Result<()> {
    let log_format = std::env::var("RTENV_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))?;

    match log_format.as_str() {
        "json" => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()?;
        }
        _ => {
            // Development: Pretty formatting with colors
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init()?;
        }
    }

    Ok(())
}
