// Central Error Type for environment adaptation

use std::time::Duration;
use thiserror::Error;

use crate::port::ProcessLookupError;

/// Fatal error for a worker-environment setup.
///
/// Skippable conditions (an ancestor vanishing mid-walk) never reach this type;
/// they are handled inside the ancestor walk.
#[derive(Error, Debug)]
pub enum EnvError {
    /// An internal heuristic's precondition did not hold
    #[error("Assumption violated: {0}")]
    AssumptionViolated(String),

    /// User configuration error; message carries remediation guidance
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{tool} profile failed to run with the following error message:\n {tool} is not installed")]
    ToolNotInstalled { tool: String },

    #[error("{tool} profile failed to run with the following error message:\n {message}")]
    ToolFailed { tool: String, message: String },

    #[error("{tool} profile did not finish within {timeout:?}")]
    ToolTimeout { tool: String, timeout: Duration },

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Process lookup failed: {0}")]
    ProcessLookup(#[from] ProcessLookupError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EnvError {
    /// True for errors the user fixes by changing configuration
    pub fn is_user_error(&self) -> bool {
        matches!(self, EnvError::Config(_) | EnvError::UnsupportedPlatform(_))
    }
}

/// Result type alias using EnvError
pub type Result<T> = std::result::Result<T, EnvError>;
