// Wrapper Runner Port
// Runs a candidate wrapper tool against a throwaway script to prove it works

use crate::domain::{CommandLine, EnvironmentMap, ValidationResult};
use crate::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

/// One validation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperProbe {
    /// Human-facing tool label used in messages (e.g. "omnitrace")
    pub tool: String,
    /// Wrapper command; the smoke-test script path is appended to it
    pub command: CommandLine,
    /// Variables layered over the current process environment
    pub env: EnvironmentMap,
    /// Parent of the per-attempt scratch directory
    pub scratch_root: PathBuf,
    /// If set, this variable points the tool's output at the scratch directory
    pub output_path_var: Option<String>,
    pub script_name: String,
    pub script_body: String,
}

/// How a validation attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WrapperOutcome {
    Passed,
    /// Wrapper executable could not be spawned
    NotInstalled { program: String },
    /// Wrapper ran and exited non-zero
    Failed {
        exit_code: Option<i32>,
        message: String,
    },
    TimedOut { timeout: Duration },
}

impl WrapperOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, WrapperOutcome::Passed)
    }

    /// Collapse into a ValidationResult with an operator-facing message
    pub fn to_validation(&self, tool: &str) -> ValidationResult {
        match self {
            WrapperOutcome::Passed => ValidationResult::Valid,
            WrapperOutcome::NotInstalled { .. } => {
                ValidationResult::Invalid(format!("{} is not installed", tool))
            }
            WrapperOutcome::Failed { message, .. } => ValidationResult::Invalid(message.clone()),
            WrapperOutcome::TimedOut { timeout } => ValidationResult::Invalid(format!(
                "{} did not finish within {:?}",
                tool, timeout
            )),
        }
    }
}

/// Wrapper runner port
///
/// Implementations must remove the scratch directory on every exit path.
#[async_trait]
pub trait WrapperRunner: Send + Sync {
    /// Execute the probe once. `Err` is reserved for local failures such as
    /// being unable to create the scratch directory.
    async fn run(&self, probe: &WrapperProbe) -> Result<WrapperOutcome>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Mock WrapperRunner returning a fixed outcome and recording probes
    pub struct MockWrapperRunner {
        outcome: WrapperOutcome,
        probes: Arc<Mutex<Vec<WrapperProbe>>>,
    }

    impl MockWrapperRunner {
        pub fn new(outcome: WrapperOutcome) -> Self {
            Self {
                outcome,
                probes: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn new_passing() -> Self {
            Self::new(WrapperOutcome::Passed)
        }

        pub fn new_missing(program: impl Into<String>) -> Self {
            Self::new(WrapperOutcome::NotInstalled {
                program: program.into(),
            })
        }

        pub fn new_failing(message: impl Into<String>) -> Self {
            Self::new(WrapperOutcome::Failed {
                exit_code: Some(1),
                message: message.into(),
            })
        }

        pub fn call_count(&self) -> usize {
            self.probes.lock().unwrap().len()
        }

        pub fn probes(&self) -> Vec<WrapperProbe> {
            self.probes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WrapperRunner for MockWrapperRunner {
        async fn run(&self, probe: &WrapperProbe) -> Result<WrapperOutcome> {
            self.probes.lock().unwrap().push(probe.clone());
            Ok(self.outcome.clone())
        }
    }
}
