// Execution Context - how a single worker process will actually be invoked

use super::environment::EnvironmentMap;
use serde::Serialize;

/// Default interpreter invocation before any plugin rewrites it
pub const DEFAULT_PY_EXECUTABLE: &str = "python";

/// Mutable launch record for one worker setup.
///
/// Created once per setup, written by plugins in `modify_context`, consumed
/// exactly once by the external launcher, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionContext {
    /// Command string replacing the default interpreter invocation
    pub py_executable: String,
    /// Variables layered over the worker's inherited environment
    pub env_vars: EnvironmentMap,
}

impl ExecutionContext {
    pub fn new(py_executable: impl Into<String>) -> Self {
        Self {
            py_executable: py_executable.into(),
            env_vars: EnvironmentMap::new(),
        }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(DEFAULT_PY_EXECUTABLE)
    }
}
