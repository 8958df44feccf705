// Runtime Env Plugin Port
// Two-phase lifecycle driven by the host plugin framework

use crate::domain::{ExecutionContext, RuntimeEnvSpec};
use crate::error::Result;
use async_trait::async_trait;

/// Status code returned by a successful `create`
pub const SUCCESS: i32 = 0;

/// Environment-context mutator
///
/// Host contract (not enforced here):
/// - `create` completes, successfully, before `modify_context` is called
/// - calls for different worker setups may run concurrently
/// - calls for the same setup are never re-entrant
#[async_trait]
pub trait RuntimeEnvPlugin: Send + Sync {
    /// Runtime env key this plugin owns
    fn name(&self) -> &'static str;

    /// Validate configuration and compute override values.
    ///
    /// Re-validates on every call (no caching). Returns `SUCCESS` or a
    /// setup error that aborts worker startup.
    async fn create(
        &self,
        uri: Option<&str>,
        runtime_env: &RuntimeEnvSpec,
        context: &mut ExecutionContext,
    ) -> Result<i32>;

    /// Apply the values computed by `create` to the worker's launch context
    fn modify_context(
        &self,
        uris: &[String],
        runtime_env: &RuntimeEnvSpec,
        context: &mut ExecutionContext,
    );
}
