// Port Layer - Interfaces for external dependencies

pub mod plugin;
pub mod process_tree;
pub mod wrapper_runner;

// Re-exports
pub use plugin::{RuntimeEnvPlugin, SUCCESS};
pub use process_tree::{Ancestors, ProcessHandle, ProcessLookupError, ProcessTree};
pub use wrapper_runner::{WrapperOutcome, WrapperProbe, WrapperRunner};
