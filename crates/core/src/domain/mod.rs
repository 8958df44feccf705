// Domain Layer - Pure values describing how a worker is launched

pub mod command_line;
pub mod context;
pub mod environment;
pub mod runtime_env;
pub mod validation;

// Re-exports
pub use command_line::CommandLine;
pub use context::ExecutionContext;
pub use environment::EnvironmentMap;
pub use runtime_env::RuntimeEnvSpec;
pub use validation::ValidationResult;
