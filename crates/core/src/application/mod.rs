// Application Layer - Adaptation use cases

pub mod bench;
pub mod cmdline_diff;
pub mod constants;
pub mod launcher;
pub mod path_containment;
pub mod profiler;

// Re-exports
pub use bench::{BenchConfig, BenchResult, BenchRunner};
pub use launcher::{
    AdaptOutcome, LauncherAncestryAdapter, LauncherAncestryPlugin, WrapperSignature,
};
pub use profiler::{ProfilerConfig, ProfilerPlugin};
