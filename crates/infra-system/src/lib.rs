// rtenv Infrastructure - System Adapters
// Implements: ProcessTree, WrapperRunner

pub mod process_tree_impl;
pub mod subprocess_runner;

pub use process_tree_impl::SysinfoProcessTree;
pub use subprocess_runner::{RunnerConfig, SubprocessWrapperRunner};
