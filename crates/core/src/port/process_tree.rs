// Process Tree Port
// Read-only view of the current process and its ancestor chain

use crate::domain::CommandLine;
use thiserror::Error;

/// Per-ancestor lookup failure. Always skippable: ancestor permissions and
/// lifetimes are inherently racy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessLookupError {
    #[error("process {0} exited before its command line could be read")]
    ProcessGone(u32),

    #[error("access denied reading command line of process {0}")]
    AccessDenied(u32),
}

/// Snapshot of one process taken during a walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessHandle {
    pid: u32,
    cmdline: Result<CommandLine, ProcessLookupError>,
}

impl ProcessHandle {
    pub fn new(pid: u32, cmdline: CommandLine) -> Self {
        Self {
            pid,
            cmdline: Ok(cmdline),
        }
    }

    /// Handle whose command line could not be read
    pub fn unavailable(pid: u32, error: ProcessLookupError) -> Self {
        Self {
            pid,
            cmdline: Err(error),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn cmdline(&self) -> Result<&CommandLine, ProcessLookupError> {
        self.cmdline.as_ref().map_err(Clone::clone)
    }
}

/// Lazy ancestor sequence, nearest parent first
pub type Ancestors<'a> = Box<dyn Iterator<Item = ProcessHandle> + Send + 'a>;

/// Process tree port
///
/// Each call to `ancestors` is a fresh OS query; two walks are never assumed
/// to agree.
pub trait ProcessTree: Send + Sync {
    /// Walk the ancestors of the current process, nearest parent first
    fn ancestors(&self) -> Ancestors<'_>;

    /// Full command line of the current process, as the OS reports it
    fn current_cmdline(&self) -> Result<CommandLine, ProcessLookupError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock ProcessTree with a fixed ancestor chain
    pub struct MockProcessTree {
        ancestors: Vec<ProcessHandle>,
        current: CommandLine,
        walks: AtomicUsize,
    }

    impl MockProcessTree {
        pub fn new(ancestors: Vec<ProcessHandle>, current: CommandLine) -> Self {
            Self {
                ancestors,
                current,
                walks: AtomicUsize::new(0),
            }
        }

        /// Single readable parent with the given command line
        pub fn with_parent<S: Into<String>>(
            parent: impl IntoIterator<Item = S>,
            current: impl IntoIterator<Item = S>,
        ) -> Self {
            Self::new(
                vec![ProcessHandle::new(100, parent.into_iter().collect())],
                current.into_iter().collect(),
            )
        }

        /// Number of times `ancestors` was called
        pub fn walk_count(&self) -> usize {
            self.walks.load(Ordering::SeqCst)
        }
    }

    impl ProcessTree for MockProcessTree {
        fn ancestors(&self) -> Ancestors<'_> {
            self.walks.fetch_add(1, Ordering::SeqCst);
            Box::new(self.ancestors.clone().into_iter())
        }

        fn current_cmdline(&self) -> Result<CommandLine, ProcessLookupError> {
            Ok(self.current.clone())
        }
    }
}
