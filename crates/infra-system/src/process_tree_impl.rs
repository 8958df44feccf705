// Process tree implementation
// reason: sysinfo for cross-platform process table access
use std::collections::HashSet;
use sysinfo::{Pid, ProcessRefreshKind, System, UpdateKind};
use tracing::debug;

use rtenv_core::domain::CommandLine;
use rtenv_core::port::{Ancestors, ProcessHandle, ProcessLookupError, ProcessTree};

/// Process tree backed by a sysinfo snapshot
///
/// Every `ancestors()` call takes one fresh snapshot of the process table and
/// walks parent links inside it; the walk never re-queries the OS.
pub struct SysinfoProcessTree {
    pid: Pid,
}

impl SysinfoProcessTree {
    /// Tree rooted at the current process
    ///
    /// # Example
    /// ```ignore
    /// let tree = SysinfoProcessTree::new();
    /// ```
    pub fn new() -> Self {
        Self::for_pid(std::process::id())
    }

    /// Tree rooted at an arbitrary process
    pub fn for_pid(pid: u32) -> Self {
        Self {
            pid: Pid::from_u32(pid),
        }
    }

    /// Only the argv is requested; the default refresh kind never loads it
    fn refresh_kind() -> ProcessRefreshKind {
        ProcessRefreshKind::new().with_cmd(UpdateKind::OnlyIfNotSet)
    }

    fn snapshot() -> System {
        let mut system = System::new();
        system.refresh_processes_specifics(Self::refresh_kind());
        system
    }
}

impl Default for SysinfoProcessTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a process's command line out of a snapshot
fn read_cmdline(system: &System, pid: Pid) -> Result<CommandLine, ProcessLookupError> {
    let raw = pid.as_u32();
    let process = system
        .process(pid)
        .ok_or(ProcessLookupError::ProcessGone(raw))?;

    // argv was requested, so empty means unreadable (or a kernel thread)
    if process.cmd().is_empty() {
        return Err(ProcessLookupError::AccessDenied(raw));
    }
    Ok(process.cmd().iter().cloned().collect())
}

/// Lazy parent-link walk over one snapshot
struct AncestorWalk {
    system: System,
    next: Option<Pid>,
    visited: HashSet<Pid>,
}

impl Iterator for AncestorWalk {
    type Item = ProcessHandle;

    fn next(&mut self) -> Option<ProcessHandle> {
        let pid = self.next.take()?;
        // pid reuse can produce parent cycles
        if !self.visited.insert(pid) {
            return None;
        }

        self.next = self.system.process(pid).and_then(|p| p.parent());
        let raw = pid.as_u32();
        let handle = match read_cmdline(&self.system, pid) {
            Ok(cmdline) => ProcessHandle::new(raw, cmdline),
            Err(e) => {
                debug!(pid = raw, error = %e, "Ancestor command line unavailable");
                ProcessHandle::unavailable(raw, e)
            }
        };
        Some(handle)
    }
}

impl ProcessTree for SysinfoProcessTree {
    fn ancestors(&self) -> Ancestors<'_> {
        let system = Self::snapshot();
        let parent = system.process(self.pid).and_then(|p| p.parent());

        debug!(
            pid = self.pid.as_u32(),
            parent = ?parent.map(|p| p.as_u32()),
            processes = system.processes().len(),
            "Process table snapshot taken"
        );

        Box::new(AncestorWalk {
            system,
            next: parent,
            visited: HashSet::from([self.pid]),
        })
    }

    fn current_cmdline(&self) -> Result<CommandLine, ProcessLookupError> {
        let mut system = System::new();
        if !system.refresh_process_specifics(self.pid, Self::refresh_kind()) {
            return Err(ProcessLookupError::ProcessGone(self.pid.as_u32()));
        }
        read_cmdline(&system, self.pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_cmdline() {
        let tree = SysinfoProcessTree::new();
        let cmdline = tree.current_cmdline().unwrap();

        assert!(!cmdline.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_first_ancestor_is_parent() {
        let tree = SysinfoProcessTree::new();
        let first = tree.ancestors().next().unwrap();

        assert_eq!(first.pid(), std::os::unix::process::parent_id());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_parent_cmdline_matches_procfs() {
        let parent = std::os::unix::process::parent_id();
        let raw = std::fs::read(format!("/proc/{parent}/cmdline")).unwrap();
        let expected: Vec<String> = String::from_utf8_lossy(&raw)
            .split('\0')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect();

        let tree = SysinfoProcessTree::new();
        let first = tree.ancestors().next().unwrap();

        assert_eq!(first.pid(), parent);
        assert_eq!(first.cmdline().unwrap().tokens(), expected.as_slice());
    }

    #[test]
    fn test_walk_is_finite_and_excludes_self() {
        let tree = SysinfoProcessTree::new();
        let pids: Vec<u32> = tree.ancestors().map(|a| a.pid()).collect();

        assert!(!pids.contains(&std::process::id()));
        let unique: HashSet<u32> = pids.iter().copied().collect();
        assert_eq!(unique.len(), pids.len());
    }

    #[test]
    fn test_unknown_pid_has_no_ancestors() {
        let tree = SysinfoProcessTree::for_pid(u32::MAX - 7);

        assert_eq!(tree.ancestors().count(), 0);
        assert_eq!(
            tree.current_cmdline(),
            Err(ProcessLookupError::ProcessGone(u32::MAX - 7))
        );
    }
}
