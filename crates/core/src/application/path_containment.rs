//! Path containment checks
//!
//! Workers only see the sandbox root (their working directory), not the
//! launcher's whole filesystem. Any file a wrapper references must resolve
//! inside that root.

use crate::domain::ValidationResult;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Resolve `path` to an absolute, symlink-resolved form.
///
/// Missing trailing components are kept as written (non-strict resolution),
/// so a file that does not exist yet can still be checked. Relative paths
/// are taken against the current directory.
pub fn resolve_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    let mut resolved = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => resolved.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(name) => {
                let candidate = resolved.join(name);
                resolved = candidate.canonicalize().unwrap_or(candidate);
            }
        }
    }
    resolved
}

/// Check that `path` is equal to or nested under `sandbox_root`
pub fn validate_contained(path: &Path, sandbox_root: &Path) -> ValidationResult {
    let resolved = resolve_path(path);
    let root = resolve_path(sandbox_root);

    debug!(
        path = %path.display(),
        resolved = %resolved.display(),
        root = %root.display(),
        "Checking path containment"
    );

    if resolved.starts_with(&root) {
        ValidationResult::Valid
    } else {
        ValidationResult::Invalid(format!(
            "{} resolves to {}, which is outside {}",
            path.display(),
            resolved.display(),
            root.display()
        ))
    }
}

/// Walk up from `start_dir` looking for `marker_name`.
///
/// Returns the first match, nearest directory first. The filesystem root
/// itself is never searched.
pub fn locate_marker_file(start_dir: &Path, marker_name: &str) -> Option<PathBuf> {
    let start = resolve_path(start_dir);
    let found = marker_search_dirs(&start)
        .map(|dir| dir.join(marker_name))
        .find(|candidate| candidate.is_file());
    found
}

/// `start` and its ancestors, stopping below the filesystem root
fn marker_search_dirs(start: &Path) -> impl Iterator<Item = &Path> {
    start.ancestors().take_while(|dir| dir.parent().is_some())
}
