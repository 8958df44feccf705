//! Launcher-ancestry adaptation
//!
//! Detects a driver started under `uv run` and rewrites the runtime env so
//! workers are re-launched through the same `uv run` invocation.
//!
//! Linear state machine, no retries:
//! detect -> conflict-check -> extract -> materialize -> working-dir check.
//! Terminal states are `Unmodified`, `Adapted` or a fatal `EnvError`.

use crate::application::cmdline_diff::{has_flag, option_value, strip_option, wrapper_prefix};
use crate::application::constants::PROJECT_MARKER_FILE;
use crate::application::path_containment::{locate_marker_file, resolve_path, validate_contained};
use crate::domain::runtime_env::keys;
use crate::domain::{CommandLine, ExecutionContext, RuntimeEnvSpec, ValidationResult};
use crate::error::{EnvError, Result};
use crate::port::{ProcessTree, RuntimeEnvPlugin, SUCCESS};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

// Options of `uv run` this adapter understands
const OPT_DIRECTORY: &str = "--directory";
const OPT_WITH_REQUIREMENTS: &str = "--with-requirements";
const OPT_PROJECT: &str = "--project";
const OPT_NO_PROJECT: &str = "--no-project";

const REMEDIATION: &str = "You can do so by specifying --directory in 'uv run', by changing the \
     current working directory before running 'uv run', or by using the 'working_dir' \
     parameter of the runtime environment.";

/// First two tokens identifying a wrapper invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperSignature {
    /// Executable basename, e.g. `uv`
    pub executable: String,
    /// Subcommand literal, e.g. `run`
    pub subcommand: String,
}

impl WrapperSignature {
    pub fn new(executable: impl Into<String>, subcommand: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            subcommand: subcommand.into(),
        }
    }

    pub fn matches(&self, cmdline: &CommandLine) -> bool {
        cmdline.len() > 1
            && cmdline.executable_name() == Some(self.executable.as_str())
            && cmdline.tokens()[1] == self.subcommand
    }
}

impl Default for WrapperSignature {
    fn default() -> Self {
        Self::new("uv", "run")
    }
}

/// Terminal non-error states of an adaptation attempt
#[derive(Debug, Clone, PartialEq)]
pub enum AdaptOutcome {
    /// No wrapper ancestor; spec returned as given
    Unmodified(RuntimeEnvSpec),
    /// Wrapper detected; spec carries the executable override
    Adapted(RuntimeEnvSpec),
}

impl AdaptOutcome {
    pub fn is_adapted(&self) -> bool {
        matches!(self, AdaptOutcome::Adapted(_))
    }

    pub fn spec(&self) -> &RuntimeEnvSpec {
        match self {
            AdaptOutcome::Unmodified(spec) | AdaptOutcome::Adapted(spec) => spec,
        }
    }

    pub fn into_spec(self) -> RuntimeEnvSpec {
        match self {
            AdaptOutcome::Unmodified(spec) | AdaptOutcome::Adapted(spec) => spec,
        }
    }
}

/// Launcher-ancestry adapter
pub struct LauncherAncestryAdapter {
    process_tree: Arc<dyn ProcessTree>,
    signature: WrapperSignature,
    cwd: PathBuf,
}

impl LauncherAncestryAdapter {
    /// Create an adapter for the `uv run` signature
    ///
    /// # Arguments
    /// * `process_tree` - Source of ancestor command lines
    /// * `cwd` - Working directory of the current process (default sandbox root)
    pub fn new(process_tree: Arc<dyn ProcessTree>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            process_tree,
            signature: WrapperSignature::default(),
            cwd: cwd.into(),
        }
    }

    pub fn with_signature(mut self, signature: WrapperSignature) -> Self {
        self.signature = signature;
        self
    }

    /// Command line of the nearest ancestor matching the wrapper signature.
    ///
    /// Ancestors that vanished or cannot be read are skipped.
    pub fn find_wrapper_cmdline(&self) -> Option<CommandLine> {
        for ancestor in self.process_tree.ancestors() {
            match ancestor.cmdline() {
                Ok(cmdline) if self.signature.matches(cmdline) => {
                    debug!(pid = ancestor.pid(), cmdline = %cmdline, "Found wrapper ancestor");
                    return Some(cmdline.clone());
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(pid = ancestor.pid(), error = %e, "Skipping unreadable ancestor");
                }
            }
        }
        None
    }

    /// Adapt `runtime_env` to the detected launcher.
    ///
    /// The caller's spec is never mutated; a clone is returned.
    ///
    /// # Errors
    /// - `EnvError::Config` if the spec already uses a dependency manager,
    ///   or a referenced file lies outside the working directory
    /// - `EnvError::AssumptionViolated` if the command lines cannot be diffed
    pub fn adapt(&self, runtime_env: Option<&RuntimeEnvSpec>) -> Result<AdaptOutcome> {
        let mut spec = runtime_env.cloned().unwrap_or_default();

        let Some(wrapper_cmdline) = self.find_wrapper_cmdline() else {
            debug!("No wrapper ancestor found, runtime env unchanged");
            return Ok(AdaptOutcome::Unmodified(spec));
        };

        if let Some(key) = spec.dependency_manager() {
            return Err(EnvError::Config(format!(
                "You are using the '{key}' runtime environment together with '{sig}'. \
                 These are not compatible since '{sig}' will run the workers in an isolated \
                 environment -- please add the '{key}' dependencies to your '{sig}' \
                 environment e.g. by including them in your pyproject.toml.",
                key = key,
                sig = self.signature_display(),
            )));
        }

        let current = self.process_tree.current_cmdline()?;
        let wrapper_args = wrapper_prefix(&wrapper_cmdline, current.args())?;

        // --directory already took effect on our own cwd
        let remaining = CommandLine::new(strip_option(wrapper_args.tokens(), OPT_DIRECTORY));
        let py_executable = remaining.join();
        spec.insert(keys::PY_EXECUTABLE, py_executable.clone());

        // A caller-provided working_dir is always honored as-is
        if !spec.contains_key(keys::WORKING_DIR) {
            spec.insert(keys::WORKING_DIR, self.cwd.to_string_lossy().into_owned());
            self.check_working_dir_files(&wrapper_args, &self.cwd)?;
        }

        info!(py_executable = %py_executable, "Adapted runtime env to launcher");
        Ok(AdaptOutcome::Adapted(spec))
    }

    /// Ensure every file the wrapper reads is reachable from `working_dir`
    fn check_working_dir_files(&self, wrapper_args: &CommandLine, working_dir: &Path) -> Result<()> {
        let tokens = wrapper_args.tokens();
        let root = resolve_path(working_dir);

        if let Some(requirements) = option_value(tokens, OPT_WITH_REQUIREMENTS) {
            let path = self.cwd.join(requirements);
            if let ValidationResult::Invalid(reason) = validate_contained(&path, &root) {
                debug!(reason = %reason, "Requirements file outside working_dir");
                return Err(EnvError::Config(format!(
                    "You specified {opt}={req} but the requirements file is not in the \
                     working_dir {root}, so the workers will not have access to the file. \
                     Make sure the requirements file is in the working directory. {fix}",
                    opt = OPT_WITH_REQUIREMENTS,
                    req = requirements,
                    root = working_dir.display(),
                    fix = REMEDIATION,
                )));
            }
        }

        let project = if has_flag(tokens, OPT_NO_PROJECT) {
            None
        } else if let Some(project) = option_value(tokens, OPT_PROJECT) {
            Some(self.cwd.join(project))
        } else {
            locate_marker_file(&self.cwd, PROJECT_MARKER_FILE)
        };

        if let Some(project) = project {
            if let ValidationResult::Invalid(reason) = validate_contained(&project, &root) {
                debug!(reason = %reason, "Project file outside working_dir");
                return Err(EnvError::Config(format!(
                    "Your {project} is not in the working_dir {root}, so the workers will \
                     not have access to the file. Make sure the {marker} file is in the \
                     working directory. {fix}",
                    project = resolve_path(&project).display(),
                    root = working_dir.display(),
                    marker = PROJECT_MARKER_FILE,
                    fix = REMEDIATION,
                )));
            }
        }

        Ok(())
    }

    fn signature_display(&self) -> String {
        format!("{} {}", self.signature.executable, self.signature.subcommand)
    }
}

/// Launcher-ancestry adapter exposed through the plugin lifecycle.
///
/// The ancestry of this process is the same for every worker setup, so an
/// override derived from a detected wrapper is shared across setups. A setup
/// without a wrapper never writes the shared slot.
pub struct LauncherAncestryPlugin {
    adapter: LauncherAncestryAdapter,
    py_executable: Mutex<Option<String>>,
}

impl LauncherAncestryPlugin {
    pub fn new(adapter: LauncherAncestryAdapter) -> Self {
        Self {
            adapter,
            py_executable: Mutex::new(None),
        }
    }
}

#[async_trait]
impl RuntimeEnvPlugin for LauncherAncestryPlugin {
    fn name(&self) -> &'static str {
        "uv_run"
    }

    async fn create(
        &self,
        _uri: Option<&str>,
        runtime_env: &RuntimeEnvSpec,
        _context: &mut ExecutionContext,
    ) -> Result<i32> {
        let outcome = self.adapter.adapt(Some(runtime_env))?;
        // Unmodified specs carry the caller's own py_executable, not ours
        if !outcome.is_adapted() {
            return Ok(SUCCESS);
        }

        *self
            .py_executable
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) =
            outcome.spec().py_executable().map(str::to_string);
        Ok(SUCCESS)
    }

    fn modify_context(
        &self,
        _uris: &[String],
        _runtime_env: &RuntimeEnvSpec,
        context: &mut ExecutionContext,
    ) {
        let guard = self
            .py_executable
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(py_executable) = guard.as_ref() {
            info!(py_executable = %py_executable, "Launching worker through wrapper");
            context.py_executable = py_executable.clone();
        }
    }
}
