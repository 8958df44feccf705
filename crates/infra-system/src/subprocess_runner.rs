// Wrapper validation runner (subprocess-backed)
// reason: tokio for async process management, one suspend point per run
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use rtenv_core::application::constants::{DEFAULT_VALIDATION_TIMEOUT, SCRATCH_DIR_PREFIX};
use rtenv_core::domain::EnvironmentMap;
use rtenv_core::error::{EnvError, Result};
use rtenv_core::port::{WrapperOutcome, WrapperProbe, WrapperRunner};

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Upper bound on one wrapper run, including output drain
    pub timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_VALIDATION_TIMEOUT,
        }
    }
}

/// Per-attempt scratch directory, removed on every exit path
struct ScratchDir {
    path: PathBuf,
    removed: bool,
}

impl ScratchDir {
    /// Create `<root>/test-<uuid>`; the unique name keeps concurrent
    /// validations from sharing a directory
    fn create(root: &Path) -> std::io::Result<Self> {
        let path = root.join(format!("{}{}", SCRATCH_DIR_PREFIX, Uuid::new_v4()));
        std::fs::create_dir_all(&path)?;
        Ok(Self {
            path,
            removed: false,
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn remove(mut self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.path).await {
            warn!(path = %self.path.display(), error = %e, "Failed to remove scratch directory");
        }
        self.removed = true;
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to remove scratch directory")
            }
        }
    }
}

/// Wrapper runner that spawns the wrapper as a child process
pub struct SubprocessWrapperRunner {
    config: RunnerConfig,
}

impl SubprocessWrapperRunner {
    /// Create a new runner
    ///
    /// # Example
    /// ```ignore
    /// let runner = SubprocessWrapperRunner::new(RunnerConfig::default());
    /// ```
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Variables set on the child on top of the inherited environment
    ///
    /// Config values replace same-named inherited variables rather than
    /// yielding to them, and the output path always points at `scratch`.
    /// Inherited variables, non-UTF-8 ones included, pass through untouched.
    fn env_overlay(probe: &WrapperProbe, scratch: &Path) -> EnvironmentMap {
        let mut overlay = probe.env.clone();
        if let Some(var) = &probe.output_path_var {
            overlay.insert(var.clone(), scratch.to_string_lossy().into_owned());
        }
        overlay
    }

    /// Spawn the wrapper against `script` and wait for it
    async fn spawn_and_wait(
        &self,
        probe: &WrapperProbe,
        script: &Path,
        overlay: &EnvironmentMap,
    ) -> WrapperOutcome {
        let Some((program, args)) = probe.command.tokens().split_first() else {
            return WrapperOutcome::Failed {
                exit_code: None,
                message: "empty wrapper command".to_string(),
            };
        };

        let child = Command::new(program)
            .args(args)
            .arg(script)
            .envs(overlay.iter())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return WrapperOutcome::NotInstalled {
                    program: program.clone(),
                }
            }
            Err(e) => {
                return WrapperOutcome::Failed {
                    exit_code: None,
                    message: format!("failed to spawn {}: {}", program, e),
                }
            }
        };

        match timeout(self.config.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) if output.status.success() => WrapperOutcome::Passed,
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let stdout = String::from_utf8_lossy(&output.stdout);
                let message = if stderr.trim().is_empty() {
                    stdout.trim().to_string()
                } else {
                    stderr.trim().to_string()
                };
                WrapperOutcome::Failed {
                    exit_code: output.status.code(),
                    message,
                }
            }
            Ok(Err(e)) => WrapperOutcome::Failed {
                exit_code: None,
                message: format!("failed to collect output of {}: {}", program, e),
            },
            // child is dropped here, kill_on_drop reaps it
            Err(_) => WrapperOutcome::TimedOut {
                timeout: self.config.timeout,
            },
        }
    }
}

impl Default for SubprocessWrapperRunner {
    fn default() -> Self {
        Self::new(RunnerConfig::default())
    }
}

#[async_trait]
impl WrapperRunner for SubprocessWrapperRunner {
    async fn run(&self, probe: &WrapperProbe) -> Result<WrapperOutcome> {
        let scratch = ScratchDir::create(&probe.scratch_root)?;
        let script = scratch.path().join(&probe.script_name);
        tokio::fs::write(&script, &probe.script_body)
            .await
            .map_err(EnvError::Io)?;

        let overlay = Self::env_overlay(probe, scratch.path());

        info!(
            tool = %probe.tool,
            command = %probe.command,
            scratch = %scratch.path().display(),
            timeout = ?self.config.timeout,
            "Validating wrapper"
        );

        let outcome = self.spawn_and_wait(probe, &script, &overlay).await;
        scratch.remove().await;

        info!(tool = %probe.tool, outcome = ?outcome, "Wrapper validation completed");
        Ok(outcome)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use rtenv_core::domain::CommandLine;

    fn probe(command: &[&str], scratch_root: &Path) -> WrapperProbe {
        WrapperProbe {
            tool: "test-tool".to_string(),
            command: command.iter().copied().collect::<CommandLine>(),
            env: EnvironmentMap::new(),
            scratch_root: scratch_root.to_path_buf(),
            output_path_var: None,
            script_name: "test.py".to_string(),
            script_body: "import time\n".to_string(),
        }
    }

    fn is_empty_dir(path: &Path) -> bool {
        std::fs::read_dir(path).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_passing_wrapper() {
        let root = tempfile::tempdir().unwrap();
        let runner = SubprocessWrapperRunner::default();

        let outcome = runner.run(&probe(&["true"], root.path())).await.unwrap();

        assert_eq!(outcome, WrapperOutcome::Passed);
        assert!(is_empty_dir(root.path()));
    }

    #[tokio::test]
    async fn test_failing_wrapper_reports_stderr() {
        let root = tempfile::tempdir().unwrap();
        let runner = SubprocessWrapperRunner::default();
        let p = probe(&["sh", "-c", "echo ignored; echo boom >&2; exit 3"], root.path());

        let outcome = runner.run(&p).await.unwrap();

        assert_eq!(
            outcome,
            WrapperOutcome::Failed {
                exit_code: Some(3),
                message: "boom".to_string()
            }
        );
        assert!(is_empty_dir(root.path()));
    }

    #[tokio::test]
    async fn test_failing_wrapper_falls_back_to_stdout() {
        let root = tempfile::tempdir().unwrap();
        let runner = SubprocessWrapperRunner::default();
        let p = probe(&["sh", "-c", "echo only-stdout; exit 1"], root.path());

        let outcome = runner.run(&p).await.unwrap();

        assert_eq!(
            outcome.to_validation("test-tool").message(),
            Some("only-stdout")
        );
    }

    #[tokio::test]
    async fn test_missing_wrapper_is_not_installed() {
        let root = tempfile::tempdir().unwrap();
        let runner = SubprocessWrapperRunner::default();
        let p = probe(&["rtenv-no-such-wrapper-binary", "-F", "true", "--"], root.path());

        let outcome = runner.run(&p).await.unwrap();

        assert!(matches!(outcome, WrapperOutcome::NotInstalled { .. }));
        assert_eq!(
            outcome.to_validation("test-tool").message(),
            Some("test-tool is not installed")
        );
        assert!(is_empty_dir(root.path()));
    }

    #[tokio::test]
    async fn test_hanging_wrapper_times_out() {
        let root = tempfile::tempdir().unwrap();
        let runner = SubprocessWrapperRunner::new(RunnerConfig {
            timeout: Duration::from_millis(200),
        });

        let p = probe(&["sh", "-c", "exec sleep 30"], root.path());

        let outcome = runner.run(&p).await.unwrap();

        assert!(matches!(outcome, WrapperOutcome::TimedOut { .. }));
        assert!(is_empty_dir(root.path()));
    }

    #[tokio::test]
    async fn test_env_and_script_reach_wrapper() {
        let root = tempfile::tempdir().unwrap();
        let runner = SubprocessWrapperRunner::default();
        let mut p = probe(
            &[
                "sh",
                "-c",
                r#"test "$RTENV_PROBE" = 1 && test -f "$RTENV_OUT/test.py" && test "$0" = "$RTENV_OUT/test.py""#,
            ],
            root.path(),
        );
        p.env.insert("RTENV_PROBE", "1");
        p.output_path_var = Some("RTENV_OUT".to_string());

        let outcome = runner.run(&p).await.unwrap();

        assert_eq!(outcome, WrapperOutcome::Passed);
    }

    #[tokio::test]
    async fn test_inherited_env_passes_through_with_config_on_top() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        std::env::set_var("RTENV_INHERITED_RAW", OsStr::from_bytes(b"raw-\xff"));
        std::env::set_var("RTENV_INHERITED_MODE", "ambient");
        let root = tempfile::tempdir().unwrap();
        let runner = SubprocessWrapperRunner::default();
        let mut p = probe(
            &[
                "sh",
                "-c",
                r#"test -n "$RTENV_INHERITED_RAW" && test "$RTENV_INHERITED_MODE" = config"#,
            ],
            root.path(),
        );
        p.env.insert("RTENV_INHERITED_MODE", "config");

        let outcome = runner.run(&p).await.unwrap();

        assert_eq!(outcome, WrapperOutcome::Passed);
    }

    #[tokio::test]
    async fn test_concurrent_runs_use_distinct_scratch_dirs() {
        let root = tempfile::tempdir().unwrap();
        let runner = SubprocessWrapperRunner::default();
        // each run asserts it is alone in its scratch dir
        let p = probe(&["sh", "-c", r#"test "$(ls "$(dirname "$0")")" = test.py"#], root.path());

        let (a, b) = tokio::join!(runner.run(&p), runner.run(&p));

        assert_eq!(a.unwrap(), WrapperOutcome::Passed);
        assert_eq!(b.unwrap(), WrapperOutcome::Passed);
        assert!(is_empty_dir(root.path()));
    }

    #[test]
    fn test_scratch_dir_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(root.path()).unwrap();
        let path = scratch.path().to_path_buf();
        assert!(path.is_dir());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(SCRATCH_DIR_PREFIX));

        drop(scratch);

        assert!(!path.exists());
    }
}
