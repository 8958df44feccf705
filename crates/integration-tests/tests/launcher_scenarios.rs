//! Launcher-ancestry scenarios
//!
//! End-to-end adaptation runs against a scripted ancestor chain and a real
//! filesystem sandbox, plus a smoke run against the live process table.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use rtenv_core::application::{AdaptOutcome, LauncherAncestryAdapter, LauncherAncestryPlugin};
use rtenv_core::domain::{ExecutionContext, RuntimeEnvSpec};
use rtenv_core::port::process_tree::mocks::MockProcessTree;
use rtenv_core::port::{ProcessHandle, ProcessLookupError, ProcessTree, RuntimeEnvPlugin, SUCCESS};
use rtenv_core::EnvError;
use rtenv_infra_system::SysinfoProcessTree;

fn uv_run_tree(wrapper: Vec<&str>) -> MockProcessTree {
    MockProcessTree::new(
        vec![
            ProcessHandle::unavailable(2, ProcessLookupError::AccessDenied(2)),
            ProcessHandle::new(3, wrapper.into_iter().collect()),
            ProcessHandle::new(1, ["/sbin/init"].into_iter().collect()),
        ],
        ["/project/.venv/bin/python", "script.py"].into_iter().collect(),
    )
}

fn adapter(tree: MockProcessTree, cwd: &Path) -> LauncherAncestryAdapter {
    LauncherAncestryAdapter::new(Arc::new(tree), cwd)
}

/// Scenario A: requirements file inside the sandbox
#[test]
fn test_requirements_inside_sandbox_adapts() {
    let sandbox = tempfile::tempdir().unwrap();
    fs::write(sandbox.path().join("reqs.txt"), "numpy\n").unwrap();
    fs::write(sandbox.path().join("pyproject.toml"), "[project]\nname = \"demo\"\n").unwrap();
    let tree = uv_run_tree(vec!["uv", "run", "--with-requirements", "reqs.txt", "script.py"]);

    let outcome = adapter(tree, sandbox.path()).adapt(None).unwrap();

    let AdaptOutcome::Adapted(spec) = outcome else {
        panic!("expected Adapted, got {:?}", outcome);
    };
    assert_eq!(spec.py_executable(), Some("uv run --with-requirements reqs.txt"));
    assert_eq!(spec.working_dir().as_deref(), Some(sandbox.path()));
}

/// Scenario B: requirements file resolves outside the sandbox
#[test]
fn test_requirements_outside_sandbox_is_fatal() {
    let parent = tempfile::tempdir().unwrap();
    let sandbox = parent.path().join("sandbox");
    fs::create_dir(&sandbox).unwrap();
    fs::write(parent.path().join("reqs.txt"), "numpy\n").unwrap();
    let tree = uv_run_tree(vec![
        "uv",
        "run",
        "--no-project",
        "--with-requirements",
        "../reqs.txt",
        "script.py",
    ]);

    let err = adapter(tree, &sandbox).adapt(None).unwrap_err();

    assert!(matches!(err, EnvError::Config(_)), "got {:?}", err);
    let msg = err.to_string();
    assert!(msg.contains("reqs.txt"));
    assert!(msg.contains(&sandbox.display().to_string()));
    assert!(msg.contains("working_dir"));
}

#[test]
fn test_project_marker_above_sandbox_is_fatal() {
    let parent = tempfile::tempdir().unwrap();
    let sandbox = parent.path().join("sandbox");
    fs::create_dir(&sandbox).unwrap();
    fs::write(parent.path().join("pyproject.toml"), "[project]\n").unwrap();
    let tree = uv_run_tree(vec!["uv", "run", "script.py"]);

    let err = adapter(tree, &sandbox).adapt(None).unwrap_err();

    assert!(err.is_user_error());
    assert!(err.to_string().contains("pyproject.toml"));
}

#[test]
fn test_conflicting_pip_spec_is_fatal() {
    let sandbox = tempfile::tempdir().unwrap();
    let tree = uv_run_tree(vec!["uv", "run", "--no-project", "script.py"]);
    let spec = RuntimeEnvSpec::from_json(r#"{"pip": ["requests"], "working_dir": "."}"#).unwrap();

    let err = adapter(tree, sandbox.path()).adapt(Some(&spec)).unwrap_err();

    assert!(matches!(err, EnvError::Config(_)));
    assert!(err.to_string().contains("'pip'"));
}

#[test]
fn test_live_process_table_without_wrapper_is_passthrough() {
    let cwd = std::env::current_dir().unwrap();
    let adapter = LauncherAncestryAdapter::new(Arc::new(SysinfoProcessTree::new()), cwd);
    let spec = RuntimeEnvSpec::from_json(r#"{"env_vars": {"MODE": "test"}}"#).unwrap();

    // The test harness is not launched through `uv run`
    if adapter.find_wrapper_cmdline().is_some() {
        return;
    }
    let outcome = adapter.adapt(Some(&spec)).unwrap();

    assert_eq!(outcome, AdaptOutcome::Unmodified(spec));
}

/// A real process tree: `<sandbox>/uv run 10` (a shell) backgrounds `sleep 10`
#[cfg(target_os = "linux")]
#[test]
fn test_live_wrapper_ancestor_is_detected() {
    use std::io::{BufRead, BufReader};
    use std::process::{Command, Stdio};
    use std::time::{Duration, Instant};

    let sandbox = tempfile::tempdir().unwrap();
    let launcher = sandbox.path().join("uv");
    std::os::unix::fs::symlink("/bin/sh", &launcher).unwrap();
    fs::write(sandbox.path().join("run"), "sleep \"$1\" &\necho $!\nwait\n").unwrap();

    let mut wrapper = Command::new(&launcher)
        .args(["run", "10"])
        .current_dir(sandbox.path())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    let mut line = String::new();
    BufReader::new(wrapper.stdout.take().unwrap())
        .read_line(&mut line)
        .unwrap();
    let worker: u32 = line.trim().parse().unwrap();

    // wait until the forked shell has exec'd into sleep
    let tree = SysinfoProcessTree::for_pid(worker);
    let deadline = Instant::now() + Duration::from_secs(5);
    while tree.current_cmdline().ok().and_then(|c| c.executable_name().map(str::to_string))
        != Some("sleep".to_string())
    {
        assert!(Instant::now() < deadline, "worker never became sleep");
        std::thread::sleep(Duration::from_millis(20));
    }

    let adapter = LauncherAncestryAdapter::new(Arc::new(tree), sandbox.path());
    let spec = RuntimeEnvSpec::from_json(r#"{"working_dir": "."}"#).unwrap();
    let outcome = adapter.adapt(Some(&spec));

    let _ = Command::new("kill").arg(worker.to_string()).status();
    let _ = wrapper.kill();
    let _ = wrapper.wait();

    let outcome = outcome.unwrap();
    assert!(outcome.is_adapted(), "got {:?}", outcome);
    assert_eq!(
        outcome.spec().py_executable(),
        Some(format!("{} run", launcher.display()).as_str())
    );
}

#[tokio::test]
async fn test_plugin_lifecycle_rewrites_context() {
    let sandbox = tempfile::tempdir().unwrap();
    let tree = uv_run_tree(vec!["uv", "run", "--directory", "/elsewhere", "--no-project", "script.py"]);
    let plugin = LauncherAncestryPlugin::new(adapter(tree, sandbox.path()));
    let spec = RuntimeEnvSpec::new();
    let mut context = ExecutionContext::default();

    assert_eq!(plugin.create(None, &spec, &mut context).await.unwrap(), SUCCESS);
    plugin.modify_context(&[], &spec, &mut context);

    assert_eq!(context.py_executable, "uv run --no-project");
    assert!(context.env_vars.is_empty());
}
