//! rtenv CLI - runtime environment adaptation entry points

mod logging;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use rtenv_core::application::cmdline_diff::wrapper_prefix;
use rtenv_core::application::path_containment::validate_contained;
use rtenv_core::application::{BenchConfig, BenchRunner, LauncherAncestryAdapter, ProfilerPlugin};
use rtenv_core::domain::runtime_env::keys;
use rtenv_core::domain::{CommandLine, ExecutionContext, RuntimeEnvSpec};
use rtenv_core::port::{ProcessTree, RuntimeEnvPlugin};
use rtenv_infra_system::{RunnerConfig, SubprocessWrapperRunner, SysinfoProcessTree};

const DEFAULT_RESOURCES_DIR: &str = "~/.rtenv/session/runtime_resources";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_WARMUP_SECS: u64 = 10;

#[derive(Parser)]
#[command(name = "rtenv")]
#[command(about = "Adapt worker launch context to the current launcher", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the runtime env adapted to a detected `uv run` ancestor
    Hook {
        /// Runtime env as a JSON string (`null` for none)
        #[arg(default_value = "null")]
        runtime_env: String,
    },

    /// Validate an omnitrace config and print the resulting worker context
    Profile {
        /// `"default"` or `{"args": {...}, "env": {...}}` as JSON
        config: String,

        /// Runtime resources directory (logs go to its parent's logs/omnitrace)
        #[arg(long, env = "RTENV_RESOURCES_DIR", default_value = DEFAULT_RESOURCES_DIR)]
        resources_dir: String,

        /// Validation timeout in seconds
        #[arg(long, env = "RTENV_VALIDATION_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
        timeout_secs: u64,
    },

    /// Measure throughput of the adaptation building blocks
    Bench {
        /// Only run benchmarks whose name contains this pattern
        #[arg(long)]
        filter: Option<String>,

        /// Skip benchmarks whose name contains this pattern
        #[arg(long)]
        skip: Option<String>,

        /// Idle seconds before each benchmark
        #[arg(long, default_value_t = DEFAULT_WARMUP_SECS)]
        warmup_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Hook { runtime_env } => run_hook(&runtime_env),
        Commands::Profile {
            config,
            resources_dir,
            timeout_secs,
        } => run_profile(&config, &resources_dir, timeout_secs).await,
        Commands::Bench {
            filter,
            skip,
            warmup_secs,
        } => run_bench(BenchConfig {
            filter,
            skip,
            warmup: Duration::from_secs(warmup_secs),
            ..Default::default()
        }),
    }
}

/// Adapt the given runtime env and print it as JSON
fn run_hook(raw: &str) -> Result<()> {
    let spec = RuntimeEnvSpec::from_json(raw).context("Invalid runtime env JSON")?;
    let cwd = std::env::current_dir()?;

    let adapter = LauncherAncestryAdapter::new(Arc::new(SysinfoProcessTree::new()), cwd);
    let outcome = adapter.adapt(Some(&spec))?;

    println!("{}", serde_json::to_string(outcome.spec())?);
    Ok(())
}

async fn run_profile(raw: &str, resources_dir: &str, timeout_secs: u64) -> Result<()> {
    let config: serde_json::Value =
        serde_json::from_str(raw).context("Invalid omnitrace config JSON")?;
    let resources_dir = PathBuf::from(shellexpand::tilde(resources_dir).into_owned());

    let runner = Arc::new(SubprocessWrapperRunner::new(RunnerConfig {
        timeout: Duration::from_secs(timeout_secs),
    }));
    let plugin = ProfilerPlugin::new(&resources_dir, runner)?;

    let mut spec = RuntimeEnvSpec::new();
    spec.insert(keys::OMNITRACE, config);

    // Host lifecycle: create must succeed before modify_context
    let mut context = ExecutionContext::default();
    plugin.create(None, &spec, &mut context).await?;
    plugin.modify_context(&[], &spec, &mut context);

    info!(output_dir = %plugin.output_dir().display(), "omnitrace context ready");
    println!("{}", serde_json::to_string_pretty(&context)?);
    Ok(())
}

fn run_bench(config: BenchConfig) -> Result<()> {
    let runner = BenchRunner::new(config);
    let tree = SysinfoProcessTree::new();
    let cwd = std::env::current_dir()?;

    let wrapper: CommandLine = ["uv", "run", "--with-requirements", "reqs.txt", "main.py"]
        .into_iter()
        .collect();
    let self_args = vec!["main.py".to_string()];
    let requirements = cwd.join("reqs.txt");

    let results = [
        runner.timeit("ancestor walk", 1.0, || {
            let _ = tree.ancestors().count();
        }),
        runner.timeit("command line differ", 1.0, || {
            let _ = wrapper_prefix(&wrapper, &self_args);
        }),
        runner.timeit("path containment", 1.0, || {
            let _ = validate_contained(&requirements, &cwd);
        }),
    ];

    for result in results.into_iter().flatten() {
        println!(
            "{} per second {:.2} +- {:.2}",
            result.name, result.mean, result.stddev
        );
    }
    Ok(())
}
