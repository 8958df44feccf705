//! Profiler-wrapping plugin (omnitrace)
//!
//! Validates an omnitrace configuration by running `omnitrace-python` against
//! a smoke-test script, then wraps the worker's interpreter invocation with
//! the same command line.

use crate::application::constants::{SMOKE_TEST_SCRIPT_BODY, SMOKE_TEST_SCRIPT_NAME};
use crate::domain::{CommandLine, EnvironmentMap, ExecutionContext, RuntimeEnvSpec};
use crate::error::{EnvError, Result};
use crate::port::{RuntimeEnvPlugin, WrapperOutcome, WrapperProbe, WrapperRunner, SUCCESS};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub const OMNITRACE_PROGRAM: &str = "omnitrace-python";
pub const OMNITRACE_TOOL: &str = "omnitrace";
pub const OUTPUT_PATH_VAR: &str = "OMNITRACE_OUTPUT_PATH";

/// Only platform the omnitrace CLI ships for
const SUPPORTED_PLATFORM: &str = "linux";

/// Literal selecting the built-in configuration
const DEFAULT_CONFIG_NAME: &str = "default";

/// Parsed `{args, env}` profiler configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilerConfig {
    /// Flag name -> value, in the order given
    pub args: Vec<(String, String)>,
    pub env: EnvironmentMap,
}

impl ProfilerConfig {
    /// Configuration used for `"_omnitrace": "default"`
    pub fn default_config() -> Self {
        Self {
            args: vec![("F".to_string(), "true".to_string())],
            env: [
                ("OMNITRACE_TIME_OUTPUT", "false"),
                ("OMNITRACE_OUTPUT_PREFIX", "worker_process_%p"),
            ]
            .into_iter()
            .collect(),
        }
    }

    /// Parse the runtime env value: `"default"` or `{"args": {..}, "env": {..}}`
    ///
    /// # Errors
    /// - `EnvError::Config` for any other string or an unsupported shape
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(name) if name == DEFAULT_CONFIG_NAME => Ok(Self::default_config()),
            Value::String(name) => Err(EnvError::Config(format!(
                "Unsupported omnitrace config: {}. The supported config is 'default' or \
                 a dictionary of omnitrace options",
                name
            ))),
            Value::Object(groups) => {
                for key in groups.keys().filter(|k| !matches!(k.as_str(), "args" | "env")) {
                    warn!(key = %key, "Ignoring unknown omnitrace config group");
                }
                let args = match groups.get("args") {
                    Some(args) => string_pairs("args", args)?,
                    None => Vec::new(),
                };
                let env = match groups.get("env") {
                    Some(env) => string_pairs("env", env)?.into_iter().collect(),
                    None => EnvironmentMap::new(),
                };
                Ok(Self { args, env })
            }
            other => Err(EnvError::Config(format!(
                "Unsupported omnitrace config: {}. The supported config is 'default' or \
                 a dictionary of omnitrace options",
                other
            ))),
        }
    }

    /// Render the wrapper command line.
    ///
    /// Single-character flags become `-X value`, longer ones `--name=value`.
    /// The command always ends with `--` so the interpreter invocation
    /// that follows is passed through untouched.
    pub fn command(&self, program: &str) -> CommandLine {
        let mut cmd = CommandLine::new(vec![program.to_string()]);
        for (option, value) in &self.args {
            if option.chars().count() > 1 {
                cmd.push(format!("--{}={}", option, value));
            } else {
                cmd.push(format!("-{}", option));
                cmd.push(value.clone());
            }
        }
        cmd.push("--");
        cmd
    }
}

/// Entries of a `{name: scalar}` group, rendered as strings
fn string_pairs(group: &str, value: &Value) -> Result<Vec<(String, String)>> {
    let map: &Map<String, Value> = value.as_object().ok_or_else(|| {
        EnvError::Config(format!(
            "omnitrace config group '{}' must be a dictionary, got {}",
            group, value
        ))
    })?;

    map.iter()
        .map(|(name, v)| {
            let rendered = match v {
                Value::String(s) => s.clone(),
                Value::Bool(_) | Value::Number(_) => v.to_string(),
                _ => {
                    return Err(EnvError::Config(format!(
                        "omnitrace config value {}.{} must be a string, number or boolean, got {}",
                        group, name, v
                    )))
                }
            };
            Ok((name.clone(), rendered))
        })
        .collect()
}

/// Profiler-wrapping plugin
///
/// Stateless between calls: `modify_context` re-derives the override from the
/// runtime env, so concurrent setups with different configs never interfere.
pub struct ProfilerPlugin {
    runner: Arc<dyn WrapperRunner>,
    output_dir: PathBuf,
    program: String,
    platform: String,
}

impl ProfilerPlugin {
    /// Create the plugin and its log directory.
    ///
    /// # Arguments
    /// * `resources_dir` - Runtime resources directory; profiler output goes to
    ///   `<parent>/logs/omnitrace`
    /// * `runner` - Wrapper runner used for validation
    pub fn new(resources_dir: &Path, runner: Arc<dyn WrapperRunner>) -> Result<Self> {
        let session_dir = resources_dir.parent().unwrap_or(resources_dir);
        let output_dir = session_dir.join("logs").join(OMNITRACE_TOOL);
        std::fs::create_dir_all(&output_dir)?;

        Ok(Self {
            runner,
            output_dir,
            program: OMNITRACE_PROGRAM.to_string(),
            platform: std::env::consts::OS.to_string(),
        })
    }

    /// Override the wrapper executable
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Override the detected operating system
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Run the wrapper once against a smoke-test script
    async fn check_config(&self, config: &ProfilerConfig) -> Result<()> {
        let probe = WrapperProbe {
            tool: OMNITRACE_TOOL.to_string(),
            command: config.command(&self.program),
            env: config.env.clone(),
            scratch_root: self.output_dir.clone(),
            output_path_var: Some(OUTPUT_PATH_VAR.to_string()),
            script_name: SMOKE_TEST_SCRIPT_NAME.to_string(),
            script_body: SMOKE_TEST_SCRIPT_BODY.to_string(),
        };

        let outcome = self.runner.run(&probe).await?;
        if let Some(message) = outcome.to_validation(OMNITRACE_TOOL).message() {
            warn!(command = %probe.command, error = %message, "omnitrace validation failed");
        }

        match outcome {
            WrapperOutcome::Passed => Ok(()),
            WrapperOutcome::NotInstalled { .. } => Err(EnvError::ToolNotInstalled {
                tool: OMNITRACE_TOOL.to_string(),
            }),
            WrapperOutcome::Failed { message, .. } => Err(EnvError::ToolFailed {
                tool: OMNITRACE_TOOL.to_string(),
                message,
            }),
            WrapperOutcome::TimedOut { timeout } => Err(EnvError::ToolTimeout {
                tool: OMNITRACE_TOOL.to_string(),
                timeout,
            }),
        }
    }

    /// Requested config value, or `None` when profiling is off
    ///
    /// Any falsy JSON value (`null`, `false`, `0`, `""`, `[]`, `{}`) means off.
    fn requested(runtime_env: &RuntimeEnvSpec) -> Option<&Value> {
        runtime_env.omnitrace().filter(|value| match value {
            Value::Null => false,
            Value::Bool(enabled) => *enabled,
            Value::Number(n) => n.as_f64() != Some(0.0),
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Object(map) => !map.is_empty(),
        })
    }

    /// Command and env overlay applied to the worker
    fn context_override(&self, config: &ProfilerConfig) -> (CommandLine, EnvironmentMap) {
        let mut env = config.env.clone();
        env.insert(OUTPUT_PATH_VAR, self.output_dir.to_string_lossy().into_owned());
        (config.command(&self.program), env)
    }
}

#[async_trait]
impl RuntimeEnvPlugin for ProfilerPlugin {
    fn name(&self) -> &'static str {
        "_omnitrace"
    }

    async fn create(
        &self,
        _uri: Option<&str>,
        runtime_env: &RuntimeEnvSpec,
        _context: &mut ExecutionContext,
    ) -> Result<i32> {
        let Some(raw) = Self::requested(runtime_env) else {
            return Ok(SUCCESS);
        };
        if self.platform != SUPPORTED_PLATFORM {
            return Err(EnvError::UnsupportedPlatform(format!(
                "omnitrace CLI is only available in Linux, not {}",
                self.platform
            )));
        }
        let config = ProfilerConfig::from_value(raw)?;

        self.check_config(&config).await?;

        info!(
            command = %config.command(&self.program),
            output_dir = %self.output_dir.display(),
            "omnitrace config validated"
        );
        Ok(SUCCESS)
    }

    fn modify_context(
        &self,
        _uris: &[String],
        runtime_env: &RuntimeEnvSpec,
        context: &mut ExecutionContext,
    ) {
        let Some(raw) = Self::requested(runtime_env) else {
            return;
        };
        let config = match ProfilerConfig::from_value(raw) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Skipping omnitrace context change for invalid config");
                return;
            }
        };

        let (command, env) = self.context_override(&config);
        info!(command = %command, "Running omnitrace profiler");
        context.py_executable = command.join();
        context.env_vars.merge(&env);
    }
}
