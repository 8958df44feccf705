// Runtime Environment Spec

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Well-known configuration keys
pub mod keys {
    pub const WORKING_DIR: &str = "working_dir";
    pub const PY_EXECUTABLE: &str = "py_executable";
    pub const PIP: &str = "pip";
    pub const UV: &str = "uv";
    pub const OMNITRACE: &str = "_omnitrace";

    /// Dependency-management modes that cannot coexist with a launcher wrapper
    pub const DEPENDENCY_MANAGERS: [&str; 2] = [PIP, UV];
}

/// Caller-supplied configuration for a worker environment.
///
/// Adapters always operate on a clone; the caller's spec is never mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuntimeEnvSpec(Map<String, Value>);

impl RuntimeEnvSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Parse from a JSON document; `null` is treated as an empty spec
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        let value: Value = serde_json::from_str(raw)?;
        match value {
            Value::Null => Ok(Self::new()),
            other => serde_json::from_value(other),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn working_dir(&self) -> Option<PathBuf> {
        self.0
            .get(keys::WORKING_DIR)
            .and_then(Value::as_str)
            .map(PathBuf::from)
    }

    pub fn py_executable(&self) -> Option<&str> {
        self.0.get(keys::PY_EXECUTABLE).and_then(Value::as_str)
    }

    /// First dependency-management key present, if any
    pub fn dependency_manager(&self) -> Option<&'static str> {
        keys::DEPENDENCY_MANAGERS
            .into_iter()
            .find(|key| self.0.contains_key(*key))
    }

    /// Profiler configuration, if the worker requested one
    pub fn omnitrace(&self) -> Option<&Value> {
        self.0.get(keys::OMNITRACE).filter(|v| !v.is_null())
    }
}
