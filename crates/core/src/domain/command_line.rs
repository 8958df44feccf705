// Command Line Domain Model

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Ordered argument vector: executable first, then its arguments.
///
/// Order is load-bearing (positional arguments, flag placement), so no
/// normalization is ever applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandLine(Vec<String>);

impl CommandLine {
    pub fn new(tokens: Vec<String>) -> Self {
        Self(tokens)
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    pub fn into_tokens(self) -> Vec<String> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Executable path or name (first token)
    pub fn executable(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// Basename of the executable, e.g. `uv` for `/usr/local/bin/uv`
    pub fn executable_name(&self) -> Option<&str> {
        self.executable()
            .and_then(|exe| Path::new(exe).file_name())
            .and_then(|name| name.to_str())
    }

    /// Everything after the executable
    pub fn args(&self) -> &[String] {
        self.0.get(1..).unwrap_or(&[])
    }

    pub fn push(&mut self, token: impl Into<String>) {
        self.0.push(token.into());
    }

    /// Space-joined rendering used for executable override strings
    pub fn join(&self) -> String {
        self.0.join(" ")
    }
}

impl<S: Into<String>> FromIterator<S> for CommandLine {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl std::fmt::Display for CommandLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.join())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executable_name_strips_directories() {
        let cmd: CommandLine = ["/home/me/.local/bin/uv", "run", "main.py"]
            .into_iter()
            .collect();

        assert_eq!(cmd.executable(), Some("/home/me/.local/bin/uv"));
        assert_eq!(cmd.executable_name(), Some("uv"));
        assert_eq!(cmd.args(), ["run".to_string(), "main.py".to_string()]);
    }

    #[test]
    fn test_empty_command_line() {
        let cmd = CommandLine::default();

        assert!(cmd.is_empty());
        assert_eq!(cmd.executable_name(), None);
        assert!(cmd.args().is_empty());
        assert_eq!(cmd.join(), "");
    }
}
