// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Shell execution boundary.
//!
//! The drivers never spawn processes themselves; they go through [`Shell`] so
//! the external tools (compose, VM manager, container runtime CLI) can be
//! swapped for a recording fake in tests.

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Failure of one external invocation, carrying whatever output was captured.
#[derive(Debug, Clone, Error)]
pub struct ShellError {
    pub command: String,
    pub args: Vec<String>,
    pub reason: String,
    pub output: String,
}

impl ShellError {
    pub fn new(command: &str, args: &[&str], reason: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            command: command.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            reason: reason.into(),
            output: output.into(),
        }
    }

    /// Full command line as it would be typed.
    pub fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` failed: {}", self.command_line(), self.reason)?;
        let output = self.output.trim();
        if !output.is_empty() {
            write!(f, "\n{}", output)?;
        }
        Ok(())
    }
}

#[async_trait]
pub trait Shell: Send + Sync {
    /// Run a command without user-visible progress, returning combined stdout+stderr.
    async fn exec_silent(&self, command: &str, args: &[&str]) -> Result<String, ShellError>;

    /// Run a command while showing `message` as progress, returning combined output.
    async fn exec_progress(&self, message: &str, command: &str, args: &[&str]) -> Result<String, ShellError>;

    /// Root directory of the project the environment belongs to.
    fn project_root(&self) -> &Path;
}

/// Split a possibly multi-word command spelling (`"docker compose"`) into the
/// program and its leading arguments.
pub fn split_command(spelling: &str) -> (String, Vec<String>) {
    let mut parts = spelling.split_whitespace().map(str::to_string);
    let program = parts.next().unwrap_or_default();
    (program, parts.collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_captured_output() {
        let err = ShellError::new("docker", &["compose", "up"], "exit status 1", "network not found\n");
        let text = err.to_string();
        assert!(text.starts_with("`docker compose up` failed: exit status 1"));
        assert!(text.ends_with("network not found"));
    }

    #[test]
    fn test_display_without_output() {
        let err = ShellError::new("colima", &["stop"], "not found", "  ");
        assert_eq!(err.to_string(), "`colima stop` failed: not found");
    }

    #[test]
    fn test_split_command() {
        assert_eq!(split_command("docker compose"), ("docker".to_string(), vec!["compose".to_string()]));
        assert_eq!(split_command("docker-compose"), ("docker-compose".to_string(), vec![]));
    }
}
