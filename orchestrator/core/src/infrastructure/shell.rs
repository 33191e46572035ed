// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Process-backed [`Shell`] implementation.

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::domain::shell::{Shell, ShellError};

/// Files whose presence marks a project root.
const ROOT_MARKERS: &[&str] = &["stackyard.yaml", ".git"];

pub struct SystemShell {
    project_root: PathBuf,
}

impl SystemShell {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self { project_root: project_root.into() }
    }

    /// Walk up from `start` to the nearest directory holding a root marker.
    /// Falls back to `start` itself.
    pub fn discover(start: &Path) -> Self {
        let root = start
            .ancestors()
            .find(|dir| ROOT_MARKERS.iter().any(|marker| dir.join(marker).exists()))
            .unwrap_or(start);
        Self::new(root)
    }

    async fn run(&self, command: &str, args: &[&str]) -> Result<String, ShellError> {
        debug!("Executing: {} {}", command, args.join(" "));

        let output = Command::new(command)
            .args(args)
            .current_dir(&self.project_root)
            .output()
            .await
            .map_err(|e| {
                let reason = if which::which(command).is_err() {
                    format!("{} not found in PATH", command)
                } else {
                    e.to_string()
                };
                ShellError::new(command, args, reason, "")
            })?;

        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        if output.status.success() {
            return Ok(combined);
        }

        let reason = match output.status.code() {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        };
        Err(ShellError::new(command, args, reason, combined))
    }
}

#[async_trait]
impl Shell for SystemShell {
    async fn exec_silent(&self, command: &str, args: &[&str]) -> Result<String, ShellError> {
        self.run(command, args).await
    }

    async fn exec_progress(&self, message: &str, command: &str, args: &[&str]) -> Result<String, ShellError> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));

        let result = self.run(command, args).await;

        match &result {
            Ok(_) => spinner.finish_with_message(format!("✓ {}", message)),
            Err(_) => spinner.finish_with_message(format!("✗ {}", message)),
        }
        result
    }

    fn project_root(&self) -> &Path {
        &self.project_root
    }
}
