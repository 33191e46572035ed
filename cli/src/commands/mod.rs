// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the stackyard CLI

pub mod config;
pub mod stack;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use stackyard_core::infrastructure::{SystemShell, YamlConfigHandler};

pub use self::config::ConfigCommand;

/// Flags shared by every command.
#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    pub config: Option<PathBuf>,
    pub context: Option<String>,
}

/// Project root discovered from the working directory.
pub fn project_shell() -> Result<SystemShell> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(SystemShell::discover(&cwd))
}

pub fn load_config(global: &GlobalArgs, project_root: &Path) -> Result<YamlConfigHandler> {
    YamlConfigHandler::load_or_default(global.config.clone(), project_root, global.context.clone())
        .context("Failed to load configuration")
}
