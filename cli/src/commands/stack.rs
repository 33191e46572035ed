// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Environment lifecycle commands
//!
//! Commands: up, down, render, containers

use anyhow::{Context, Result};
use colored::Colorize;
use std::sync::Arc;
use tracing::info;

use stackyard_core::application::{RenderedArtifacts, Workspace};
use stackyard_core::config_handler::ConfigHandler;
use stackyard_core::infrastructure::OsShims;
use stackyard_core::shell::Shell;

use super::{load_config, project_shell, GlobalArgs};

fn workspace(global: &GlobalArgs) -> Result<Workspace> {
    let shell = project_shell()?;
    let config = load_config(global, shell.project_root())?;
    info!(context = %config.context(), "Preparing workspace");

    Workspace::new(Arc::new(config), Arc::new(shell), Arc::new(OsShims))
        .context("Failed to prepare services")
}

fn print_artifacts(artifacts: &RenderedArtifacts) {
    if let Some(vm_config) = &artifacts.vm_config {
        println!("  VM config:    {}", vm_config.display());
    }
    println!("  Compose file: {}", artifacts.compose_file.display());
}

pub async fn up(global: &GlobalArgs) -> Result<()> {
    let workspace = workspace(global)?;
    let artifacts = workspace.up().await.context("Failed to start environment")?;

    println!("{}", "✓ Environment is up".green());
    print_artifacts(&artifacts);
    Ok(())
}

pub async fn down(global: &GlobalArgs) -> Result<()> {
    let workspace = workspace(global)?;
    workspace.down().await.context("Failed to stop environment")?;

    println!("{}", "✓ Environment is down".green());
    Ok(())
}

pub fn render(global: &GlobalArgs, to_stdout: bool) -> Result<()> {
    let workspace = workspace(global)?;

    if to_stdout {
        let project = workspace.assemble().context("Failed to assemble compose project")?;
        print!("{}", project.to_yaml().context("Failed to serialize compose project")?);
        return Ok(());
    }

    let artifacts = workspace.render().context("Failed to render environment")?;
    println!("{}", "✓ Environment rendered".green());
    print_artifacts(&artifacts);
    Ok(())
}

pub async fn containers(global: &GlobalArgs, name: Option<&str>) -> Result<()> {
    let workspace = workspace(global)?;
    let containers = workspace
        .containers(name)
        .await
        .context("Failed to inspect containers")?;

    if containers.is_empty() {
        match name {
            Some(name) => println!("{}", format!("No managed container named '{}'", name).yellow()),
            None => println!("{}", "No managed containers running".yellow()),
        }
        return Ok(());
    }

    let width = containers.iter().map(|c| c.name.len()).max().unwrap_or(0);
    for container in &containers {
        let address = if container.address.is_empty() {
            "(no address)".dimmed().to_string()
        } else {
            container.address.clone()
        };
        let name = format!("{:width$}", container.name, width = width);
        println!("  {}  {}", name.bold(), address);
    }
    Ok(())
}
