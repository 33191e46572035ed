// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use stackyard_core::config::{ContextConfig, DEFAULT_DOMAIN};
use stackyard_core::config_handler::ConfigHandler;
use stackyard_core::infrastructure::config_handler::{CONFIG_FILE_NAME, CONFIG_PATH_ENV};
use stackyard_core::shell::Shell;

use super::{load_config, project_shell, GlobalArgs};

pub const MINIMAL_TEMPLATE: &str = include_str!("../../templates/config-minimal.yaml");
pub const EXAMPLES_TEMPLATE: &str = include_str!("../../templates/config-with-examples.yaml");

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./stackyard.yaml)
        #[arg(short, long, default_value = "./stackyard.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn handle_command(command: ConfigCommand, global: &GlobalArgs) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(global, paths),
        ConfigCommand::Validate { file } => {
            let global = GlobalArgs {
                config: file.or_else(|| global.config.clone()),
                context: global.context.clone(),
            };
            validate(&global)
        }
        ConfigCommand::Generate {
            output,
            examples,
            force,
        } => generate(output, examples, force),
    }
}

fn show(global: &GlobalArgs, show_paths: bool) -> Result<()> {
    let shell = project_shell()?;
    let handler = load_config(global, shell.project_root())?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &global.config {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        println!(
            "  2. {}: {}",
            CONFIG_PATH_ENV,
            std::env::var(CONFIG_PATH_ENV)
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. {}", shell.project_root().join(CONFIG_FILE_NAME).display());
        println!("  4. ~/.stackyard/config.yaml");
        println!();
    }

    let config = handler.get_config().context("Failed to read context configuration")?;

    println!("{}", "Current configuration:".bold());
    if let Some(path) = handler.path() {
        println!("  File: {}", path.display());
    }
    println!("  Context: {}", handler.context());
    println!();

    print_summary(&config);
    Ok(())
}

fn enabled(flag: bool) -> String {
    if flag {
        "enabled".green().to_string()
    } else {
        "disabled".dimmed().to_string()
    }
}

fn print_summary(config: &ContextConfig) {
    let docker = config.docker.clone().unwrap_or_default();
    println!("{}", "Docker:".bold());
    println!("  Compose: {}", enabled(docker.enabled));
    for (name, registry) in &docker.registries {
        match &registry.remote {
            Some(remote) => println!("  {} → {}", name.bold(), remote),
            None => println!("  {} (local)", name.bold()),
        }
    }
    println!();

    let vm = config.vm.clone().unwrap_or_default();
    println!("{}", "VM:".bold());
    println!("  Driver: {}", vm.driver.as_deref().unwrap_or("(none)"));
    if let Some(address) = &vm.address {
        println!("  Address: {}", address);
    }
    println!();

    if let Some(cluster) = &config.cluster {
        println!("{}", "Cluster:".bold());
        println!("  State: {}", enabled(cluster.enabled));
        println!("  Driver: {}", cluster.driver);
        println!("  Control planes: {}", cluster.controlplanes.count.unwrap_or(1));
        println!("  Workers: {}", cluster.workers.count.unwrap_or(0));
        println!();
    }

    println!("{}", "Services:".bold());
    let aws = config.aws.as_ref().map(|a| a.enabled).unwrap_or(false);
    println!("  AWS emulator: {}", enabled(aws));
    let dns = config.dns.clone().unwrap_or_default();
    println!(
        "  DNS: {} (domain {})",
        enabled(dns.enabled),
        dns.domain.as_deref().unwrap_or(DEFAULT_DOMAIN)
    );
    let livereload = config
        .git
        .as_ref()
        .and_then(|g| g.livereload.as_ref())
        .map(|l| l.enabled)
        .unwrap_or(false);
    println!("  Git livereload: {}", enabled(livereload));
    let exec = config.exec.as_ref().map(|e| e.enabled).unwrap_or(false);
    println!("  Exec sandbox: {}", enabled(exec));
    if let Some(cidr) = config.network.as_ref().and_then(|n| n.cidr_block.as_deref()) {
        println!("  Network CIDR: {}", cidr);
    }
    println!();
}

fn validate(global: &GlobalArgs) -> Result<()> {
    println!("Validating configuration...");

    let shell = project_shell()?;
    let handler = load_config(global, shell.project_root())?;
    let config = handler
        .get_config()
        .context("Failed to read context configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

fn generate(output: PathBuf, with_examples: bool, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }

    let sample = if with_examples {
        EXAMPLES_TEMPLATE
    } else {
        MINIMAL_TEMPLATE
    };

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackyard_core::infrastructure::YamlConfigHandler;

    fn parsed(template: &str) -> ContextConfig {
        YamlConfigHandler::from_yaml_str(template, None)
            .unwrap()
            .get_config()
            .unwrap()
    }

    #[test]
    fn test_minimal_template_is_valid() {
        let config = parsed(MINIMAL_TEMPLATE);
        config.validate().unwrap();
        assert!(config.docker.unwrap().enabled);
    }

    #[test]
    fn test_examples_template_is_valid() {
        let config = parsed(EXAMPLES_TEMPLATE);
        config.validate().unwrap();
        let cluster = config.cluster.unwrap();
        assert!(cluster.enabled);
        assert_eq!(cluster.workers.count, Some(1));
    }

    #[test]
    fn test_generate_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("stackyard.yaml");

        generate(output.clone(), false, false).unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), MINIMAL_TEMPLATE);

        assert!(generate(output.clone(), true, false).is_err());
        generate(output.clone(), true, true).unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), EXAMPLES_TEMPLATE);
    }
}
