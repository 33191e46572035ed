// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # stackyard CLI
//!
//! The `stackyard` binary renders and drives a per-project local environment:
//! a compose project of emulators, registries and cluster nodes, optionally
//! inside a Colima VM.
//!
//! ## Commands
//!
//! - `stackyard up|down` - Start or tear down the environment
//! - `stackyard render` - Write the compose file and VM config without starting anything
//! - `stackyard containers [NAME]` - List managed containers and their addresses
//! - `stackyard config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use stackyard_cli::commands::{self, ConfigCommand, GlobalArgs};

/// stackyard - Local development environments on compose
#[derive(Parser)]
#[command(name = "stackyard")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "STACKYARD_CONFIG",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Context to operate on (overrides the `context` key of the file)
    #[arg(long, global = true, env = "STACKYARD_CONTEXT")]
    context: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "STACKYARD_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render configuration and start the environment
    #[command(name = "up")]
    Up,

    /// Stop the environment and remove its volumes
    #[command(name = "down")]
    Down,

    /// Write the compose file (and VM config) without starting anything
    #[command(name = "render")]
    Render {
        /// Print the compose project instead of writing files
        #[arg(long)]
        stdout: bool,
    },

    /// List managed containers of the active context
    #[command(name = "containers")]
    Containers {
        /// Only show the container of this service
        #[arg(value_name = "NAME")]
        name: Option<String>,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    let global = GlobalArgs {
        config: cli.config,
        context: cli.context,
    };

    match cli.command {
        Some(Commands::Up) => commands::stack::up(&global).await,
        Some(Commands::Down) => commands::stack::down(&global).await,
        Some(Commands::Render { stdout }) => commands::stack::render(&global, stdout),
        Some(Commands::Containers { name }) => {
            commands::stack::containers(&global, name.as_deref()).await
        }
        Some(Commands::Config { command }) => commands::config::handle_command(command, &global),
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
