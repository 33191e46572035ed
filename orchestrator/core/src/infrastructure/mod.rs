// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod config_handler;
pub mod services;
pub mod shell;
pub mod shims;
pub mod virt;

pub use config_handler::YamlConfigHandler;
pub use shell::SystemShell;
pub use shims::OsShims;
