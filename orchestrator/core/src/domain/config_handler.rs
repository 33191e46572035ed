// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration lookup/persist boundary.
//!
//! Keys are dotted paths relative to the active context
//! (`cluster.workers.nodes.worker-1.hostports`). A bracketed segment is taken
//! literally, so names containing dots can be addressed:
//! `docker.registries[gcr.io].hostport`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::domain::config::ContextConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write configuration {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid key '{key}': {reason}")]
    InvalidPath { key: String, reason: String },

    #[error("Configuration has no backing file to save to")]
    NoBackingFile,
}

pub trait ConfigHandler: Send + Sync {
    /// Name of the active context.
    fn context(&self) -> String;

    fn get_string(&self, key: &str, default: &str) -> String;

    fn get_int(&self, key: &str, default: i64) -> i64;

    fn get_bool(&self, key: &str, default: bool) -> bool;

    fn get_string_slice(&self, key: &str, default: &[String]) -> Vec<String>;

    fn get_string_map(&self, key: &str, default: &BTreeMap<String, String>) -> BTreeMap<String, String>;

    /// Typed snapshot of the active context.
    fn get_config(&self) -> Result<ContextConfig, ConfigError>;

    /// Write a value at `key` inside the active context.
    fn set_context_value(&self, key: &str, value: serde_yaml::Value) -> Result<(), ConfigError>;

    /// Flush the document to its backing store.
    fn save(&self) -> Result<(), ConfigError>;
}
