// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! YAML-backed configuration store.
//!
//! The document is kept as a `serde_yaml::Value` so dotted-path lookups and
//! the typed [`ContextConfig`] snapshot always read the same data. Writes are
//! in-memory until [`ConfigHandler::save`] is called.

use parking_lot::RwLock;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::domain::config::{ContextConfig, DEFAULT_CONTEXT};
use crate::domain::config_handler::{ConfigError, ConfigHandler};

pub const CONFIG_FILE_NAME: &str = "stackyard.yaml";
pub const CONFIG_PATH_ENV: &str = "STACKYARD_CONFIG";

pub struct YamlConfigHandler {
    path: Option<PathBuf>,
    context_override: Option<String>,
    document: RwLock<Value>,
}

impl YamlConfigHandler {
    /// Handler over an empty document with no backing file.
    pub fn empty(context_override: Option<String>) -> Self {
        Self {
            path: None,
            context_override,
            document: RwLock::new(Value::Mapping(Mapping::new())),
        }
    }

    pub fn from_yaml_str(yaml: &str, context_override: Option<String>) -> Result<Self, ConfigError> {
        let document: Value = serde_yaml::from_str(yaml)?;
        Ok(Self {
            path: None,
            context_override,
            document: RwLock::new(normalize(document)),
        })
    }

    pub fn from_yaml_file(path: impl AsRef<Path>, context_override: Option<String>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut handler = Self::from_yaml_str(&content, context_override)?;
        handler.path = Some(path.to_path_buf());
        Ok(handler)
    }

    /// Discover configuration file using precedence order
    /// 1. STACKYARD_CONFIG environment variable
    /// 2. <project root>/stackyard.yaml
    /// 3. ~/.stackyard/config.yaml
    pub fn discover_config(project_root: &Path) -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let project_config = project_root.join(CONFIG_FILE_NAME);
        if project_config.exists() {
            return Some(project_config);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".stackyard").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }

    /// Load configuration with discovery, falling back to an empty document
    pub fn load_or_default(
        cli_path: Option<PathBuf>,
        project_root: &Path,
        context_override: Option<String>,
    ) -> anyhow::Result<Self> {
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            return Self::from_yaml_file(&path, context_override)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e));
        }

        if let Some(config_path) = Self::discover_config(project_root) {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            Ok(Self::from_yaml_file(config_path, context_override)?)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using empty defaults.");
            let mut handler = Self::empty(context_override);
            handler.path = Some(project_root.join(CONFIG_FILE_NAME));
            Ok(handler)
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Serialized copy of the whole document.
    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(&*self.document.read())?)
    }

    fn lookup(&self, key: &str) -> Option<Value> {
        let segments = parse_key(key).ok()?;
        let context = self.context();
        let document = self.document.read();
        let mut current = document.get("contexts")?.get(context.as_str())?;
        for segment in &segments {
            current = current.get(segment.as_str())?;
        }
        Some(current.clone())
    }
}

impl ConfigHandler for YamlConfigHandler {
    fn context(&self) -> String {
        if let Some(context) = &self.context_override {
            return context.clone();
        }
        self.document
            .read()
            .get("context")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_CONTEXT)
            .to_string()
    }

    fn get_string(&self, key: &str, default: &str) -> String {
        self.lookup(key)
            .and_then(|v| scalar_to_string(&v))
            .unwrap_or_else(|| default.to_string())
    }

    fn get_int(&self, key: &str, default: i64) -> i64 {
        match self.lookup(key) {
            Some(Value::Number(n)) => n.as_i64().unwrap_or(default),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.lookup(key) {
            Some(Value::Bool(b)) => b,
            Some(Value::String(s)) => match s.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => true,
                "false" | "0" | "no" | "off" => false,
                _ => default,
            },
            _ => default,
        }
    }

    fn get_string_slice(&self, key: &str, default: &[String]) -> Vec<String> {
        match self.lookup(key) {
            Some(Value::Sequence(items)) => items.iter().filter_map(scalar_to_string).collect(),
            _ => default.to_vec(),
        }
    }

    fn get_string_map(&self, key: &str, default: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        match self.lookup(key) {
            Some(Value::Mapping(map)) => map
                .iter()
                .filter_map(|(k, v)| Some((scalar_to_string(k)?, scalar_to_string(v)?)))
                .collect(),
            _ => default.clone(),
        }
    }

    fn get_config(&self) -> Result<ContextConfig, ConfigError> {
        let context = self.context();
        let section = {
            let document = self.document.read();
            document
                .get("contexts")
                .and_then(|c| c.get(context.as_str()))
                .cloned()
        };
        match section {
            Some(Value::Null) | None => Ok(ContextConfig::default()),
            Some(value) => Ok(serde_yaml::from_value(value)?),
        }
    }

    fn set_context_value(&self, key: &str, value: Value) -> Result<(), ConfigError> {
        let mut segments = vec!["contexts".to_string(), self.context()];
        segments.extend(parse_key(key)?);

        let mut document = self.document.write();
        let mut current: &mut Value = &mut document;
        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| invalid(key, "empty key"))?;

        for segment in parents {
            if current.is_null() {
                *current = Value::Mapping(Mapping::new());
            }
            let map = current
                .as_mapping_mut()
                .ok_or_else(|| invalid(key, &format!("'{}' is not a mapping", segment)))?;
            current = map
                .entry(Value::String(segment.clone()))
                .or_insert(Value::Null);
        }

        if current.is_null() {
            *current = Value::Mapping(Mapping::new());
        }
        let map = current
            .as_mapping_mut()
            .ok_or_else(|| invalid(key, &format!("parent of '{}' is not a mapping", last)))?;
        map.insert(Value::String(last.clone()), value);
        Ok(())
    }

    fn save(&self) -> Result<(), ConfigError> {
        let path = self.path.as_ref().ok_or(ConfigError::NoBackingFile)?;
        let yaml = self.to_yaml_string()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: path.clone(),
                source,
            })?;
        }
        std::fs::write(path, yaml).map_err(|source| ConfigError::Write {
            path: path.clone(),
            source,
        })
    }
}

/// Split a dotted key into segments; `[...]` is taken literally.
pub fn parse_key(key: &str) -> Result<Vec<String>, ConfigError> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = key.chars();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
                let mut literal = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    literal.push(c);
                }
                if !closed {
                    return Err(invalid(key, "unclosed '['"));
                }
                if literal.is_empty() {
                    return Err(invalid(key, "empty '[]' segment"));
                }
                segments.push(literal);
            }
            ']' => return Err(invalid(key, "unexpected ']'")),
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    if segments.is_empty() {
        return Err(invalid(key, "empty key"));
    }
    Ok(segments)
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidPath {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn normalize(document: Value) -> Value {
    if document.is_null() {
        Value::Mapping(Mapping::new())
    } else {
        document
    }
}
