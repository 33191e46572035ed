// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use stackyard_core::config::ContextConfig;
use stackyard_core::config_handler::{ConfigError, ConfigHandler};
use stackyard_core::infrastructure::services::ServiceDeps;
use stackyard_core::infrastructure::YamlConfigHandler;
use stackyard_core::shell::{Shell, ShellError};
use stackyard_core::shims::Shims;

// ===== Shell =====

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub progress: bool,
    pub command_line: String,
}

type Handler = Box<dyn Fn(&str) -> Result<String, String> + Send + Sync>;

/// Shell that records every invocation. The handler receives the full
/// command line; `Err(output)` becomes a non-zero exit carrying that output.
pub struct MockShell {
    root: PathBuf,
    calls: Mutex<Vec<RecordedCall>>,
    handler: Handler,
}

impl MockShell {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_handler(root, |_| Ok(String::new()))
    }

    pub fn with_handler<F>(root: impl Into<PathBuf>, handler: F) -> Self
    where
        F: Fn(&str) -> Result<String, String> + Send + Sync + 'static,
    {
        Self {
            root: root.into(),
            calls: Mutex::new(Vec::new()),
            handler: Box::new(handler),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.command_line.clone()).collect()
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.command_line.contains(needle))
            .count()
    }

    fn run(&self, progress: bool, command: &str, args: &[&str]) -> Result<String, ShellError> {
        let command_line = std::iter::once(command)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.lock().push(RecordedCall {
            progress,
            command_line: command_line.clone(),
        });
        (self.handler)(&command_line).map_err(|output| ShellError::new(command, args, "exit status 1", output))
    }
}

#[async_trait]
impl Shell for MockShell {
    async fn exec_silent(&self, command: &str, args: &[&str]) -> Result<String, ShellError> {
        self.run(false, command, args)
    }

    async fn exec_progress(&self, _message: &str, command: &str, args: &[&str]) -> Result<String, ShellError> {
        self.run(true, command, args)
    }

    fn project_root(&self) -> &Path {
        &self.root
    }
}

// ===== Configuration =====

/// Delegates to a YAML handler but refuses writes to keys containing `needle`.
pub struct FailingConfig {
    inner: YamlConfigHandler,
    needle: String,
    pub attempted: Mutex<Vec<String>>,
}

impl FailingConfig {
    pub fn new(yaml: &str, needle: &str) -> Self {
        Self {
            inner: YamlConfigHandler::from_yaml_str(yaml, None).unwrap(),
            needle: needle.to_string(),
            attempted: Mutex::new(Vec::new()),
        }
    }
}

impl ConfigHandler for FailingConfig {
    fn context(&self) -> String {
        self.inner.context()
    }

    fn get_string(&self, key: &str, default: &str) -> String {
        self.inner.get_string(key, default)
    }

    fn get_int(&self, key: &str, default: i64) -> i64 {
        self.inner.get_int(key, default)
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.inner.get_bool(key, default)
    }

    fn get_string_slice(&self, key: &str, default: &[String]) -> Vec<String> {
        self.inner.get_string_slice(key, default)
    }

    fn get_string_map(&self, key: &str, default: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        self.inner.get_string_map(key, default)
    }

    fn get_config(&self) -> Result<ContextConfig, ConfigError> {
        self.inner.get_config()
    }

    fn set_context_value(&self, key: &str, value: serde_yaml::Value) -> Result<(), ConfigError> {
        self.attempted.lock().push(key.to_string());
        if key.contains(&self.needle) {
            return Err(ConfigError::Write {
                path: PathBuf::from("stackyard.yaml"),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only config"),
            });
        }
        self.inner.set_context_value(key, value)
    }

    fn save(&self) -> Result<(), ConfigError> {
        Ok(())
    }
}

// ===== Shims =====

/// In-memory shims recording every filesystem effect.
pub struct RecordingShims {
    pub home: PathBuf,
    pub env: Mutex<HashMap<String, String>>,
    pub created_dirs: Mutex<BTreeSet<PathBuf>>,
    pub files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
    pub removed: Mutex<Vec<PathBuf>>,
    pub fail_create_dir: bool,
    pub fail_rename: bool,
    pub total_memory: u64,
    pub cpus: usize,
    pub os_name: String,
    pub arch_name: String,
}

impl RecordingShims {
    pub fn new() -> Self {
        Self {
            home: PathBuf::from("/home/dev"),
            env: Mutex::new(HashMap::new()),
            created_dirs: Mutex::new(BTreeSet::new()),
            files: Mutex::new(BTreeMap::new()),
            removed: Mutex::new(Vec::new()),
            fail_create_dir: false,
            fail_rename: false,
            total_memory: 16 * 1024 * 1024 * 1024,
            cpus: 8,
            os_name: "linux".to_string(),
            arch_name: "x86_64".to_string(),
        }
    }

    pub fn with_env(self, key: &str, value: &str) -> Self {
        self.env.lock().insert(key.to_string(), value.to_string());
        self
    }

    pub fn file(&self, path: &Path) -> Option<String> {
        self.files
            .lock()
            .get(path)
            .map(|b| String::from_utf8_lossy(b).to_string())
    }
}

impl Shims for RecordingShims {
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        if self.fail_create_dir {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "mkdir denied"));
        }
        self.created_dirs.lock().insert(path.to_path_buf());
        Ok(())
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        self.files.lock().insert(path.to_path_buf(), contents.to_vec());
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        if self.fail_rename {
            return Err(io::Error::new(io::ErrorKind::Other, "rename denied"));
        }
        let mut files = self.files.lock();
        let contents = files
            .remove(from)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))?;
        files.insert(to.to_path_buf(), contents);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.files.lock().remove(path);
        self.removed.lock().push(path.to_path_buf());
        Ok(())
    }

    fn home_dir(&self) -> Option<PathBuf> {
        Some(self.home.clone())
    }

    fn env_var(&self, key: &str) -> Option<String> {
        self.env.lock().get(key).cloned()
    }

    fn set_env_var(&self, key: &str, value: &str) {
        self.env.lock().insert(key.to_string(), value.to_string());
    }

    fn total_memory_bytes(&self) -> u64 {
        self.total_memory
    }

    fn cpu_count(&self) -> usize {
        self.cpus
    }

    fn os(&self) -> &str {
        &self.os_name
    }

    fn arch(&self) -> &str {
        &self.arch_name
    }
}

// ===== Fixtures =====

pub const PROJECT_ROOT: &str = "/work/project";

pub fn yaml_config(yaml: &str) -> Arc<YamlConfigHandler> {
    Arc::new(YamlConfigHandler::from_yaml_str(yaml, None).unwrap())
}

pub struct Fixture {
    pub config: Arc<YamlConfigHandler>,
    pub shell: Arc<MockShell>,
    pub shims: Arc<RecordingShims>,
}

impl Fixture {
    pub fn new(yaml: &str) -> Self {
        Self::with_shims(yaml, RecordingShims::new())
    }

    pub fn with_shims(yaml: &str, shims: RecordingShims) -> Self {
        Self {
            config: yaml_config(yaml),
            shell: Arc::new(MockShell::new(PROJECT_ROOT)),
            shims: Arc::new(shims),
        }
    }

    pub fn deps(&self) -> ServiceDeps {
        ServiceDeps::new(self.config.clone(), self.shell.clone(), self.shims.clone())
    }
}
