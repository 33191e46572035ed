// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Host operating-system access used by descriptors and drivers.

use std::io;
use std::path::{Path, PathBuf};
use sysinfo::System;

use crate::domain::shims::Shims;

#[derive(Debug, Default, Clone, Copy)]
pub struct OsShims;

impl OsShims {
    pub fn new() -> Self {
        Self
    }
}

impl Shims for OsShims {
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        std::fs::write(path, contents)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn home_dir(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }

    fn env_var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }

    fn set_env_var(&self, key: &str, value: &str) {
        // inherited by every child process spawned afterwards
        std::env::set_var(key, value)
    }

    fn total_memory_bytes(&self) -> u64 {
        let mut system = System::new();
        system.refresh_memory();
        system.total_memory()
    }

    fn cpu_count(&self) -> usize {
        std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    }

    fn os(&self) -> &str {
        std::env::consts::OS
    }

    fn arch(&self) -> &str {
        std::env::consts::ARCH
    }
}
