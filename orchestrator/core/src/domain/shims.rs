// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Injected operating-system calls.
//!
//! Every filesystem, environment and host-introspection touch made by the
//! core goes through this trait so tests can substitute failures without
//! rebinding globals.

use std::io;
use std::path::{Path, PathBuf};

pub trait Shims: Send + Sync {
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;

    fn home_dir(&self) -> Option<PathBuf>;

    fn env_var(&self, key: &str) -> Option<String>;

    fn set_env_var(&self, key: &str, value: &str);

    /// Physical memory of the host in bytes.
    fn total_memory_bytes(&self) -> u64;

    fn cpu_count(&self) -> usize;

    /// Host operating system, as in `std::env::consts::OS`.
    fn os(&self) -> &str;

    /// Host architecture, as in `std::env::consts::ARCH`.
    fn arch(&self) -> &str;
}
