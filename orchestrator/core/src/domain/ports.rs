// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Host-port and bind-mount specifications used by cluster nodes.
//!
//! Port grammar: `hostPort[:containerPort[/protocol]]`, protocol `tcp`
//! (default) or `udp`. A bare port publishes the same number on both sides.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::domain::config::PROJECT_ROOT_VAR;
use crate::domain::error::StackError;

/// Highest TCP/UDP port number.
pub const MAX_PORT: u32 = 65535;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

impl FromStr for Protocol {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            other => Err(StackError::Validation(format!(
                "invalid protocol '{}': expected tcp or udp",
                other
            ))),
        }
    }
}

/// Parsed `hostPort[:containerPort[/protocol]]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodePortSpec {
    pub host_port: u32,
    pub container_port: u32,
    pub protocol: Protocol,
}

impl NodePortSpec {
    pub fn new(host_port: u32, container_port: u32, protocol: Protocol) -> Self {
        Self { host_port, container_port, protocol }
    }

    pub fn parse(s: &str) -> Result<Self, StackError> {
        let parts: Vec<&str> = s.split(':').collect();

        match parts.as_slice() {
            [port] => {
                let port = parse_port(port, s)?;
                Ok(Self::new(port, port, Protocol::Tcp))
            }
            [host, rest] => {
                let host_port = parse_port(host, s)?;
                let (container, protocol) = match rest.split_once('/') {
                    Some((container, proto)) => (container, proto.parse::<Protocol>()?),
                    None => (*rest, Protocol::Tcp),
                };
                let container_port = parse_port(container, s)?;
                Ok(Self::new(host_port, container_port, protocol))
            }
            _ => Err(StackError::Validation(format!("invalid hostPort format: {}", s))),
        }
    }

    /// Same spec published on a different host port.
    pub fn with_host_port(self, host_port: u32) -> Self {
        Self { host_port, ..self }
    }
}

impl fmt::Display for NodePortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.host_port, self.container_port, self.protocol)
    }
}

impl FromStr for NodePortSpec {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_port(raw: &str, spec: &str) -> Result<u32, StackError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(StackError::Validation(format!(
            "invalid port '{}' in hostPort spec '{}'",
            raw, spec
        )));
    }
    match raw.parse::<u32>() {
        Ok(port) if port <= MAX_PORT => Ok(port),
        _ => Err(StackError::Validation(format!(
            "port '{}' in hostPort spec '{}' is out of range",
            raw, spec
        ))),
    }
}

/// Parsed `hostPath:containerPath[:ro|rw]` bind mount
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSpec {
    pub host_path: String,
    pub container_path: String,
    pub read_only: bool,
}

impl VolumeSpec {
    pub fn parse(s: &str) -> Result<Self, StackError> {
        let parts: Vec<&str> = s.split(':').collect();
        let (host, container, read_only) = match parts.as_slice() {
            [host, container] => (*host, *container, false),
            [host, container, "ro"] => (*host, *container, true),
            [host, container, "rw"] => (*host, *container, false),
            _ => return Err(StackError::Validation(format!("invalid volume format: {}", s))),
        };
        if host.is_empty() || container.is_empty() {
            return Err(StackError::Validation(format!("invalid volume format: {}", s)));
        }
        Ok(Self {
            host_path: host.to_string(),
            container_path: container.to_string(),
            read_only,
        })
    }

    /// Host side with the project-root placeholder expanded.
    pub fn resolve_host_path(&self, project_root: &Path) -> PathBuf {
        match self.host_path.strip_prefix(PROJECT_ROOT_VAR) {
            Some(rest) => project_root.join(rest.trim_start_matches('/')),
            None => PathBuf::from(&self.host_path),
        }
    }
}

/// Merge entries from several configuration levels, lowest precedence first.
///
/// An entry from a higher level replaces the lower-level entry with the same
/// key in place; new keys are appended in the order they are met.
pub fn merge_by_precedence<T, K, F>(levels: Vec<Vec<T>>, key: F) -> Vec<T>
where
    K: PartialEq,
    F: Fn(&T) -> K,
{
    let mut merged: Vec<T> = Vec::new();
    for level in levels {
        for entry in level {
            let k = key(&entry);
            match merged.iter().position(|existing| key(existing) == k) {
                Some(idx) => merged[idx] = entry,
                None => merged.push(entry),
            }
        }
    }
    merged
}
