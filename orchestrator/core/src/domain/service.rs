// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Service descriptor abstraction.
//!
//! A descriptor is one configured infrastructure unit (AWS emulator,
//! registry, cluster node, DNS, git livereload, exec sandbox). It renders a
//! self-contained compose fragment from the current configuration and its
//! assigned network address.
//!
//! Lifecycle: constructed once at startup, address assigned once through
//! [`ServiceDescriptor::set_address`], read-only afterwards.

use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;

use crate::domain::compose::ComposeFragment;
use crate::domain::error::StackError;

pub const LOCALHOST: &str = "localhost";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceRole {
    Aws,
    Registry,
    ControlPlane,
    Worker,
    Dns,
    Git,
    Exec,
}

impl ServiceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceRole::Aws => "aws",
            ServiceRole::Registry => "registry",
            ServiceRole::ControlPlane => "controlplane",
            ServiceRole::Worker => "worker",
            ServiceRole::Dns => "dns",
            ServiceRole::Git => "git",
            ServiceRole::Exec => "exec",
        }
    }
}

impl fmt::Display for ServiceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait ServiceDescriptor: Send + Sync {
    fn name(&self) -> &str;

    /// Concrete descriptor kind; the aggregator orders descriptors by it.
    fn kind(&self) -> &'static str;

    fn role(&self) -> ServiceRole;

    /// Assigned address, `None` until [`ServiceDescriptor::set_address`] succeeds.
    fn address(&self) -> Option<String>;

    /// Fully qualified hostname (`<name>.<domain>`).
    fn hostname(&self) -> String;

    fn is_leader(&self) -> bool {
        false
    }

    /// Whether DNS should answer `*.<hostname>` for this service.
    fn supports_wildcard_dns(&self) -> bool {
        false
    }

    /// Validate and store the address, persisting derived values to configuration.
    ///
    /// Called once per descriptor. Cluster nodes reject a second assignment
    /// because it would claim a fresh set of ports.
    fn set_address(&self, address: &str) -> Result<(), StackError>;

    /// Render this descriptor's compose fragment. `Ok(None)` means the
    /// structured configuration it needs is absent.
    fn build_compose_fragment(&self) -> Result<Option<ComposeFragment>, StackError>;
}

/// Source of every configured descriptor.
pub trait ServiceCatalog: Send + Sync {
    fn all(&self) -> Vec<Arc<dyn ServiceDescriptor>>;

    fn find_by_role(&self, role: ServiceRole) -> Option<Arc<dyn ServiceDescriptor>> {
        self.all().into_iter().find(|s| s.role() == role)
    }
}

/// Accepts the literal `localhost` or a dotted-quad IPv4 address.
pub fn validate_address(address: &str) -> Result<(), StackError> {
    if address == LOCALHOST || address.parse::<Ipv4Addr>().is_ok() {
        Ok(())
    } else {
        Err(StackError::InvalidAddress(address.to_string()))
    }
}

/// True for a non-empty, non-loopback IPv4 address.
pub fn is_routable_ipv4(address: &str) -> bool {
    address
        .parse::<Ipv4Addr>()
        .map(|ip| !ip.is_loopback() && !ip.is_unspecified())
        .unwrap_or(false)
}
