// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Service catalog construction and network address assignment.

use parking_lot::RwLock;
use std::net::Ipv4Addr;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

use crate::domain::allocator::PortAllocator;
use crate::domain::config::parse_cidr;
use crate::domain::config_handler::ConfigHandler;
use crate::domain::error::StackError;
use crate::domain::service::{ServiceCatalog, ServiceDescriptor, ServiceRole, LOCALHOST};
use crate::infrastructure::services::{
    AwsService, DnsService, ExecService, GitLivereloadService, NodeGroup, RegistryService, ServiceDeps,
    TalosService,
};

/// First host offset handed out inside the network CIDR.
const FIRST_HOST_OFFSET: u32 = 2;

/// Concrete [`ServiceCatalog`] filled once at startup.
#[derive(Default)]
pub struct ServiceRegistry {
    services: RwLock<Vec<Arc<dyn ServiceDescriptor>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, service: Arc<dyn ServiceDescriptor>) {
        debug!(service = %service.name(), role = %service.role(), "Registered service");
        self.services.write().push(service);
    }

    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }
}

impl ServiceCatalog for ServiceRegistry {
    fn all(&self) -> Vec<Arc<dyn ServiceDescriptor>> {
        self.services.read().clone()
    }
}

/// Construct every configured descriptor into `registry`.
///
/// Order: registries by name, aws, dns, control planes, workers, git, exec.
/// Control planes come before workers so `controlplane-1` claims leadership.
pub fn build_services(
    registry: &Arc<ServiceRegistry>,
    deps: &ServiceDeps,
    allocator: Arc<PortAllocator>,
) -> Result<usize, StackError> {
    let config = deps
        .config
        .get_config()
        .map_err(|e| StackError::ConfigurationMissing(format!("unable to read configuration: {}", e)))?;

    if let Some(docker) = &config.docker {
        for name in docker.registries.keys() {
            registry.register(Arc::new(RegistryService::new(
                name.clone(),
                deps.clone(),
                Arc::clone(&allocator),
            )));
        }
    }

    if config.aws.as_ref().is_some_and(|a| a.enabled) {
        registry.register(Arc::new(AwsService::new("aws", deps.clone())));
    }

    if config.dns.as_ref().is_some_and(|d| d.enabled) {
        registry.register(Arc::new(DnsService::new("dns", deps.clone())));
    }

    if let Some(cluster) = config.cluster.as_ref().filter(|c| c.enabled) {
        if cluster.driver != "talos" {
            return Err(StackError::Validation(format!(
                "unsupported cluster driver '{}'",
                cluster.driver
            )));
        }
        let groups = [
            (NodeGroup::ControlPlane, "controlplane", cluster.controlplanes.count.unwrap_or(1)),
            (NodeGroup::Worker, "worker", cluster.workers.count.unwrap_or(1)),
        ];
        for (group, prefix, count) in groups {
            for i in 1..=count {
                registry.register(Arc::new(TalosService::new(
                    format!("{}-{}", prefix, i),
                    group,
                    deps.clone(),
                    Arc::clone(&allocator),
                )));
            }
        }
    }

    if config
        .git
        .as_ref()
        .and_then(|g| g.livereload.as_ref())
        .is_some_and(|l| l.enabled)
    {
        registry.register(Arc::new(GitLivereloadService::new("git", deps.clone())));
    }

    if config.exec.as_ref().is_some_and(|e| e.enabled) {
        let catalog: Weak<dyn ServiceCatalog> = Arc::downgrade(registry) as Weak<dyn ServiceCatalog>;
        registry.register(Arc::new(ExecService::new("exec", deps.clone(), catalog)));
    }

    info!("Configured {} services", registry.len());
    Ok(registry.len())
}

/// Give every descriptor its network address.
///
/// Under the local VM driver everything is `localhost`, in catalog order.
/// Otherwise addresses come from `network.cidr_block` starting at `.2`,
/// handed out by descriptor name. A configured `dns.address` is kept for the
/// DNS descriptor and never handed to anyone else.
pub fn assign_addresses(catalog: &dyn ServiceCatalog, config: &dyn ConfigHandler) -> Result<(), StackError> {
    let services = catalog.all();

    if config.get_string("vm.driver", "") == crate::domain::config::LOCAL_VM_DRIVER {
        for service in &services {
            service.set_address(LOCALHOST)?;
        }
        return Ok(());
    }

    let cidr = config.get_string("network.cidr_block", "");
    if cidr.is_empty() {
        debug!("No network.cidr_block configured; services keep dynamic addresses");
        return Ok(());
    }
    let (network, prefix) = parse_cidr(&cidr)
        .ok_or_else(|| StackError::Validation(format!("invalid network.cidr_block: {}", cidr)))?;
    let host_bits = 32 - u32::from(prefix);
    let size: u64 = 1u64 << host_bits;
    let base = u32::from(network);

    let dns_address = config.get_string("dns.address", "");

    let mut ordered = services;
    ordered.sort_by(|a, b| a.name().cmp(b.name()));

    let mut offset = FIRST_HOST_OFFSET;
    for service in ordered {
        if service.role() == ServiceRole::Dns && !dns_address.is_empty() {
            service.set_address(&dns_address)?;
            continue;
        }
        let address = loop {
            // last address of the block is broadcast
            if u64::from(offset) >= size.saturating_sub(1) {
                return Err(StackError::Validation(format!(
                    "network {} has no free addresses left",
                    cidr
                )));
            }
            let candidate = Ipv4Addr::from(base + offset).to_string();
            offset += 1;
            if candidate != dns_address {
                break candidate;
            }
        };
        service.set_address(&address)?;
    }
    Ok(())
}
