// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Container registry / pull-through cache descriptor.
//!
//! A registry with a `remote` proxies that upstream. Without one it is a
//! local push target: under the local VM driver it claims a host port
//! through the shared allocator and the synthesized `docker.registry_url`
//! points at that port, otherwise at the in-network port.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::domain::allocator::PortAllocator;
use crate::domain::compose::{ComposeFragment, PortBinding, ServiceVolume};
use crate::domain::config::RegistryConfig;
use crate::domain::error::StackError;
use crate::domain::service::{ServiceDescriptor, ServiceRole};

use super::base::{BaseService, ServiceDeps};

pub const REGISTRY_IMAGE: &str = "registry:2.8.3";
pub const REGISTRY_PORT: u32 = 5000;
pub const DEFAULT_REGISTRY_HOST_PORT: u32 = 5001;
const CACHE_DIR: &str = ".docker-cache";

pub struct RegistryService {
    base: BaseService,
    allocator: Arc<PortAllocator>,
    host_port: RwLock<Option<u32>>,
}

impl RegistryService {
    pub fn new(name: impl Into<String>, deps: ServiceDeps, allocator: Arc<PortAllocator>) -> Self {
        Self {
            base: BaseService::new(name, deps),
            allocator,
            host_port: RwLock::new(None),
        }
    }

    pub fn host_port(&self) -> Option<u32> {
        *self.host_port.read()
    }

    fn key(&self, field: &str) -> String {
        format!("docker.registries[{}].{}", self.base.name(), field)
    }

    fn registry_config(&self) -> Result<Option<RegistryConfig>, StackError> {
        let Some(docker) = self.base.snapshot()?.docker else {
            return Ok(None);
        };
        docker
            .registries
            .get(self.base.name())
            .cloned()
            .map(Some)
            .ok_or_else(|| StackError::NotFound(format!("no registry found with name: {}", self.base.name())))
    }
}

impl ServiceDescriptor for RegistryService {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn kind(&self) -> &'static str {
        "RegistryService"
    }

    fn role(&self) -> ServiceRole {
        ServiceRole::Registry
    }

    fn address(&self) -> Option<String> {
        self.base.address()
    }

    fn hostname(&self) -> String {
        self.base.hostname()
    }

    fn set_address(&self, address: &str) -> Result<(), StackError> {
        self.base.store_address(address)?;

        let hostname = self.base.hostname();
        self.base.persist(&self.key("hostname"), hostname.as_str())?;

        let Some(registry) = self.registry_config()? else {
            return Ok(());
        };
        if registry.remote.is_some() {
            return Ok(());
        }

        if self.base.is_localhost_mode() {
            let candidate = registry.hostport.unwrap_or(DEFAULT_REGISTRY_HOST_PORT);
            let port = self.allocator.reserve_host_port(candidate)?;
            self.base.persist(&self.key("hostport"), port)?;
            self.base
                .persist("docker.registry_url", format!("{}:{}", hostname, port))?;
            *self.host_port.write() = Some(port);
        } else {
            self.base
                .persist("docker.registry_url", format!("{}:{}", hostname, REGISTRY_PORT))?;
        }
        Ok(())
    }

    fn build_compose_fragment(&self) -> Result<Option<ComposeFragment>, StackError> {
        let Some(registry) = self.registry_config()? else {
            return Ok(None);
        };

        let mut spec = self.base.service_spec(ServiceRole::Registry, REGISTRY_IMAGE);
        if let Some(remote) = &registry.remote {
            spec.environment.insert("REGISTRY_PROXY_REMOTEURL".into(), remote.clone());
        }
        if let Some(local) = &registry.local {
            spec.environment.insert("REGISTRY_PROXY_LOCALURL".into(), local.clone());
        }

        let cache_dir = self.base.state_dir().join(CACHE_DIR);
        self.base
            .shims()
            .create_dir_all(&cache_dir)
            .map_err(|e| StackError::filesystem("create registry cache directory", &cache_dir, e))?;
        spec.volumes.push(ServiceVolume::bind(
            cache_dir.display().to_string(),
            "/var/lib/registry",
            false,
        ));

        if let Some(port) = self.host_port().or(registry.hostport) {
            spec.ports.push(PortBinding::new(REGISTRY_PORT, port, "tcp"));
        }

        Ok(Some(ComposeFragment::with_service(spec)))
    }
}
