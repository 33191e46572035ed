// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Workspace
//!
//! Wires configuration, shell, shims, the service catalog and both backend
//! drivers for a single command invocation.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Orchestrate `up`, `down`, `render` and container listing

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::application::catalog::{assign_addresses, build_services, ServiceRegistry};
use crate::application::compose_assembly::ComposeAssembler;
use crate::domain::allocator::PortAllocator;
use crate::domain::compose::{ComposeProject, ProjectAssembler};
use crate::domain::config_handler::ConfigHandler;
use crate::domain::error::StackError;
use crate::domain::shell::Shell;
use crate::domain::shims::Shims;
use crate::infrastructure::services::ServiceDeps;
use crate::infrastructure::virt::docker::COMPOSE_FILE_ENV;
use crate::infrastructure::virt::{ColimaVirt, ContainerInfo, DockerVirt};

/// Files written by [`Workspace::render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifacts {
    pub compose_file: PathBuf,
    pub vm_config: Option<PathBuf>,
}

pub struct Workspace {
    config: Arc<dyn ConfigHandler>,
    shims: Arc<dyn Shims>,
    catalog: Arc<ServiceRegistry>,
    assembler: Arc<ComposeAssembler>,
    docker: DockerVirt,
    colima: ColimaVirt,
    addresses_assigned: parking_lot::Mutex<bool>,
}

impl Workspace {
    pub fn new(
        config: Arc<dyn ConfigHandler>,
        shell: Arc<dyn Shell>,
        shims: Arc<dyn Shims>,
    ) -> Result<Self, StackError> {
        let deps = ServiceDeps::new(Arc::clone(&config), Arc::clone(&shell), Arc::clone(&shims));
        let catalog = Arc::new(ServiceRegistry::new());
        build_services(&catalog, &deps, Arc::new(PortAllocator::default()))?;

        let assembler = Arc::new(ComposeAssembler::new(Arc::clone(&config), catalog.clone()));
        let docker = DockerVirt::new(
            Arc::clone(&config),
            Arc::clone(&shell),
            Arc::clone(&shims),
            catalog.clone(),
            assembler.clone(),
        );
        let colima = ColimaVirt::new(Arc::clone(&config), shell, Arc::clone(&shims));

        Ok(Self {
            config,
            shims,
            catalog,
            assembler,
            docker,
            colima,
            addresses_assigned: parking_lot::Mutex::new(false),
        })
    }

    /// Shorten backend retry and poll waits.
    pub fn with_waits(mut self, wait: Duration) -> Self {
        self.docker = self.docker.with_retry_wait(wait);
        self.colima = self.colima.with_poll_wait(wait);
        self
    }

    pub fn catalog(&self) -> &Arc<ServiceRegistry> {
        &self.catalog
    }

    pub fn docker(&self) -> &DockerVirt {
        &self.docker
    }

    pub fn colima(&self) -> &ColimaVirt {
        &self.colima
    }

    /// Merged project without writing anything to disk.
    pub fn assemble(&self) -> Result<ComposeProject, StackError> {
        self.ensure_addresses()?;
        self.assembler.assemble()
    }

    /// Write the VM config and the compose file, then persist configuration.
    pub fn render(&self) -> Result<RenderedArtifacts, StackError> {
        let vm_config = self.colima.write_config()?;
        self.ensure_addresses()?;
        let compose_file = self.docker.write_config()?;
        self.save_config()?;
        Ok(RenderedArtifacts { compose_file, vm_config })
    }

    pub async fn up(&self) -> Result<RenderedArtifacts, StackError> {
        let vm_config = self.colima.write_config()?;
        if self.colima.is_enabled() {
            self.colima.up().await?;
        }

        self.ensure_addresses()?;
        self.docker.initialize().await?;
        let compose_file = self.docker.write_config()?;
        self.shims
            .set_env_var(COMPOSE_FILE_ENV, &compose_file.display().to_string());
        self.docker.up().await?;

        self.save_config()?;
        info!("Context '{}' is up", self.config.context());
        Ok(RenderedArtifacts { compose_file, vm_config })
    }

    pub async fn down(&self) -> Result<(), StackError> {
        self.docker.initialize().await?;
        let compose_file = self.docker.compose_file_path();
        self.shims
            .set_env_var(COMPOSE_FILE_ENV, &compose_file.display().to_string());
        self.docker.down().await?;

        if self.colima.is_enabled() {
            self.colima.down().await?;
        }
        info!("Context '{}' is down", self.config.context());
        Ok(())
    }

    pub async fn containers(&self, name: Option<&str>) -> Result<Vec<ContainerInfo>, StackError> {
        self.docker.get_container_info(name).await
    }

    fn ensure_addresses(&self) -> Result<(), StackError> {
        let mut assigned = self.addresses_assigned.lock();
        if !*assigned {
            assign_addresses(self.catalog.as_ref(), self.config.as_ref())?;
            *assigned = true;
        }
        Ok(())
    }

    fn save_config(&self) -> Result<(), StackError> {
        self.config
            .save()
            .map_err(|e| StackError::write("configuration file", e))
    }
}
