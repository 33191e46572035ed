// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Compose Assembly
//!
//! Merges the fragments of every registered descriptor into one
//! [`ComposeProject`] attached to the context's shared bridge network.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Deterministic fan-in of descriptor fragments

use std::sync::Arc;
use tracing::debug;

use crate::domain::compose::{
    ComposeProject, IpamConfig, IpamPool, NetworkSpec, ProjectAssembler, ServiceNetwork,
};
use crate::domain::config::network_name;
use crate::domain::config_handler::ConfigHandler;
use crate::domain::error::StackError;
use crate::domain::service::{is_routable_ipv4, ServiceCatalog};

pub struct ComposeAssembler {
    config: Arc<dyn ConfigHandler>,
    catalog: Arc<dyn ServiceCatalog>,
}

impl ComposeAssembler {
    pub fn new(config: Arc<dyn ConfigHandler>, catalog: Arc<dyn ServiceCatalog>) -> Self {
        Self { config, catalog }
    }

    pub fn network_name(&self) -> String {
        network_name(&self.config.context())
    }
}

impl ProjectAssembler for ComposeAssembler {
    fn assemble(&self) -> Result<ComposeProject, StackError> {
        let mut descriptors = self.catalog.all();
        descriptors.sort_by(|a, b| a.kind().cmp(b.kind()));

        if !self.config.get_bool("docker.enabled", false) {
            return Err(StackError::Validation(format!(
                "docker is not enabled for context '{}'",
                self.config.context()
            )));
        }

        let network = self.network_name();
        let cidr = self.config.get_string("network.cidr_block", "");

        let mut shared = NetworkSpec::bridge();
        shared.name = Some(network.clone());
        if !cidr.is_empty() {
            shared.ipam = Some(IpamConfig {
                config: vec![IpamPool { subnet: cidr.clone() }],
            });
        }

        let mut project = ComposeProject::default();
        project.networks.insert(network.clone(), shared);

        for descriptor in descriptors {
            let fragment = match descriptor.build_compose_fragment()? {
                Some(fragment) if !fragment.is_empty() => fragment,
                _ => {
                    debug!(service = %descriptor.name(), "Skipping empty compose fragment");
                    continue;
                }
            };

            let static_ip = descriptor
                .address()
                .filter(|addr| !cidr.is_empty() && is_routable_ipv4(addr));

            for mut service in fragment.services {
                service.networks.insert(
                    network.clone(),
                    ServiceNetwork { ipv4_address: static_ip.clone() },
                );
                match project.services.iter().position(|s| s.name == service.name) {
                    Some(idx) => project.services[idx] = service,
                    None => project.services.push(service),
                }
            }

            if let Some(volumes) = fragment.volumes {
                project.volumes.extend(volumes);
            }
            if let Some(networks) = fragment.networks {
                project.networks.extend(networks);
            }
        }

        debug!(
            "Assembled compose project with {} services, {} volumes",
            project.services.len(),
            project.volumes.len()
        );
        Ok(project)
    }
}
