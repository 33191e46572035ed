// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! CoreDNS descriptor. The Corefile is read from the state directory.

use crate::domain::compose::{ComposeFragment, PortBinding, ServiceVolume};
use crate::domain::error::StackError;
use crate::domain::service::{is_routable_ipv4, ServiceDescriptor, ServiceRole};

use super::base::{BaseService, ServiceDeps};

pub const COREDNS_IMAGE: &str = "coredns/coredns:1.11.3";
pub const COREFILE_NAME: &str = "Corefile";
const COREFILE_TARGET: &str = "/etc/coredns/Corefile";

pub struct DnsService {
    base: BaseService,
}

impl DnsService {
    pub fn new(name: impl Into<String>, deps: ServiceDeps) -> Self {
        Self { base: BaseService::new(name, deps) }
    }
}

impl ServiceDescriptor for DnsService {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn kind(&self) -> &'static str {
        "DnsService"
    }

    fn role(&self) -> ServiceRole {
        ServiceRole::Dns
    }

    fn address(&self) -> Option<String> {
        self.base.address()
    }

    fn hostname(&self) -> String {
        self.base.hostname()
    }

    fn set_address(&self, address: &str) -> Result<(), StackError> {
        self.base.store_address(address)?;
        if is_routable_ipv4(address) {
            self.base.persist("dns.address", address)?;
        }
        Ok(())
    }

    fn build_compose_fragment(&self) -> Result<Option<ComposeFragment>, StackError> {
        if self.base.snapshot()?.dns.is_none() {
            return Ok(None);
        }

        let mut spec = self.base.service_spec(ServiceRole::Dns, COREDNS_IMAGE);
        spec.command = vec!["-conf".to_string(), COREFILE_TARGET.to_string()];

        let corefile = self.base.state_dir().join(COREFILE_NAME);
        spec.volumes
            .push(ServiceVolume::bind(corefile.display().to_string(), COREFILE_TARGET, true));

        if self.base.is_localhost_mode() {
            spec.ports.push(PortBinding::new(53, 53, "udp"));
            spec.ports.push(PortBinding::new(53, 53, "tcp"));
        }

        Ok(Some(ComposeFragment::with_service(spec)))
    }
}
