// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Generic exec sandbox. Publishes no ports and mounts the project root at
//! `/work`. With `dns.enabled` it resolves through the DNS descriptor found
//! in the catalog.

use std::sync::Weak;

use crate::domain::compose::{ComposeFragment, ServiceVolume};
use crate::domain::error::StackError;
use crate::domain::service::{is_routable_ipv4, ServiceCatalog, ServiceDescriptor, ServiceRole};

use super::base::{BaseService, ServiceDeps};

pub const DEFAULT_EXEC_IMAGE: &str = "alpine:3.20";
const WORK_DIR: &str = "/work";

pub struct ExecService {
    base: BaseService,
    catalog: Weak<dyn ServiceCatalog>,
}

impl ExecService {
    pub fn new(name: impl Into<String>, deps: ServiceDeps, catalog: Weak<dyn ServiceCatalog>) -> Self {
        Self { base: BaseService::new(name, deps), catalog }
    }
}

impl ServiceDescriptor for ExecService {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn kind(&self) -> &'static str {
        "ExecService"
    }

    fn role(&self) -> ServiceRole {
        ServiceRole::Exec
    }

    fn address(&self) -> Option<String> {
        self.base.address()
    }

    fn hostname(&self) -> String {
        self.base.hostname()
    }

    fn set_address(&self, address: &str) -> Result<(), StackError> {
        self.base.store_address(address)
    }

    fn build_compose_fragment(&self) -> Result<Option<ComposeFragment>, StackError> {
        let Some(exec) = self.base.snapshot()?.exec else {
            return Ok(None);
        };

        let image = exec.image.unwrap_or_else(|| DEFAULT_EXEC_IMAGE.to_string());
        let mut spec = self.base.service_spec(ServiceRole::Exec, image);
        spec.command = vec!["tail".into(), "-f".into(), "/dev/null".into()];
        spec.working_dir = Some(WORK_DIR.to_string());
        spec.volumes.push(ServiceVolume::bind(
            self.base.project_root().display().to_string(),
            WORK_DIR,
            false,
        ));

        if self.base.config().get_bool("dns.enabled", false) {
            let dns = self
                .catalog
                .upgrade()
                .and_then(|catalog| catalog.find_by_role(ServiceRole::Dns))
                .ok_or_else(|| StackError::NotFound("no DNS service found".to_string()))?;

            if let Some(address) = dns.address().filter(|a| is_routable_ipv4(a)) {
                spec.dns = vec![address];
            }
            spec.dns_search = vec![self.base.domain()];
        }

        Ok(Some(ComposeFragment::with_service(spec)))
    }
}
