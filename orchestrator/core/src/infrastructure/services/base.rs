// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! State and helpers shared by every service descriptor.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::domain::compose::ServiceSpec;
use crate::domain::config::{ContextConfig, DEFAULT_DOMAIN, LOCAL_VM_DRIVER, MANAGED_BY, STATE_DIR};
use crate::domain::config_handler::ConfigHandler;
use crate::domain::error::StackError;
use crate::domain::service::{validate_address, ServiceRole};
use crate::domain::shell::Shell;
use crate::domain::shims::Shims;

/// Collaborators injected into every descriptor.
#[derive(Clone)]
pub struct ServiceDeps {
    pub config: Arc<dyn ConfigHandler>,
    pub shell: Arc<dyn Shell>,
    pub shims: Arc<dyn Shims>,
}

impl ServiceDeps {
    pub fn new(config: Arc<dyn ConfigHandler>, shell: Arc<dyn Shell>, shims: Arc<dyn Shims>) -> Self {
        Self { config, shell, shims }
    }
}

pub struct BaseService {
    name: String,
    deps: ServiceDeps,
    address: RwLock<Option<String>>,
}

impl BaseService {
    pub fn new(name: impl Into<String>, deps: ServiceDeps) -> Self {
        Self {
            name: name.into(),
            deps,
            address: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &dyn ConfigHandler {
        self.deps.config.as_ref()
    }

    pub fn shims(&self) -> &dyn Shims {
        self.deps.shims.as_ref()
    }

    pub fn project_root(&self) -> PathBuf {
        self.deps.shell.project_root().to_path_buf()
    }

    pub fn state_dir(&self) -> PathBuf {
        self.project_root().join(STATE_DIR)
    }

    pub fn address(&self) -> Option<String> {
        self.address.read().clone()
    }

    /// Validate and store the address without persisting anything.
    pub fn store_address(&self, address: &str) -> Result<(), StackError> {
        validate_address(address)?;
        *self.address.write() = Some(address.to_string());
        Ok(())
    }

    pub fn domain(&self) -> String {
        self.config().get_string("dns.domain", DEFAULT_DOMAIN)
    }

    pub fn hostname(&self) -> String {
        format!("{}.{}", self.name, self.domain())
    }

    /// Containers are reached through `localhost` under the local VM driver.
    pub fn is_localhost_mode(&self) -> bool {
        self.config().get_string("vm.driver", "") == LOCAL_VM_DRIVER
    }

    /// Typed configuration snapshot.
    pub fn snapshot(&self) -> Result<ContextConfig, StackError> {
        self.config()
            .get_config()
            .map_err(|e| StackError::ConfigurationMissing(format!("unable to read configuration: {}", e)))
    }

    /// Persist one context value; the first failure aborts the caller.
    pub fn persist(&self, key: &str, value: impl Into<serde_yaml::Value>) -> Result<(), StackError> {
        self.config()
            .set_context_value(key, value.into())
            .map_err(|e| StackError::write(key, e))
    }

    pub fn labels(&self, role: ServiceRole) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("managed_by".to_string(), MANAGED_BY.to_string()),
            ("context".to_string(), self.config().context()),
            ("role".to_string(), role.as_str().to_string()),
        ])
    }

    /// Service skeleton carrying the name, hostname, image and ownership labels.
    pub fn service_spec(&self, role: ServiceRole, image: impl Into<String>) -> ServiceSpec {
        let hostname = self.hostname();
        let mut spec = ServiceSpec::new(self.name.clone(), image);
        spec.container_name = Some(hostname.clone());
        spec.hostname = Some(hostname);
        spec.restart = Some("always".to_string());
        spec.labels = self.labels(role);
        spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config_handler::YamlConfigHandler;
    use crate::infrastructure::shell::SystemShell;
    use crate::infrastructure::shims::OsShims;

    fn deps(yaml: &str, root: &std::path::Path) -> ServiceDeps {
        ServiceDeps::new(
            Arc::new(YamlConfigHandler::from_yaml_str(yaml, None).unwrap()),
            Arc::new(SystemShell::new(root)),
            Arc::new(OsShims::new()),
        )
    }

    #[test]
    fn test_hostname_uses_configured_domain() {
        let dir = tempfile::tempdir().unwrap();
        let base = BaseService::new("aws", deps("contexts:\n  local:\n    dns:\n      domain: corp\n", dir.path()));
        assert_eq!(base.hostname(), "aws.corp");

        let base = BaseService::new("aws", deps("", dir.path()));
        assert_eq!(base.hostname(), "aws.test");
    }

    #[test]
    fn test_store_address_validates() {
        let dir = tempfile::tempdir().unwrap();
        let base = BaseService::new("dns", deps("", dir.path()));
        assert!(base.store_address("not-an-ip").is_err());
        assert!(base.address().is_none());
        base.store_address("localhost").unwrap();
        assert_eq!(base.address().as_deref(), Some("localhost"));
    }

    #[test]
    fn test_service_spec_carries_labels() {
        let dir = tempfile::tempdir().unwrap();
        let base = BaseService::new("git", deps("context: dev\n", dir.path()));
        let spec = base.service_spec(ServiceRole::Git, "img:1");
        assert_eq!(spec.container_name.as_deref(), Some("git.test"));
        assert_eq!(spec.labels["managed_by"], "stackyard");
        assert_eq!(spec.labels["context"], "dev");
        assert_eq!(spec.labels["role"], "git");
    }
}
