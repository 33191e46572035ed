// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! AWS emulator (LocalStack) descriptor.

use crate::domain::compose::{ComposeFragment, PortBinding};
use crate::domain::config::invalid_localstack_services;
use crate::domain::error::StackError;
use crate::domain::service::{ServiceDescriptor, ServiceRole};

use super::base::{BaseService, ServiceDeps};

pub const LOCALSTACK_IMAGE: &str = "localstack/localstack:3.8.1";
pub const LOCALSTACK_PRO_IMAGE: &str = "localstack/localstack-pro:3.8.1";
pub const LOCALSTACK_PORT: u32 = 4566;
pub const LOCALSTACK_AUTH_TOKEN_ENV: &str = "LOCALSTACK_AUTH_TOKEN";

pub struct AwsService {
    base: BaseService,
}

impl AwsService {
    pub fn new(name: impl Into<String>, deps: ServiceDeps) -> Self {
        Self { base: BaseService::new(name, deps) }
    }
}

impl ServiceDescriptor for AwsService {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn kind(&self) -> &'static str {
        "AwsService"
    }

    fn role(&self) -> ServiceRole {
        ServiceRole::Aws
    }

    fn address(&self) -> Option<String> {
        self.base.address()
    }

    fn hostname(&self) -> String {
        self.base.hostname()
    }

    fn supports_wildcard_dns(&self) -> bool {
        true
    }

    fn set_address(&self, address: &str) -> Result<(), StackError> {
        self.base.store_address(address)
    }

    fn build_compose_fragment(&self) -> Result<Option<ComposeFragment>, StackError> {
        let Some(aws) = self.base.snapshot()?.aws else {
            return Ok(None);
        };

        let services = aws
            .localstack
            .as_ref()
            .and_then(|l| l.services.clone())
            .unwrap_or_default();
        let invalid = invalid_localstack_services(&services);
        if !invalid.is_empty() {
            return Err(StackError::Validation(format!(
                "invalid services found: {}",
                invalid.join(", ")
            )));
        }

        let pro = self.base.shims().env_var(LOCALSTACK_AUTH_TOKEN_ENV).is_some();
        let image = if pro { LOCALSTACK_PRO_IMAGE } else { LOCALSTACK_IMAGE };

        let mut spec = self.base.service_spec(ServiceRole::Aws, image);
        spec.environment.insert("ENFORCE_IAM".into(), "1".into());
        spec.environment.insert("PERSISTENCE".into(), "1".into());
        spec.environment.insert("IAM_SOFT_MODE".into(), "0".into());
        spec.environment.insert("DEBUG".into(), "0".into());
        if pro {
            // compose interpolates the token from the caller environment
            spec.environment.insert(
                LOCALSTACK_AUTH_TOKEN_ENV.into(),
                format!("${{{}}}", LOCALSTACK_AUTH_TOKEN_ENV),
            );
        }
        if !services.is_empty() {
            spec.environment.insert("SERVICES".into(), services.join(","));
        }
        spec.ports.push(PortBinding::new(LOCALSTACK_PORT, LOCALSTACK_PORT, "tcp"));

        Ok(Some(ComposeFragment::with_service(spec)))
    }
}
