// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Git livereload descriptor: serves the working tree as a git remote and
//! resyncs it on change.

use crate::domain::compose::{ComposeFragment, ServiceVolume};
use crate::domain::error::StackError;
use crate::domain::service::{ServiceDescriptor, ServiceRole};

use super::base::{BaseService, ServiceDeps};

pub const DEFAULT_LIVERELOAD_IMAGE: &str = "ghcr.io/windsorcli/git-livereload-server:v0.2.1";
pub const DEFAULT_RSYNC_EXCLUDE: &str = ".stackyard,.terraform,data,.venv";
pub const DEFAULT_RSYNC_PROTECT: &str = "flux-system";
pub const DEFAULT_GIT_USERNAME: &str = "local";
pub const DEFAULT_GIT_PASSWORD: &str = "local";

pub struct GitLivereloadService {
    base: BaseService,
}

impl GitLivereloadService {
    pub fn new(name: impl Into<String>, deps: ServiceDeps) -> Self {
        Self { base: BaseService::new(name, deps) }
    }
}

impl ServiceDescriptor for GitLivereloadService {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn kind(&self) -> &'static str {
        "GitLivereloadService"
    }

    fn role(&self) -> ServiceRole {
        ServiceRole::Git
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
        let Some(livereload) = self.base.snapshot()?.git.and_then(|g| g.livereload) else {
            return Ok(None);
        };

        let image = livereload
            .image
            .clone()
            .unwrap_or_else(|| DEFAULT_LIVERELOAD_IMAGE.to_string());
        let mut spec = self.base.service_spec(ServiceRole::Git, image);

        let env = &mut spec.environment;
        env.insert("RSYNC_INCLUDE".into(), livereload.rsync_include.clone().unwrap_or_default());
        env.insert(
            "RSYNC_EXCLUDE".into(),
            livereload.rsync_exclude.clone().unwrap_or_else(|| DEFAULT_RSYNC_EXCLUDE.to_string()),
        );
        env.insert(
            "RSYNC_PROTECT".into(),
            livereload.rsync_protect.clone().unwrap_or_else(|| DEFAULT_RSYNC_PROTECT.to_string()),
        );
        env.insert(
            "GIT_USERNAME".into(),
            livereload.username.clone().unwrap_or_else(|| DEFAULT_GIT_USERNAME.to_string()),
        );
        env.insert(
            "GIT_PASSWORD".into(),
            livereload.password.clone().unwrap_or_else(|| DEFAULT_GIT_PASSWORD.to_string()),
        );
        env.insert(
            "VERIFY_ONLY".into(),
            livereload.verify_only.unwrap_or(false).to_string(),
        );
        if let Some(webhook) = &livereload.webhook_url {
            env.insert("WEBHOOK_URL".into(), webhook.clone());
        }

        let project_root = self.base.project_root();
        let project_name = project_root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "project".to_string());
        spec.volumes.push(ServiceVolume::bind(
            project_root.display().to_string(),
            format!("/repos/mount/{}", project_name),
            false,
        ));

        Ok(Some(ComposeFragment::with_service(spec)))
    }
}
