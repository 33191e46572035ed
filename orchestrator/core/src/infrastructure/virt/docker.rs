// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Container backend driver.
//!
//! Owns the rendered compose file under the project state directory and
//! drives the compose tool against it. Lifecycle:
//! `Uninitialized -> Ready -> {Up, Down}`.

use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::compose::ProjectAssembler;
use crate::domain::config::{network_name, MANAGED_BY, STATE_DIR};
use crate::domain::config_handler::ConfigHandler;
use crate::domain::error::StackError;
use crate::domain::service::ServiceCatalog;
use crate::domain::shell::{split_command, Shell, ShellError};
use crate::domain::shims::Shims;

pub const COMPOSE_FILE_ENV: &str = "COMPOSE_FILE";
pub const COMPOSE_FILE_NAME: &str = "docker-compose.yaml";

/// Compose invocation spellings, probed in order.
pub const COMPOSE_COMMANDS: &[&str] = &["docker-compose", "docker-cli-plugin-docker-compose", "docker compose"];

const UP_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_WAIT: Duration = Duration::from_secs(2);
const COMPOSE_SERVICE_LABEL: &str = "com.docker.compose.service";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Uninitialized,
    Ready,
    Up,
    Down,
}

/// One running managed container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub name: String,
    pub address: String,
    pub labels: BTreeMap<String, String>,
}

pub struct DockerVirt {
    config: Arc<dyn ConfigHandler>,
    shell: Arc<dyn Shell>,
    shims: Arc<dyn Shims>,
    catalog: Arc<dyn ServiceCatalog>,
    assembler: Arc<dyn ProjectAssembler>,
    compose_command: RwLock<Option<String>>,
    state: RwLock<DriverState>,
    retry_wait: Duration,
}

impl DockerVirt {
    pub fn new(
        config: Arc<dyn ConfigHandler>,
        shell: Arc<dyn Shell>,
        shims: Arc<dyn Shims>,
        catalog: Arc<dyn ServiceCatalog>,
        assembler: Arc<dyn ProjectAssembler>,
    ) -> Self {
        Self {
            config,
            shell,
            shims,
            catalog,
            assembler,
            compose_command: RwLock::new(None),
            state: RwLock::new(DriverState::Uninitialized),
            retry_wait: DEFAULT_RETRY_WAIT,
        }
    }

    /// Wait between `compose up` attempts
    pub fn with_retry_wait(mut self, wait: Duration) -> Self {
        self.retry_wait = wait;
        self
    }

    pub fn state(&self) -> DriverState {
        *self.state.read()
    }

    /// Compose spelling selected by [`DockerVirt::initialize`], if any.
    pub fn compose_command(&self) -> Option<String> {
        self.compose_command.read().clone()
    }

    pub fn compose_file_path(&self) -> PathBuf {
        self.shell.project_root().join(STATE_DIR).join(COMPOSE_FILE_NAME)
    }

    pub async fn initialize(&self) -> Result<(), StackError> {
        let services = self.catalog.all();
        debug!("Container backend sees {} service descriptors", services.len());

        if !self.config.get_bool("docker.enabled", false) {
            return Err(StackError::Validation(format!(
                "docker is not enabled for context '{}'",
                self.config.context()
            )));
        }

        let mut selected = None;
        for spelling in COMPOSE_COMMANDS {
            let (program, mut args) = split_command(spelling);
            args.push("--version".to_string());
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            if self.shell.exec_silent(&program, &args).await.is_ok() {
                debug!("Using compose command: {}", spelling);
                selected = Some(spelling.to_string());
                break;
            }
        }
        if selected.is_none() {
            warn!("No docker compose command found; up and down will fail");
        }

        *self.compose_command.write() = selected;
        *self.state.write() = DriverState::Ready;
        Ok(())
    }

    /// Start every service with `compose up`, retrying on failure.
    pub async fn up(&self) -> Result<(), StackError> {
        let (program, base_args) = self.ready_to_invoke().await?;
        let mut args: Vec<&str> = base_args.iter().map(String::as_str).collect();
        args.extend(["up", "--detach", "--remove-orphans"]);

        let mut attempt = 1;
        loop {
            let result = if attempt == 1 {
                self.shell
                    .exec_progress("📦 Running docker compose up", &program, &args)
                    .await
            } else {
                self.shell.exec_silent(&program, &args).await
            };

            match result {
                Ok(_) => {
                    info!("docker compose up succeeded on attempt {}", attempt);
                    *self.state.write() = DriverState::Up;
                    return Ok(());
                }
                Err(e) if attempt < UP_ATTEMPTS => {
                    warn!(attempt, "docker compose up failed, retrying: {}", e.reason);
                    attempt += 1;
                    tokio::time::sleep(self.retry_wait).await;
                }
                Err(e) => {
                    return Err(StackError::command(
                        format!("docker compose up failed after {} attempts", UP_ATTEMPTS),
                        e,
                    ));
                }
            }
        }
    }

    /// Stop and remove every service with its volumes. No retry.
    pub async fn down(&self) -> Result<(), StackError> {
        let (program, base_args) = self.ready_to_invoke().await?;
        let mut args: Vec<&str> = base_args.iter().map(String::as_str).collect();
        args.extend(["down", "--remove-orphans", "--volumes"]);

        self.shell
            .exec_progress("📦 Running docker compose down", &program, &args)
            .await
            .map_err(|e| StackError::command("docker compose down failed", e))?;
        *self.state.write() = DriverState::Down;
        Ok(())
    }

    /// Assemble the project and write it to [`DockerVirt::compose_file_path`].
    pub fn write_config(&self) -> Result<PathBuf, StackError> {
        let path = self.compose_file_path();
        if let Some(dir) = path.parent() {
            self.shims
                .create_dir_all(dir)
                .map_err(|e| StackError::filesystem("create state directory", dir, e))?;
        }

        let project = self.assembler.assemble()?;
        let yaml = project.to_yaml().map_err(|e| {
            StackError::filesystem(
                "serialize compose project for",
                &path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })?;

        self.shims
            .write_file(&path, yaml.as_bytes())
            .map_err(|e| StackError::filesystem("write compose file", &path, e))?;
        info!("Wrote compose file to {:?}", path);
        Ok(path)
    }

    /// Running managed containers of the current context.
    ///
    /// With a name filter the first container whose compose service name
    /// matches is returned on its own; no match yields an empty list.
    pub async fn get_container_info(&self, name: Option<&str>) -> Result<Vec<ContainerInfo>, StackError> {
        let context = self.config.context();
        let managed_filter = format!("label=managed_by={}", MANAGED_BY);
        let context_filter = format!("label=context={}", context);
        let ps_args = [
            "ps",
            "--filter",
            managed_filter.as_str(),
            "--filter",
            context_filter.as_str(),
            "--format",
            "{{.ID}}",
        ];
        let output = self
            .shell
            .exec_silent("docker", &ps_args)
            .await
            .map_err(|e| StackError::command("failed to list managed containers", e))?;

        let network = network_name(&context);
        let mut containers = Vec::new();

        for id in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let labels_json = self.inspect(id, "{{json .Config.Labels}}").await?;
            let labels: BTreeMap<String, String> =
                parse_json(&labels_json, id, "{{json .Config.Labels}}")?;

            let service_name = labels.get(COMPOSE_SERVICE_LABEL).cloned().unwrap_or_default();
            if let Some(filter) = name {
                if service_name != filter {
                    continue;
                }
            }

            let networks_json = self.inspect(id, "{{json .NetworkSettings.Networks}}").await?;
            let networks: BTreeMap<String, JsonValue> =
                parse_json(&networks_json, id, "{{json .NetworkSettings.Networks}}")?;
            let address = network_address(&networks, &network).unwrap_or_default();

            let info = ContainerInfo { name: service_name, address, labels };
            if name.is_some() {
                return Ok(vec![info]);
            }
            containers.push(info);
        }

        Ok(containers)
    }

    async fn inspect(&self, id: &str, format: &str) -> Result<String, StackError> {
        self.shell
            .exec_silent("docker", &["inspect", id, "--format", format])
            .await
            .map_err(|e| StackError::command(format!("failed to inspect container {}", id), e))
    }

    /// Shared preconditions of `up` and `down`.
    async fn ready_to_invoke(&self) -> Result<(String, Vec<String>), StackError> {
        if self.state() == DriverState::Uninitialized {
            return Err(StackError::Validation(
                "container backend has not been initialized".to_string(),
            ));
        }
        let command = self
            .compose_command()
            .ok_or_else(|| StackError::NotFound("no docker compose command found".to_string()))?;

        self.shell
            .exec_silent("docker", &["info"])
            .await
            .map_err(|e| StackError::command("docker daemon is not reachable", e))?;

        if self.shims.env_var(COMPOSE_FILE_ENV).is_none() {
            return Err(StackError::ConfigurationMissing(format!(
                "{} is not set",
                COMPOSE_FILE_ENV
            )));
        }

        Ok(split_command(&command))
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(raw: &str, id: &str, format: &str) -> Result<T, StackError> {
    serde_json::from_str(raw.trim()).map_err(|e| {
        StackError::command(
            format!("malformed inspect output for container {}", id),
            ShellError::new("docker", &["inspect", id, "--format", format], e.to_string(), raw),
        )
    })
}

/// IP on the context network, else the first non-empty IP of any network.
fn network_address(networks: &BTreeMap<String, JsonValue>, preferred: &str) -> Option<String> {
    let ip_of = |value: &JsonValue| {
        value
            .get("IPAddress")
            .and_then(JsonValue::as_str)
            .filter(|ip| !ip.is_empty())
            .map(str::to_string)
    };
    networks
        .get(preferred)
        .and_then(ip_of)
        .or_else(|| networks.values().find_map(ip_of))
}
