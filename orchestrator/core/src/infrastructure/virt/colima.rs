// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Colima VM backend driver.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::config::{VmConfig, MANAGED_BY};
use crate::domain::config_handler::ConfigHandler;
use crate::domain::error::StackError;
use crate::domain::shell::{Shell, ShellError};
use crate::domain::shims::Shims;

pub const COLIMA_DRIVER: &str = "colima";
pub const DEFAULT_DISK_GB: u32 = 60;

const ADDRESS_POLL_ATTEMPTS: u32 = 3;
const DEFAULT_POLL_WAIT: Duration = Duration::from_secs(5);

/// One line of `colima ls --json`.
#[derive(Debug, Clone, Deserialize)]
pub struct ColimaInstance {
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub arch: String,
}

/// `colima.yaml` document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColimaConfig {
    pub cpu: u32,
    pub disk: u32,
    pub memory: u32,
    pub arch: String,
    pub runtime: String,
    pub hostname: String,
    pub kubernetes: ColimaKubernetes,
    pub auto_activate: bool,
    pub network: ColimaNetwork,
    pub forward_agent: bool,
    pub vm_type: String,
    pub rosetta: bool,
    pub mount_type: String,
    pub mount_inotify: bool,
    pub cpu_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColimaKubernetes {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColimaNetwork {
    pub address: bool,
}

pub struct ColimaVirt {
    config: Arc<dyn ConfigHandler>,
    shell: Arc<dyn Shell>,
    shims: Arc<dyn Shims>,
    poll_wait: Duration,
}

impl ColimaVirt {
    pub fn new(config: Arc<dyn ConfigHandler>, shell: Arc<dyn Shell>, shims: Arc<dyn Shims>) -> Self {
        Self {
            config,
            shell,
            shims,
            poll_wait: DEFAULT_POLL_WAIT,
        }
    }

    /// Wait between address polls
    pub fn with_poll_wait(mut self, wait: Duration) -> Self {
        self.poll_wait = wait;
        self
    }

    pub fn profile_name(&self) -> String {
        format!("{}-{}", MANAGED_BY, self.config.context())
    }

    pub fn is_enabled(&self) -> bool {
        self.config.get_string("vm.driver", "") == COLIMA_DRIVER
    }

    /// Start the VM, wait for its address and persist it as `vm.address`.
    pub async fn up(&self) -> Result<String, StackError> {
        let profile = self.profile_name();
        self.shell
            .exec_progress("🦙 Starting colima", "colima", &["start", &profile])
            .await
            .map_err(|e| StackError::command(format!("failed to start colima profile {}", profile), e))?;

        let address = self.wait_for_address(&profile).await?;
        self.config
            .set_context_value("vm.address", serde_yaml::Value::from(address.as_str()))
            .map_err(|e| StackError::write("vm.address", e))?;
        info!("Colima VM {} is reachable at {}", profile, address);
        Ok(address)
    }

    /// Stop, then delete the VM.
    pub async fn down(&self) -> Result<(), StackError> {
        let profile = self.profile_name();
        self.shell
            .exec_progress("🦙 Stopping colima", "colima", &["stop", &profile])
            .await
            .map_err(|e| StackError::command(format!("failed to stop colima profile {}", profile), e))?;
        self.shell
            .exec_progress("🦙 Deleting colima", "colima", &["delete", &profile, "--force"])
            .await
            .map_err(|e| StackError::command(format!("failed to delete colima profile {}", profile), e))?;
        Ok(())
    }

    /// Current instance info of the profile.
    pub async fn info(&self) -> Result<Option<ColimaInstance>, StackError> {
        let profile = self.profile_name();
        let args = ["ls", "--profile", profile.as_str(), "--json"];
        let output = self
            .shell
            .exec_silent("colima", &args)
            .await
            .map_err(|e| StackError::command(format!("failed to query colima profile {}", profile), e))?;

        for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let instance: ColimaInstance = serde_json::from_str(line).map_err(|e| {
                StackError::command(
                    "malformed colima ls output",
                    ShellError::new("colima", &args, e.to_string(), line),
                )
            })?;
            if instance.name == profile {
                return Ok(Some(instance));
            }
        }
        Ok(None)
    }

    /// A failed `colima ls` counts as "not ready yet"; the outcome of the
    /// last poll is what surfaces once attempts run out.
    async fn wait_for_address(&self, profile: &str) -> Result<String, StackError> {
        let mut last_error = None;
        for attempt in 1..=ADDRESS_POLL_ATTEMPTS {
            match self.info().await {
                Ok(Some(instance)) if !instance.address.is_empty() => return Ok(instance.address),
                Ok(_) => {
                    debug!(attempt, "Colima profile {} has no address yet", profile);
                    last_error = None;
                }
                Err(e) => {
                    debug!(attempt, error = %e, "Colima profile {} could not be queried", profile);
                    last_error = Some(e);
                }
            }
            if attempt < ADDRESS_POLL_ATTEMPTS {
                tokio::time::sleep(self.poll_wait).await;
            }
        }
        Err(last_error.unwrap_or_else(|| {
            StackError::NotFound(format!(
                "colima profile {} reported no address after {} attempts",
                profile, ADDRESS_POLL_ATTEMPTS
            ))
        }))
    }

    /// Effective VM configuration with host-derived defaults.
    pub fn resolve_config(&self, vm: &VmConfig) -> ColimaConfig {
        let arch = vm.arch.clone().unwrap_or_else(|| normalize_arch(self.shims.arch()).to_string());
        let (vm_type, mount_type) = if self.shims.os() == "macos" && arch == "aarch64" {
            ("vz", "virtiofs")
        } else {
            ("qemu", "sshfs")
        };

        ColimaConfig {
            cpu: vm.cpu.unwrap_or_else(|| (self.shims.cpu_count() / 2).max(1) as u32),
            disk: vm.disk.unwrap_or(DEFAULT_DISK_GB),
            memory: vm
                .memory
                .unwrap_or_else(|| default_memory_gb(self.shims.total_memory_bytes())),
            arch,
            runtime: "docker".to_string(),
            hostname: self.profile_name(),
            kubernetes: ColimaKubernetes { enabled: false },
            auto_activate: true,
            network: ColimaNetwork { address: true },
            forward_agent: false,
            vm_type: vm_type.to_string(),
            rosetta: false,
            mount_type: mount_type.to_string(),
            mount_inotify: true,
            cpu_type: String::new(),
        }
    }

    /// Write `~/.colima/<profile>/colima.yaml` through a temp file and rename.
    /// Returns `None` when another VM driver is configured.
    pub fn write_config(&self) -> Result<Option<PathBuf>, StackError> {
        if !self.is_enabled() {
            debug!("VM driver is not colima; skipping colima config");
            return Ok(None);
        }

        let vm = self
            .config
            .get_config()
            .map_err(|e| StackError::ConfigurationMissing(format!("unable to read configuration: {}", e)))?
            .vm
            .unwrap_or_default();
        let document = self.resolve_config(&vm);

        let home = self
            .shims
            .home_dir()
            .ok_or_else(|| StackError::ConfigurationMissing("home directory not found".to_string()))?;
        let dir = home.join(".colima").join(self.profile_name());
        let path = dir.join("colima.yaml");
        let temp = dir.join("colima.yaml.tmp");

        self.shims
            .create_dir_all(&dir)
            .map_err(|e| StackError::filesystem("create colima config directory", &dir, e))?;

        let yaml = serde_yaml::to_string(&document).map_err(|e| {
            StackError::filesystem(
                "serialize colima config for",
                &path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })?;
        self.shims
            .write_file(&temp, yaml.as_bytes())
            .map_err(|e| StackError::filesystem("write temporary colima config", &temp, e))?;

        if let Err(e) = self.shims.rename(&temp, &path) {
            if let Err(cleanup) = self.shims.remove_file(&temp) {
                warn!("Failed to remove {:?}: {}", temp, cleanup);
            }
            return Err(StackError::filesystem("rename colima config to", &path, e));
        }

        info!("Wrote colima config to {:?}", path);
        Ok(Some(path))
    }
}

/// Half the physical memory in whole gigabytes, clamped to `i32::MAX`.
pub fn default_memory_gb(total_bytes: u64) -> u32 {
    let half_gb = total_bytes / (1024 * 1024 * 1024) / 2;
    half_gb.min(i32::MAX as u64) as u32
}

fn normalize_arch(arch: &str) -> &str {
    match arch {
        "arm64" | "aarch64" => "aarch64",
        "amd64" | "x86_64" => "x86_64",
        other => other,
    }
}
