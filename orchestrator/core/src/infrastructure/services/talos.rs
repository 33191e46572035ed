// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Talos Cluster Node Descriptor
//
// One descriptor per control-plane or worker node. Host ports and bind
// mounts merge across three configuration levels, highest precedence last:
//
//   cluster.hostports / cluster.volumes
//   cluster.<group>.hostports / cluster.<group>.volumes
//   cluster.<group>.nodes[<name>].hostports / .volumes
//
// The first control plane constructed against a shared `PortAllocator`
// becomes the leader. It keeps the default node API port and is the only
// node that publishes the Kubernetes API under the local VM driver.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::domain::allocator::PortAllocator;
use crate::domain::compose::{ComposeFragment, NamedVolume, PortBinding, ServiceVolume};
use crate::domain::config::{ClusterConfig, NodeGroupConfig};
use crate::domain::error::StackError;
use crate::domain::ports::{merge_by_precedence, NodePortSpec, VolumeSpec};
use crate::domain::service::{ServiceDescriptor, ServiceRole, LOCALHOST};

use super::base::{BaseService, ServiceDeps};

pub const DEFAULT_TALOS_IMAGE: &str = "ghcr.io/siderolabs/talos:v1.7.6";
pub const KUBERNETES_API_PORT: u32 = 6443;

/// Fixed OS state volumes as (name suffix, container path).
const STATE_VOLUMES: &[(&str, &str)] = &[
    ("system_state", "/system/state"),
    ("var", "/var"),
    ("etc_cni", "/etc/cni"),
    ("etc_kubernetes", "/etc/kubernetes"),
    ("usr_libexec_kubernetes", "/usr/libexec/kubernetes"),
    ("opt", "/opt"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeGroup {
    ControlPlane,
    Worker,
}

impl NodeGroup {
    /// Configuration key of the group under `cluster`.
    pub fn key(&self) -> &'static str {
        match self {
            NodeGroup::ControlPlane => "controlplanes",
            NodeGroup::Worker => "workers",
        }
    }

    pub fn role(&self) -> ServiceRole {
        match self {
            NodeGroup::ControlPlane => ServiceRole::ControlPlane,
            NodeGroup::Worker => ServiceRole::Worker,
        }
    }

    fn default_cpu(&self) -> u32 {
        match self {
            NodeGroup::ControlPlane => 2,
            NodeGroup::Worker => 4,
        }
    }

    /// Gigabytes
    fn default_memory(&self) -> u32 {
        match self {
            NodeGroup::ControlPlane => 2,
            NodeGroup::Worker => 4,
        }
    }

    fn config<'a>(&self, cluster: &'a ClusterConfig) -> &'a NodeGroupConfig {
        match self {
            NodeGroup::ControlPlane => &cluster.controlplanes,
            NodeGroup::Worker => &cluster.workers,
        }
    }
}

#[derive(Debug, Default)]
struct NodeState {
    api_port: Option<u32>,
    host_ports: Option<Vec<NodePortSpec>>,
}

pub struct TalosService {
    base: BaseService,
    group: NodeGroup,
    allocator: Arc<PortAllocator>,
    is_leader: bool,
    state: RwLock<NodeState>,
}

impl TalosService {
    pub fn new(name: impl Into<String>, group: NodeGroup, deps: ServiceDeps, allocator: Arc<PortAllocator>) -> Self {
        let name = name.into();
        let is_leader = group == NodeGroup::ControlPlane && allocator.claim_leader(group.key(), &name);
        if is_leader {
            debug!(node = %name, "Elected control plane leader");
        }
        Self {
            base: BaseService::new(name, deps),
            group,
            allocator,
            is_leader,
            state: RwLock::new(NodeState::default()),
        }
    }

    pub fn group(&self) -> NodeGroup {
        self.group
    }

    /// API port assigned by [`ServiceDescriptor::set_address`].
    pub fn api_port(&self) -> Option<u32> {
        self.state.read().api_port
    }

    fn node_key(&self, field: &str) -> String {
        format!("cluster.{}.nodes[{}].{}", self.group.key(), self.base.name(), field)
    }

    fn configured_host_ports(&self, cluster: &ClusterConfig) -> Result<Vec<NodePortSpec>, StackError> {
        let group = self.group.config(cluster);
        let node = group.nodes.get(self.base.name());

        let levels = [
            Some(&cluster.hostports),
            Some(&group.hostports),
            node.map(|n| &n.hostports),
        ]
        .into_iter()
        .flatten()
        .map(|specs| specs.iter().map(|s| NodePortSpec::parse(s)).collect::<Result<Vec<_>, _>>())
        .collect::<Result<Vec<_>, _>>()?;

        Ok(merge_by_precedence(levels, |p| (p.container_port, p.protocol)))
    }

    fn configured_volumes(&self, cluster: &ClusterConfig) -> Result<Vec<VolumeSpec>, StackError> {
        let group = self.group.config(cluster);
        let node = group.nodes.get(self.base.name());

        let levels = [
            Some(&cluster.volumes),
            Some(&group.volumes),
            node.map(|n| &n.volumes),
        ]
        .into_iter()
        .flatten()
        .map(|specs| specs.iter().map(|s| VolumeSpec::parse(s)).collect::<Result<Vec<_>, _>>())
        .collect::<Result<Vec<_>, _>>()?;

        Ok(merge_by_precedence(levels, |v| v.container_path.clone()))
    }
}

impl ServiceDescriptor for TalosService {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn kind(&self) -> &'static str {
        "TalosService"
    }

    fn role(&self) -> ServiceRole {
        self.group.role()
    }

    fn address(&self) -> Option<String> {
        self.base.address()
    }

    fn hostname(&self) -> String {
        self.base.hostname()
    }

    fn is_leader(&self) -> bool {
        self.is_leader
    }

    fn set_address(&self, address: &str) -> Result<(), StackError> {
        if self.state.read().api_port.is_some() {
            return Err(StackError::Validation(format!(
                "address of node {} is already assigned",
                self.base.name()
            )));
        }
        self.base.store_address(address)?;

        self.base.persist(&self.node_key("hostname"), self.base.hostname())?;
        self.base.persist(&self.node_key("node"), address)?;

        let is_local = self.base.is_localhost_mode();
        let api_port = self.allocator.allocate_api_port(self.is_leader, is_local)?;
        let endpoint_host = if address == LOCALHOST { "127.0.0.1" } else { address };
        self.base
            .persist(&self.node_key("endpoint"), format!("{}:{}", endpoint_host, api_port))?;

        let configured = match self.base.snapshot()?.cluster {
            Some(cluster) => self.configured_host_ports(&cluster)?,
            None => Vec::new(),
        };
        let host_ports = configured
            .into_iter()
            .map(|spec| {
                let host_port = self.allocator.reserve_host_port(spec.host_port)?;
                Ok(spec.with_host_port(host_port))
            })
            .collect::<Result<Vec<NodePortSpec>, StackError>>()?;
        let persisted: Vec<serde_yaml::Value> =
            host_ports.iter().map(|p| serde_yaml::Value::from(p.to_string())).collect();
        self.base.persist(&self.node_key("hostports"), persisted)?;

        let mut state = self.state.write();
        state.api_port = Some(api_port);
        state.host_ports = Some(host_ports);
        Ok(())
    }

    fn build_compose_fragment(&self) -> Result<Option<ComposeFragment>, StackError> {
        let Some(cluster) = self.base.snapshot()?.cluster else {
            return Ok(None);
        };

        let name = self.base.name().to_string();
        let group = self.group.config(&cluster);
        let image = cluster.image.clone().unwrap_or_else(|| DEFAULT_TALOS_IMAGE.to_string());
        let cpu = group.cpu.unwrap_or_else(|| self.group.default_cpu());
        let memory = group.memory.unwrap_or_else(|| self.group.default_memory());

        let mut spec = self.base.service_spec(self.group.role(), image);
        spec.environment.insert("PLATFORM".into(), "container".into());
        spec.environment.insert("TALOSSKU".into(), format!("{}CPU-{}RAM", cpu, memory * 1024));
        spec.privileged = true;
        spec.read_only = true;
        spec.security_opt = vec!["seccomp=unconfined".to_string()];
        spec.tmpfs = vec!["/run".to_string(), "/system".to_string(), "/tmp".to_string()];

        let mut volumes = BTreeMap::new();
        for (suffix, target) in STATE_VOLUMES {
            let volume = format!("{}_{}", name, suffix);
            spec.volumes.push(ServiceVolume::named(volume.clone(), *target));
            volumes.insert(volume, NamedVolume::default());
        }

        let project_root = self.base.project_root();
        for volume in self.configured_volumes(&cluster)? {
            let host_path = volume.resolve_host_path(&project_root);
            self.base
                .shims()
                .create_dir_all(&host_path)
                .map_err(|e| StackError::filesystem("create volume directory", &host_path, e))?;
            spec.volumes.push(ServiceVolume::bind(
                host_path.display().to_string(),
                volume.container_path,
                volume.read_only,
            ));
        }

        let (api_port, host_ports) = {
            let state = self.state.read();
            (state.api_port, state.host_ports.clone())
        };

        if self.base.is_localhost_mode() {
            let default_port = self.allocator.default_api_port();
            spec.ports.push(PortBinding::new(
                default_port,
                api_port.unwrap_or(default_port),
                "tcp",
            ));
            if self.is_leader {
                spec.ports.push(PortBinding::new(KUBERNETES_API_PORT, KUBERNETES_API_PORT, "tcp"));
            }
        }

        let host_ports = match host_ports {
            Some(ports) => ports,
            None => self.configured_host_ports(&cluster)?,
        };
        for port in host_ports {
            spec.ports.push(PortBinding::new(
                port.container_port,
                port.host_port,
                port.protocol.to_string(),
            ));
        }

        Ok(Some(ComposeFragment {
            services: vec![spec],
            volumes: Some(volumes),
            networks: None,
        }))
    }
}
