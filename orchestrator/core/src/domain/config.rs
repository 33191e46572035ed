// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Context Configuration Types
//
// Defines the per-context configuration schema:
// - Docker / compose orchestration and pull-through registries
// - Cluster node groups (control planes and workers) with host ports and volumes
// - AWS emulation, DNS, network CIDR
// - VM manager sizing
// - Git livereload and exec sandbox
//
// The whole document is `context: <name>` plus `contexts: { <name>: ContextConfig }`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use crate::domain::ports::{NodePortSpec, VolumeSpec};

/// Label value stamped on every container this tool manages.
pub const MANAGED_BY: &str = "stackyard";

/// Hidden per-project state directory.
pub const STATE_DIR: &str = ".stackyard";

/// Placeholder expanded to the project root inside volume specs.
pub const PROJECT_ROOT_VAR: &str = "${STACKYARD_PROJECT_ROOT}";

pub const DEFAULT_DOMAIN: &str = "test";

pub const DEFAULT_CONTEXT: &str = "local";

/// VM driver under which containers are reached through `localhost`.
pub const LOCAL_VM_DRIVER: &str = "docker-desktop";

/// Services the AWS emulator accepts in `aws.localstack.services`.
pub const LOCALSTACK_SERVICES: &[&str] = &[
    "acm", "apigateway", "cloudformation", "cloudwatch", "config", "dynamodb",
    "dynamodbstreams", "ec2", "es", "events", "firehose", "iam", "kinesis", "kms",
    "lambda", "logs", "opensearch", "redshift", "resource-groups",
    "resourcegroupstaggingapi", "route53", "route53resolver", "s3", "s3control",
    "scheduler", "secretsmanager", "ses", "sns", "sqs", "ssm", "stepfunctions",
    "sts", "support", "swf", "transcribe",
];

/// Whole configuration document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackyardDocument {
    /// Active context name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    #[serde(default)]
    pub contexts: BTreeMap<String, ContextConfig>,
}

/// Configuration of one context
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker: Option<DockerConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<DnsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm: Option<VmConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<ExecConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DockerConfig {
    /// Compose orchestration switch; nothing is rendered while false
    #[serde(default)]
    pub enabled: bool,

    /// Synthesized URL of the local registry, written at address assignment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_url: Option<String>,

    /// Pull-through / local registries keyed by name (e.g. "gcr.io")
    #[serde(default)]
    pub registries: BTreeMap<String, RegistryConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Upstream URL; when set the registry runs as a pull-through cache
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// Host port to publish on; allocated automatically for local registries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostport: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Node OS driver (only "talos" is rendered)
    #[serde(default = "default_cluster_driver")]
    pub driver: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Cluster-wide host ports, lowest precedence
    #[serde(default)]
    pub hostports: Vec<String>,

    /// Cluster-wide bind mounts, lowest precedence
    #[serde(default)]
    pub volumes: Vec<String>,

    #[serde(default)]
    pub controlplanes: NodeGroupConfig,

    #[serde(default)]
    pub workers: NodeGroupConfig,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            driver: default_cluster_driver(),
            image: None,
            hostports: vec![],
            volumes: vec![],
            controlplanes: NodeGroupConfig::default(),
            workers: NodeGroupConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeGroupConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u32>,

    /// Memory in GB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u32>,

    #[serde(default)]
    pub hostports: Vec<String>,

    #[serde(default)]
    pub volumes: Vec<String>,

    /// Per-node overrides and persisted assignment results
    #[serde(default)]
    pub nodes: BTreeMap<String, NodeConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// Network address of the node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,

    /// API endpoint (`address:port`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub hostports: Vec<String>,

    #[serde(default)]
    pub volumes: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AwsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localstack: Option<LocalstackConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalstackConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Emulated services; empty means the emulator default set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DnsConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Top-level domain appended to service names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Fixed address for the DNS container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// IPv4 CIDR of the shared bridge network (e.g. "10.5.0.0/16")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr_block: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VmConfig {
    /// "colima" or "docker-desktop"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u32>,

    /// Disk in GB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk: Option<u32>,

    /// Memory in GB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,

    /// Address discovered after the VM starts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub livereload: Option<GitLivereloadConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitLivereloadConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rsync_include: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rsync_exclude: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rsync_protect: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_only: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Name of the shared bridge network of a context.
pub fn network_name(context: &str) -> String {
    format!("{}-{}", MANAGED_BY, context)
}

/// Returns every entry of `services` that the AWS emulator does not know.
pub fn invalid_localstack_services(services: &[String]) -> Vec<String> {
    services
        .iter()
        .filter(|s| !LOCALSTACK_SERVICES.contains(&s.as_str()))
        .cloned()
        .collect()
}

/// Parse an IPv4 CIDR block into its network address and prefix length.
pub fn parse_cidr(cidr: &str) -> Option<(Ipv4Addr, u8)> {
    let (addr, prefix) = cidr.split_once('/')?;
    let addr: Ipv4Addr = addr.trim().parse().ok()?;
    let prefix: u8 = prefix.trim().parse().ok()?;
    if prefix > 32 {
        return None;
    }
    let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
    Some((Ipv4Addr::from(u32::from(addr) & mask), prefix))
}

impl ContextConfig {
    /// Validate the context, collecting every problem before failing
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut problems = Vec::new();

        if let Some(cidr) = self.network.as_ref().and_then(|n| n.cidr_block.as_deref()) {
            if parse_cidr(cidr).is_none() {
                problems.push(format!("network.cidr_block '{}' is not an IPv4 CIDR", cidr));
            }
        }

        if let Some(docker) = &self.docker {
            for (name, registry) in &docker.registries {
                if name.trim().is_empty() {
                    problems.push("docker.registries contains an empty name".to_string());
                }
                if registry.hostport == Some(0) {
                    problems.push(format!("docker.registries[{}].hostport cannot be 0", name));
                }
            }
        }

        if let Some(services) = self
            .aws
            .as_ref()
            .and_then(|a| a.localstack.as_ref())
            .and_then(|l| l.services.as_ref())
        {
            let invalid = invalid_localstack_services(services);
            if !invalid.is_empty() {
                problems.push(format!("invalid services found: {}", invalid.join(", ")));
            }
        }

        if let Some(cluster) = &self.cluster {
            if cluster.enabled && cluster.driver != "talos" {
                problems.push(format!("cluster.driver '{}' is not supported", cluster.driver));
            }
            if cluster.enabled && cluster.controlplanes.count == Some(0) {
                problems.push("cluster.controlplanes.count must be at least 1".to_string());
            }
            let mut port_specs: Vec<&String> = cluster.hostports.iter().collect();
            let mut volume_specs: Vec<&String> = cluster.volumes.iter().collect();
            for group in [&cluster.controlplanes, &cluster.workers] {
                port_specs.extend(group.hostports.iter());
                volume_specs.extend(group.volumes.iter());
                for node in group.nodes.values() {
                    port_specs.extend(node.hostports.iter());
                    volume_specs.extend(node.volumes.iter());
                }
            }
            for spec in port_specs {
                if let Err(e) = NodePortSpec::parse(spec) {
                    problems.push(e.to_string());
                }
            }
            for spec in volume_specs {
                if let Err(e) = VolumeSpec::parse(spec) {
                    problems.push(e.to_string());
                }
            }
        }

        if !problems.is_empty() {
            anyhow::bail!("{}", problems.join("; "));
        }
        Ok(())
    }
}

fn default_cluster_driver() -> String {
    "talos".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_parses_minimal_yaml() {
        let yaml = r#"
context: local
contexts:
  local:
    docker:
      enabled: true
      registries:
        gcr.io:
          remote: https://gcr.io
    cluster:
      enabled: true
      controlplanes:
        count: 1
      workers:
        count: 2
        hostports: ["8080:30080/tcp"]
"#;
        let doc: StackyardDocument = serde_yaml::from_str(yaml).unwrap();
        let local = &doc.contexts["local"];
        let cluster = local.cluster.as_ref().unwrap();
        assert_eq!(cluster.driver, "talos");
        assert_eq!(cluster.workers.count, Some(2));
        assert_eq!(
            local.docker.as_ref().unwrap().registries["gcr.io"].remote.as_deref(),
            Some("https://gcr.io")
        );
        assert!(local.validate().is_ok());
    }

    #[test]
    fn test_validation_collects_all_problems() {
        let mut config = ContextConfig::default();
        config.network = Some(NetworkConfig { cidr_block: Some("10.5.0.0".into()) });
        config.aws = Some(AwsConfig {
            enabled: true,
            localstack: Some(LocalstackConfig {
                enabled: true,
                services: Some(vec!["s3".into(), "bogus".into()]),
            }),
        });
        let mut cluster = ClusterConfig::default();
        cluster.enabled = true;
        cluster.controlplanes.count = Some(0);
        cluster.hostports = vec!["1:2:3".into()];
        config.cluster = Some(cluster);

        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("controlplanes.count"));
        assert!(message.contains("network.cidr_block"));
        assert!(message.contains("invalid services found: bogus"));
        assert!(message.contains("1:2:3"));
    }

    #[test]
    fn test_parse_cidr_masks_host_bits() {
        assert_eq!(parse_cidr("10.5.3.9/16"), Some((Ipv4Addr::new(10, 5, 0, 0), 16)));
        assert_eq!(parse_cidr("10.5.0.0/33"), None);
        assert_eq!(parse_cidr("nope/8"), None);
    }

    #[test]
    fn test_invalid_localstack_services_keeps_order() {
        let services = vec!["nope".to_string(), "s3".to_string(), "zzz".to_string()];
        assert_eq!(invalid_localstack_services(&services), vec!["nope", "zzz"]);
    }
}
