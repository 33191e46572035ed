// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Compose document model.
//!
//! Only the subset of the compose file format that descriptors emit is
//! modelled. Services keep their insertion order when serialized, so the
//! rendered file follows descriptor order rather than name order.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::error::StackError;

/// One container definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServiceSpec {
    /// Key under `services:`; not repeated inside the body
    #[serde(skip)]
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    pub image: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<ServiceVolume>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortBinding>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub networks: BTreeMap<String, ServiceNetwork>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tmpfs: Vec<String>,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub privileged: bool,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security_opt: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dns: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dns_search: Vec<String>,
}

impl ServiceSpec {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            ..Default::default()
        }
    }

    /// Host-published ports of this service.
    pub fn published_ports(&self) -> impl Iterator<Item = &str> {
        self.ports.iter().map(|p| p.published.as_str())
    }
}

/// Long-syntax service volume
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceVolume {
    #[serde(rename = "type")]
    pub kind: MountKind,
    pub source: String,
    pub target: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
}

impl ServiceVolume {
    pub fn bind(source: impl Into<String>, target: impl Into<String>, read_only: bool) -> Self {
        Self { kind: MountKind::Bind, source: source.into(), target: target.into(), read_only }
    }

    pub fn named(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self { kind: MountKind::Volume, source: source.into(), target: target.into(), read_only: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MountKind {
    Bind,
    Volume,
}

/// Long-syntax port publication
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortBinding {
    pub target: u32,
    pub published: String,
    pub protocol: String,
}

impl PortBinding {
    pub fn new(target: u32, published: u32, protocol: impl Into<String>) -> Self {
        Self { target, published: published.to_string(), protocol: protocol.into() }
    }
}

/// Per-service attachment to a named network
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServiceNetwork {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4_address: Option<String>,
}

/// Top-level named volume
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NamedVolume {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
}

/// Top-level named network
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NetworkSpec {
    /// Engine-level name, so compose does not prefix it with the project name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub driver: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipam: Option<IpamConfig>,
}

impl NetworkSpec {
    pub fn bridge() -> Self {
        Self { name: None, driver: "bridge".to_string(), ipam: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IpamConfig {
    pub config: Vec<IpamPool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IpamPool {
    pub subnet: String,
}

/// Partial compose output of a single descriptor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComposeFragment {
    pub services: Vec<ServiceSpec>,
    pub volumes: Option<BTreeMap<String, NamedVolume>>,
    pub networks: Option<BTreeMap<String, NetworkSpec>>,
}

impl ComposeFragment {
    pub fn with_service(service: ServiceSpec) -> Self {
        Self { services: vec![service], ..Default::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
            && self.volumes.as_ref().map_or(true, BTreeMap::is_empty)
            && self.networks.as_ref().map_or(true, BTreeMap::is_empty)
    }
}

/// Fully merged compose project.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComposeProject {
    #[serde(serialize_with = "serialize_ordered_services")]
    pub services: Vec<ServiceSpec>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub volumes: BTreeMap<String, NamedVolume>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub networks: BTreeMap<String, NetworkSpec>,
}

impl ComposeProject {
    pub fn service(&self, name: &str) -> Option<&ServiceSpec> {
        self.services.iter().find(|s| s.name == name)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// Produces the merged project from every registered descriptor.
pub trait ProjectAssembler: Send + Sync {
    fn assemble(&self) -> Result<ComposeProject, StackError>;
}

fn serialize_ordered_services<S>(services: &[ServiceSpec], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(services.len()))?;
    for service in services {
        map.serialize_entry(&service.name, service)?;
    }
    map.end()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_services_serialize_in_insertion_order() {
        let project = ComposeProject {
            services: vec![ServiceSpec::new("zeta", "img:1"), ServiceSpec::new("alpha", "img:2")],
            ..Default::default()
        };
        let yaml = project.to_yaml().unwrap();
        let zeta = yaml.find("zeta:").unwrap();
        let alpha = yaml.find("alpha:").unwrap();
        assert!(zeta < alpha);
        assert!(!yaml.contains("volumes:"));
    }

    #[test]
    fn test_service_body_omits_empty_fields() {
        let mut service = ServiceSpec::new("dns", "coredns/coredns:1.11.3");
        service.ports.push(PortBinding::new(53, 53, "udp"));
        service.volumes.push(ServiceVolume::bind("/tmp/Corefile", "/etc/coredns/Corefile", true));

        let value: serde_yaml::Value = serde_yaml::to_value(&service).unwrap();
        assert!(value.get("name").is_none());
        assert!(value.get("privileged").is_none());
        assert_eq!(value["ports"][0]["published"], serde_yaml::Value::from("53"));
        assert_eq!(value["volumes"][0]["type"], serde_yaml::Value::from("bind"));
        assert_eq!(value["volumes"][0]["read_only"], serde_yaml::Value::from(true));
    }

    #[test]
    fn test_empty_fragment() {
        assert!(ComposeFragment::default().is_empty());
        assert!(!ComposeFragment::with_service(ServiceSpec::new("a", "b")).is_empty());
    }
}
