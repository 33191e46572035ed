// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

mod common;

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use common::{yaml_config, Fixture};
use stackyard_core::allocator::PortAllocator;
use stackyard_core::application::{assign_addresses, build_services, ComposeAssembler, ServiceRegistry};
use stackyard_core::compose::{ComposeFragment, NamedVolume, ProjectAssembler, ServiceSpec};
use stackyard_core::config_handler::ConfigHandler;
use stackyard_core::error::StackError;
use stackyard_core::service::{validate_address, ServiceCatalog, ServiceDescriptor, ServiceRole};

/// Descriptor returning a canned fragment.
struct StubService {
    name: String,
    kind: &'static str,
    fragment: Option<ComposeFragment>,
    address: RwLock<Option<String>>,
}

impl StubService {
    fn new(name: &str, kind: &'static str, fragment: Option<ComposeFragment>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            kind,
            fragment,
            address: RwLock::new(None),
        })
    }

    fn single(name: &str, kind: &'static str) -> Arc<Self> {
        Self::new(name, kind, Some(ComposeFragment::with_service(ServiceSpec::new(name, "img:1"))))
    }
}

impl ServiceDescriptor for StubService {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        self.kind
    }

    fn role(&self) -> ServiceRole {
        ServiceRole::Exec
    }

    fn address(&self) -> Option<String> {
        self.address.read().clone()
    }

    fn hostname(&self) -> String {
        format!("{}.test", self.name)
    }

    fn set_address(&self, address: &str) -> Result<(), StackError> {
        validate_address(address)?;
        *self.address.write() = Some(address.to_string());
        Ok(())
    }

    fn build_compose_fragment(&self) -> Result<Option<ComposeFragment>, StackError> {
        Ok(self.fragment.clone())
    }
}

const ENABLED: &str = "contexts:\n  local:\n    docker:\n      enabled: true\n";
const WITH_CIDR: &str =
    "contexts:\n  local:\n    docker:\n      enabled: true\n    network:\n      cidr_block: 10.5.0.0/16\n";

fn assembler(yaml: &str, services: Vec<Arc<StubService>>) -> ComposeAssembler {
    let registry = Arc::new(ServiceRegistry::new());
    for service in services {
        registry.register(service);
    }
    ComposeAssembler::new(yaml_config(yaml), registry)
}

#[test]
fn test_empty_fragments_are_skipped() {
    let project = assembler(
        ENABLED,
        vec![
            StubService::single("a", "AlphaService"),
            StubService::new("none", "NoneService", None),
            StubService::new("empty", "EmptyService", Some(ComposeFragment::default())),
            StubService::single("b", "BetaService"),
        ],
    )
    .assemble()
    .unwrap();

    let names: Vec<&str> = project.services.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn test_services_ordered_by_kind_then_registration() {
    let project = assembler(
        ENABLED,
        vec![
            StubService::single("zeta", "TalosService"),
            StubService::single("reg", "RegistryService"),
            StubService::single("aws", "AwsService"),
            StubService::single("omega", "TalosService"),
        ],
    )
    .assemble()
    .unwrap();

    let names: Vec<&str> = project.services.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["aws", "reg", "zeta", "omega"]);
}

#[test]
fn test_disabled_docker_fails_fast() {
    let err = assembler("contexts:\n  local: {}\n", vec![StubService::single("a", "A")])
        .assemble()
        .unwrap_err();
    assert!(err.is_validation());
}

#[test]
fn test_shared_network_without_cidr_has_no_ipam_or_static_ip() {
    let stub = StubService::single("a", "A");
    stub.set_address("10.5.0.9").unwrap();
    let assembler = assembler(ENABLED, vec![stub]);
    let project = assembler.assemble().unwrap();

    let network = &project.networks["stackyard-local"];
    assert_eq!(network.driver, "bridge");
    assert!(network.ipam.is_none());
    assert_eq!(project.services[0].networks["stackyard-local"].ipv4_address, None);
}

#[test]
fn test_cidr_pins_routable_addresses_only() {
    let routable = StubService::single("a", "A");
    routable.set_address("10.5.0.9").unwrap();
    let local = StubService::single("b", "B");
    local.set_address("localhost").unwrap();

    let project = assembler(WITH_CIDR, vec![routable, local]).assemble().unwrap();

    let ipam = project.networks["stackyard-local"].ipam.as_ref().unwrap();
    assert_eq!(ipam.config[0].subnet, "10.5.0.0/16");
    assert_eq!(
        project.service("a").unwrap().networks["stackyard-local"].ipv4_address.as_deref(),
        Some("10.5.0.9")
    );
    assert_eq!(project.service("b").unwrap().networks["stackyard-local"].ipv4_address, None);

    let yaml = project.to_yaml().unwrap();
    assert!(yaml.contains("ipv4_address: 10.5.0.9"));
}

#[test]
fn test_volumes_union_and_duplicate_services_replace() {
    let mut first = ComposeFragment::with_service(ServiceSpec::new("dup", "old:1"));
    first.volumes = Some(BTreeMap::from([("shared".to_string(), NamedVolume::default())]));
    let mut second = ComposeFragment::with_service(ServiceSpec::new("dup", "new:1"));
    second.volumes = Some(BTreeMap::from([
        ("shared".to_string(), NamedVolume { driver: Some("local".to_string()) }),
        ("extra".to_string(), NamedVolume::default()),
    ]));

    let project = assembler(
        ENABLED,
        vec![
            StubService::new("one", "A", Some(first)),
            StubService::new("two", "B", Some(second)),
        ],
    )
    .assemble()
    .unwrap();

    assert_eq!(project.services.len(), 1);
    assert_eq!(project.services[0].image, "new:1");
    assert_eq!(project.volumes.len(), 2);
    assert_eq!(project.volumes["shared"].driver.as_deref(), Some("local"));
}

#[test]
fn test_assembly_is_deterministic() {
    let build = || {
        assembler(
            WITH_CIDR,
            vec![
                StubService::single("x", "TalosService"),
                StubService::single("y", "AwsService"),
            ],
        )
        .assemble()
        .unwrap()
        .to_yaml()
        .unwrap()
    };
    assert_eq!(build(), build());
}

// ===== Catalog =====

const FULL_YAML: &str = r#"
contexts:
  local:
    docker:
      enabled: true
      registries:
        registry-1.docker.io:
          remote: https://registry-1.docker.io
        gcr.io:
          remote: https://gcr.io
    aws:
      enabled: true
    dns:
      enabled: true
      address: 10.5.0.100
    network:
      cidr_block: 10.5.0.0/16
    cluster:
      enabled: true
      controlplanes:
        count: 2
      workers:
        count: 2
    exec:
      enabled: true
"#;

#[test]
fn test_build_services_in_fixed_order() {
    let fixture = Fixture::new(FULL_YAML);
    let registry = Arc::new(ServiceRegistry::new());
    let count = build_services(&registry, &fixture.deps(), Arc::new(PortAllocator::default())).unwrap();
    assert_eq!(count, 9);

    let names: Vec<String> = registry.all().iter().map(|s| s.name().to_string()).collect();
    assert_eq!(
        names,
        vec![
            "gcr.io",
            "registry-1.docker.io",
            "aws",
            "dns",
            "controlplane-1",
            "controlplane-2",
            "worker-1",
            "worker-2",
            "exec",
        ]
    );
    let leaders: Vec<String> = registry
        .all()
        .iter()
        .filter(|s| s.is_leader())
        .map(|s| s.name().to_string())
        .collect();
    assert_eq!(leaders, vec!["controlplane-1"]);
}

#[test]
fn test_cidr_addresses_assigned_by_name() {
    let fixture = Fixture::new(FULL_YAML);
    let registry = Arc::new(ServiceRegistry::new());
    build_services(&registry, &fixture.deps(), Arc::new(PortAllocator::default())).unwrap();
    assign_addresses(registry.as_ref(), fixture.config.as_ref()).unwrap();

    let address_of = |name: &str| {
        registry
            .all()
            .into_iter()
            .find(|s| s.name() == name)
            .and_then(|s| s.address())
            .unwrap()
    };
    // aws, controlplane-1, controlplane-2, exec, gcr.io, registry-1..., worker-1, worker-2
    assert_eq!(address_of("aws"), "10.5.0.2");
    assert_eq!(address_of("controlplane-1"), "10.5.0.3");
    assert_eq!(address_of("dns"), "10.5.0.100");
    assert_eq!(address_of("worker-2"), "10.5.0.9");
    assert_eq!(
        fixture.config.get_string("cluster.controlplanes.nodes[controlplane-1].endpoint", ""),
        "10.5.0.3:50000"
    );
}

#[test]
fn test_local_driver_assigns_localhost() {
    let yaml = FULL_YAML.replace("    network:\n      cidr_block: 10.5.0.0/16\n", "    vm:\n      driver: docker-desktop\n");
    let fixture = Fixture::new(&yaml);
    let registry = Arc::new(ServiceRegistry::new());
    build_services(&registry, &fixture.deps(), Arc::new(PortAllocator::default())).unwrap();
    assign_addresses(registry.as_ref(), fixture.config.as_ref()).unwrap();

    assert!(registry.all().iter().all(|s| s.address().as_deref() == Some("localhost")));
    assert_eq!(
        fixture.config.get_string("cluster.workers.nodes[worker-2].endpoint", ""),
        "127.0.0.1:50003"
    );
}

#[test]
fn test_exhausted_cidr_is_validation_error() {
    let yaml = FULL_YAML.replace("10.5.0.0/16", "10.5.0.0/29");
    let fixture = Fixture::new(&yaml);
    let registry = Arc::new(ServiceRegistry::new());
    build_services(&registry, &fixture.deps(), Arc::new(PortAllocator::default())).unwrap();
    let err = assign_addresses(registry.as_ref(), fixture.config.as_ref()).unwrap_err();
    assert!(err.is_validation());
}
