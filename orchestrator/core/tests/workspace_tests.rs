// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{MockShell, RecordingShims, PROJECT_ROOT};
use stackyard_core::application::Workspace;
use stackyard_core::config_handler::ConfigHandler;
use stackyard_core::infrastructure::YamlConfigHandler;

const LOCAL_YAML: &str = r#"
context: local
contexts:
  local:
    vm:
      driver: docker-desktop
    docker:
      enabled: true
      registries:
        registry.test:
          hostport: 5001
    aws:
      enabled: true
      localstack:
        enabled: true
        services: [s3, sqs]
    cluster:
      enabled: true
      controlplanes:
        count: 1
      workers:
        count: 2
"#;

fn config_file(yaml: &str) -> (tempfile::TempDir, Arc<YamlConfigHandler>) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stackyard.yaml");
    std::fs::write(&path, yaml).unwrap();
    let config = Arc::new(YamlConfigHandler::from_yaml_file(&path, None).unwrap());
    (dir, config)
}

#[test]
fn test_render_writes_compose_and_persists_endpoints() {
    let (dir, config) = config_file(LOCAL_YAML);
    let shims = Arc::new(RecordingShims::new());
    let workspace = Workspace::new(config.clone(), Arc::new(MockShell::new(PROJECT_ROOT)), shims.clone()).unwrap();

    let artifacts = workspace.render().unwrap();
    assert_eq!(artifacts.vm_config, None);

    let compose = shims.file(&artifacts.compose_file).unwrap();
    for service in ["aws:", "registry.test:", "controlplane-1:", "worker-1:", "worker-2:"] {
        assert!(compose.contains(service), "missing {service}");
    }
    assert!(compose.contains("published: '6443'") || compose.contains("published: \"6443\""));

    let saved = YamlConfigHandler::from_yaml_file(dir.path().join("stackyard.yaml"), None).unwrap();
    assert_eq!(
        saved.get_string("cluster.workers.nodes[worker-2].endpoint", ""),
        "127.0.0.1:50002"
    );
    assert_eq!(saved.get_string("docker.registry_url", ""), "registry.test.test:5001");
}

#[tokio::test]
async fn test_up_runs_compose_with_rendered_file() {
    let (_dir, config) = config_file(LOCAL_YAML);
    let shell = Arc::new(MockShell::new(PROJECT_ROOT));
    let shims = Arc::new(RecordingShims::new());
    let workspace = Workspace::new(config, shell.clone(), shims.clone())
        .unwrap()
        .with_waits(Duration::ZERO);

    let artifacts = workspace.up().await.unwrap();

    use stackyard_core::shims::Shims;
    assert_eq!(
        shims.env_var("COMPOSE_FILE"),
        Some(artifacts.compose_file.display().to_string())
    );
    assert_eq!(shell.count_containing("docker-compose up --detach --remove-orphans"), 1);
    assert_eq!(shell.count_containing("colima"), 0);
}

#[tokio::test]
async fn test_down_runs_compose_down() {
    let (_dir, config) = config_file(LOCAL_YAML);
    let shell = Arc::new(MockShell::new(PROJECT_ROOT));
    let workspace = Workspace::new(config, shell.clone(), Arc::new(RecordingShims::new())).unwrap();
    workspace.down().await.unwrap();
    assert_eq!(shell.count_containing("down --remove-orphans --volumes"), 1);
}
