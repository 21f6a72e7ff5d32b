//! Orchestration manifest assembly.
//!
//! Each node becomes a pause container ("pod") owning the node's network
//! attachments, an agent container sharing the pod's namespace, and the
//! node's gateway or application containers. Startup edges are applied from
//! the [`StartupGraph`] after it has been checked for cycles.

use std::collections::BTreeMap;

use super::agent::agent_config;
use super::services::{app_services, mesh_gateway_service};
use super::startup::{agent_name, pod_name, StartupGraph};
use super::types::{
    ComposeFile, ComposeIpam, ComposeNetwork, ComposeService, ComposeSubnet, ComposeVolume,
    ServiceNetwork,
};
use crate::config::Config;
use crate::error::RenderError;
use crate::topology::{Node, Topology};

pub const COMPOSE_FILE: &str = "docker-compose.yml";

const COMPOSE_VERSION: &str = "3.7";
const POD_IMAGE: &str = "gcr.io/google_containers/pause:1.0";
const DNS_SERVER: &str = "8.8.8.8";
const PROMETHEUS_VOLUME: &str = "prometheus-data";
const GRAFANA_VOLUME: &str = "grafana-data";

const HEADER: &str = "\
# consul:
#   client_addr is set to 0.0.0.0 to make control from the host easier
#   it should be disabled for real topologies

# envoy:
#   admin-bind is set to 0.0.0.0 to make control from the host easier
#   it should be disabled for real topologies

";

/// Compose network name for a topology network
pub fn network_key(network: &str) -> String {
    format!("consul-{}", network)
}

/// Render the orchestration manifest as YAML.
pub fn render_compose(config: &Config, topology: &Topology) -> Result<String, RenderError> {
    let compose = build_compose(config, topology)?;
    let body = serde_yaml::to_string(&compose)?;
    Ok(format!("{}{}", HEADER, body))
}

pub fn build_compose(config: &Config, topology: &Topology) -> Result<ComposeFile, RenderError> {
    let graph = StartupGraph::from_topology(topology)?;
    graph.startup_order()?;

    let networks = topology
        .networks()
        .into_iter()
        .map(|n| {
            let network = ComposeNetwork {
                ipam: ComposeIpam {
                    driver: "default".to_string(),
                    config: vec![ComposeSubnet { subnet: n.subnet }],
                },
            };
            (network_key(&n.name), network)
        })
        .collect();

    let mut volumes = BTreeMap::new();
    let mut services = BTreeMap::new();

    if config.prometheus_enabled() {
        volumes.insert(PROMETHEUS_VOLUME.to_string(), ComposeVolume::default());
        volumes.insert(GRAFANA_VOLUME.to_string(), ComposeVolume::default());
        services.extend(infra_services());
    }

    topology.walk(|node| {
        volumes.insert(node.name.clone(), ComposeVolume::default());
        services.extend(node_services(config, topology, node)?);
        Ok::<(), RenderError>(())
    })?;

    for (name, service) in services.iter_mut() {
        service.depends_on = graph.depends_on(name).to_vec();
    }

    Ok(ComposeFile {
        version: COMPOSE_VERSION.to_string(),
        networks,
        volumes,
        services,
    })
}

fn node_services(
    config: &Config,
    topology: &Topology,
    node: &Node,
) -> Result<BTreeMap<String, ComposeService>, RenderError> {
    let pod = pod_name(node);
    let mut services = BTreeMap::new();

    let mut pod_service = ComposeService {
        container_name: Some(pod.clone()),
        hostname: Some(pod.clone()),
        image: POD_IMAGE.to_string(),
        restart: Some("always".to_string()),
        dns: Some(DNS_SERVER.to_string()),
        ..Default::default()
    };
    pod_service.labels.insert("devconsul.type".to_string(), "pod".to_string());
    pod_service.labels.extend(node.labels());
    for address in &node.addresses {
        pod_service.networks.insert(
            network_key(&address.network),
            ServiceNetwork {
                ipv4_address: address.ip.to_string(),
            },
        );
    }

    let mut agent = ComposeService::in_pod(&pod, &config.consul_image, "consul");
    agent.labels.extend(node.labels());
    agent.volumes = vec![
        format!("{}:/consul/data", node.name),
        "./cache/tls:/tls:ro".to_string(),
    ];
    agent.command = vec![
        "agent".to_string(),
        "-hcl".to_string(),
        agent_config(config, topology, node)?,
    ];

    services.insert(agent_name(node), agent);
    if let Some((name, gateway)) = mesh_gateway_service(config, topology, node, &pod) {
        services.insert(name, gateway);
    }
    services.extend(app_services(config, node, &pod));
    services.insert(pod, pod_service);

    Ok(services)
}

fn infra_services() -> BTreeMap<String, ComposeService> {
    let mut prometheus = ComposeService {
        image: "prom/prometheus:latest".to_string(),
        restart: Some("always".to_string()),
        dns: Some(DNS_SERVER.to_string()),
        network_mode: Some("host".to_string()),
        volumes: vec![
            format!("{}:/prometheus-data", PROMETHEUS_VOLUME),
            "./cache/prometheus.yml:/etc/prometheus/prometheus.yml:ro".to_string(),
        ],
        ..Default::default()
    };
    prometheus.labels.insert("devconsul.type".to_string(), "infra".to_string());

    let mut grafana = ComposeService::in_pod("prometheus", "grafana/grafana:latest", "infra");
    grafana.restart = Some("always".to_string());
    grafana.init = Some(true);
    grafana.volumes = vec![
        format!("{}:/var/lib/grafana", GRAFANA_VOLUME),
        "./cache/grafana-prometheus.yml:/etc/grafana/provisioning/datasources/prometheus.yml:ro"
            .to_string(),
        "./cache/grafana.ini:/etc/grafana/grafana.ini:ro".to_string(),
    ];

    BTreeMap::from([
        ("prometheus".to_string(), prometheus),
        ("grafana".to_string(), grafana),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_loader::parse_config;
    use crate::topology::build_topology;

    const YAML: &str = r#"
consul_image: "consul:1.9.0"
monitor:
  prometheus: PROM
topology:
  network_shape: dual
  datacenters:
    dc1: { servers: 1, clients: 2 }
    dc2: { servers: 1, clients: 1 }
  nodes:
    dc1-client2: { mesh_gateway: true }
"#;

    fn setup(prometheus: bool) -> (Config, Topology) {
        let yaml = YAML.replace("PROM", if prometheus { "true" } else { "false" });
        let config = parse_config(&yaml).unwrap();
        let topology = build_topology(&config.topology).unwrap();
        (config, topology)
    }

    #[test]
    fn test_networks_and_volumes() {
        let (config, topology) = setup(false);
        let compose = build_compose(&config, &topology).unwrap();

        let networks: Vec<&str> = compose.networks.keys().map(String::as_str).collect();
        assert_eq!(networks, vec!["consul-dc1", "consul-dc2", "consul-wan"]);
        assert_eq!(compose.networks["consul-dc2"].ipam.config[0].subnet, "10.0.2.0/24");

        let volumes: Vec<&str> = compose.volumes.keys().map(String::as_str).collect();
        assert_eq!(
            volumes,
            vec!["dc1-client1", "dc1-client2", "dc1-server1", "dc2-client1", "dc2-server1"]
        );
        assert!(!compose.services.contains_key("prometheus"));
    }

    #[test]
    fn test_metrics_services_and_volumes() {
        let (config, topology) = setup(true);
        let compose = build_compose(&config, &topology).unwrap();
        assert!(compose.volumes.contains_key("prometheus-data"));
        assert!(compose.volumes.contains_key("grafana-data"));
        assert_eq!(
            compose.services["grafana"].network_mode.as_deref(),
            Some("service:prometheus")
        );
    }

    #[test]
    fn test_pod_networks() {
        let (config, topology) = setup(false);
        let compose = build_compose(&config, &topology).unwrap();

        let server_pod = &compose.services["dc1-server1-pod"];
        assert_eq!(server_pod.networks["consul-dc1"].ipv4_address, "10.0.1.11");
        assert_eq!(server_pod.networks["consul-wan"].ipv4_address, "10.1.1.11");

        let client_pod = &compose.services["dc1-client1-pod"];
        assert_eq!(client_pod.networks.len(), 1);
    }

    #[test]
    fn test_depends_on_applied() {
        let (config, topology) = setup(false);
        let compose = build_compose(&config, &topology).unwrap();

        assert_eq!(compose.services["dc1-server1"].depends_on, vec!["dc1-server1-pod"]);
        assert_eq!(
            compose.services["dc2-client1"].depends_on,
            vec!["dc2-client1-pod", "dc2-server1"]
        );
        assert_eq!(compose.services["dc1-client1-ping-sidecar"].depends_on, vec!["dc1-client1-ping"]);
        assert_eq!(compose.services["dc1-client2-mesh-gateway"].depends_on, vec!["dc1-client2"]);
        assert!(compose.services["dc1-client1-pod"].depends_on.is_empty());
    }

    #[test]
    fn test_render_is_deterministic() {
        let (config, topology) = setup(true);
        let first = render_compose(&config, &topology).unwrap();
        let second = render_compose(&config, &topology).unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("# consul:"));
        assert!(first.contains("version: '3.7'") || first.contains("version: \"3.7\""));

        // The rendered manifest is valid YAML with the agent config inline.
        let doc: serde_yaml::Value = serde_yaml::from_str(&first).unwrap();
        let command = &doc["services"]["dc1-server1"]["command"];
        assert_eq!(command[0].as_str(), Some("agent"));
        assert!(command[2].as_str().unwrap().contains("bootstrap_expect       = 1"));
    }
}
