//! Application, sidecar and mesh-gateway containers.
//!
//! These containers join their node's pod network namespace. Their
//! `depends_on` lists are filled in later from the
//! [`StartupGraph`](super::startup::StartupGraph).

use std::collections::BTreeMap;

use super::startup::{app_name, gateway_name, sidecar_name};
use super::types::ComposeService;
use crate::config::Config;
use crate::topology::{Node, ProxyKind, Service, Topology, MESH_GATEWAY_WAN_PORT};

pub const PINGPONG_IMAGE: &str = "rboyer/pingpong:latest";
pub const ENVOY_IMAGE: &str = "local/consul-envoy";

const SIDECAR_BOOT_SCRIPT: &str = "/bin/sidecar-boot.sh";
const GATEWAY_BOOT_SCRIPT: &str = "/bin/mesh-gateway-sidecar-boot.sh";
const READY_FILE: &str = "/secrets/ready.val";
const ENVOY_ADMIN_BIND: &str = "0.0.0.0:19000";

/// Path (inside the container) of a service's registration file
pub fn registration_path(node: &Node, service: &Service) -> String {
    format!("/secrets/servicereg__{}__{}.hcl", node.name, service.name)
}

/// Bootstrap arguments handed to the sidecar script ahead of `--`.
///
/// With secret injection the sidecar logs in with a projected service
/// account token; otherwise it reads a pre-issued service token directly.
pub fn sidecar_boot_args(config: &Config, node: &Node, service: &Service, proxy: ProxyKind) -> Vec<String> {
    let mut args = vec![READY_FILE.to_string(), proxy.as_str().to_string()];
    if config.kubernetes_enabled() {
        args.extend([
            "login".to_string(),
            "-t".to_string(),
            format!("/secrets/k8s/service_jwt_token.{}", service.name),
            "-s".to_string(),
            "/tmp/consul.token".to_string(),
        ]);
    } else {
        args.extend([
            "direct".to_string(),
            "-t".to_string(),
            format!("/secrets/service-token--{}.val", service.name),
        ]);
    }
    args.extend(["-r".to_string(), registration_path(node, service)]);
    args
}

/// Display name passed to the ping-pong app, carrying service metadata.
fn app_display_name(service: &Service) -> String {
    if service.meta.is_empty() {
        return service.name.clone();
    }
    let meta = service
        .meta
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",");
    format!("{}--{}", service.name, meta)
}

/// The application and sidecar containers for a node hosting a service.
pub fn app_services(config: &Config, node: &Node, pod: &str) -> BTreeMap<String, ComposeService> {
    let mut services = BTreeMap::new();
    let (Some(service), Some(proxy)) = (node.service(), node.proxy()) else {
        return services;
    };

    let mut app = ComposeService::in_pod(pod, PINGPONG_IMAGE, "app");
    app.labels.extend(node.labels());
    app.init = Some(true);
    app.command = vec![
        "-bind".to_string(),
        format!("0.0.0.0:{}", service.port),
        "-dial".to_string(),
        format!("127.0.0.1:{}", service.upstream_local_port),
        "-name".to_string(),
        app_display_name(service),
    ];
    services.insert(app_name(node, service), app);

    let mut sidecar = ComposeService::in_pod(pod, ENVOY_IMAGE, "sidecar");
    sidecar.labels.extend(node.labels());
    sidecar.init = Some(true);
    sidecar.restart = Some("on-failure".to_string());
    sidecar.volumes = vec![
        "./cache:/secrets:ro".to_string(),
        format!("./sidecar-boot.sh:{}:ro", SIDECAR_BOOT_SCRIPT),
    ];
    let mut command = vec![SIDECAR_BOOT_SCRIPT.to_string()];
    command.extend(sidecar_boot_args(config, node, service, proxy));
    command.extend([
        "--".to_string(),
        "-sidecar-for".to_string(),
        service.name.clone(),
    ]);
    if proxy == ProxyKind::Envoy {
        command.extend(envoy_passthrough(config));
    }
    sidecar.command = command;
    services.insert(sidecar_name(node, service), sidecar);

    services
}

/// The gateway container for a mesh-gateway node, if `node` is one.
pub fn mesh_gateway_service(
    config: &Config,
    topology: &Topology,
    node: &Node,
    pod: &str,
) -> Option<(String, ComposeService)> {
    if !node.is_mesh_gateway() {
        return None;
    }

    let mut gateway = ComposeService::in_pod(pod, ENVOY_IMAGE, "gateway");
    gateway.labels.extend(node.labels());
    gateway.init = Some(true);
    gateway.restart = Some("on-failure".to_string());
    gateway.volumes = vec![
        "./cache:/secrets:ro".to_string(),
        format!("./mesh-gateway-sidecar-boot.sh:{}:ro", GATEWAY_BOOT_SCRIPT),
    ];

    let mut command = vec![
        GATEWAY_BOOT_SCRIPT.to_string(),
        READY_FILE.to_string(),
        "-t".to_string(),
        "/secrets/mesh-gateway.val".to_string(),
        "--".to_string(),
    ];
    if topology.gateways_expose_servers() {
        command.push("-expose-servers".to_string());
    }
    if let Some(wan) = node.public_address() {
        command.push("-wan-address".to_string());
        command.push(format!("{}:{}", wan, MESH_GATEWAY_WAN_PORT));
    }
    command.extend(envoy_passthrough(config));
    gateway.command = command;

    Some((gateway_name(node), gateway))
}

fn envoy_passthrough(config: &Config) -> Vec<String> {
    vec![
        "-admin-bind".to_string(),
        ENVOY_ADMIN_BIND.to_string(),
        "--".to_string(),
        "-l".to_string(),
        config.envoy_log_level.clone(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_loader::parse_config;
    use crate::topology::build_topology;

    fn setup(yaml: &str) -> (Config, Topology) {
        let config = parse_config(yaml).unwrap();
        let topology = build_topology(&config.topology).unwrap();
        (config, topology)
    }

    const YAML: &str = r#"
consul_image: "consul:1.9.0"
envoy_log_level: debug
kubernetes:
  enabled: KUBE
topology:
  network_shape: islands
  datacenters:
    dc1: { servers: 1, clients: 3 }
    dc2: { servers: 1, clients: 1 }
  nodes:
    dc1-client2:
      use_builtin_proxy: true
      meta: { version: v2, zone: a }
    dc1-client3: { mesh_gateway: true }
    dc2-client1: { mesh_gateway: true }
"#;

    fn yaml(kube: bool) -> String {
        YAML.replace("KUBE", if kube { "true" } else { "false" })
    }

    #[test]
    fn test_direct_token_boot_args() {
        let (config, topology) = setup(&yaml(false));
        let node = topology.node("dc1-client1").unwrap();
        let svc = node.service().unwrap();
        let args = sidecar_boot_args(&config, node, svc, ProxyKind::Envoy);
        assert_eq!(
            args,
            vec![
                "/secrets/ready.val",
                "envoy",
                "direct",
                "-t",
                "/secrets/service-token--ping.val",
                "-r",
                "/secrets/servicereg__dc1-client1__ping.hcl",
            ]
        );
    }

    #[test]
    fn test_secret_injection_boot_args() {
        let (config, topology) = setup(&yaml(true));
        let node = topology.node("dc1-client2").unwrap();
        let svc = node.service().unwrap();
        let args = sidecar_boot_args(&config, node, svc, node.proxy().unwrap());
        assert_eq!(&args[..3], ["/secrets/ready.val", "builtin", "login"]);
        assert!(args.contains(&"/secrets/k8s/service_jwt_token.pong".to_string()));
        assert!(args.contains(&"/tmp/consul.token".to_string()));
    }

    #[test]
    fn test_app_and_sidecar() {
        let (config, topology) = setup(&yaml(false));
        let node = topology.node("dc1-client1").unwrap();
        let services = app_services(&config, node, "dc1-client1-pod");

        assert_eq!(services.len(), 2);
        let app = &services["dc1-client1-ping"];
        assert_eq!(app.network_mode.as_deref(), Some("service:dc1-client1-pod"));
        assert_eq!(app.command.last().map(String::as_str), Some("ping"));
        assert_eq!(app.labels["devconsul.type"], "app");
        assert_eq!(app.labels["devconsul.dc"], "dc1");

        let sidecar = &services["dc1-client1-ping-sidecar"];
        assert!(sidecar.command.contains(&"-admin-bind".to_string()));
        assert_eq!(sidecar.command.last().map(String::as_str), Some("debug"));
    }

    #[test]
    fn test_builtin_proxy_skips_envoy_args() {
        let (config, topology) = setup(&yaml(false));
        let node = topology.node("dc1-client2").unwrap();
        let services = app_services(&config, node, "dc1-client2-pod");

        let sidecar = &services["dc1-client2-pong-sidecar"];
        assert!(!sidecar.command.contains(&"-admin-bind".to_string()));
        assert_eq!(sidecar.command.last().map(String::as_str), Some("pong"));

        let app = &services["dc1-client2-pong"];
        assert_eq!(app.command.last().map(String::as_str), Some("pong--version=v2,zone=a"));
    }

    #[test]
    fn test_mesh_gateway() {
        let (config, topology) = setup(&yaml(false));

        let node = topology.node("dc1-client3").unwrap();
        assert!(app_services(&config, node, "dc1-client3-pod").is_empty());

        let (name, gateway) = mesh_gateway_service(&config, &topology, node, "dc1-client3-pod").unwrap();
        assert_eq!(name, "dc1-client3-mesh-gateway");
        assert!(gateway.command.contains(&"-expose-servers".to_string()));
        assert!(gateway.command.contains(&"10.1.1.23:443".to_string()));
        assert_eq!(gateway.labels["devconsul.type"], "gateway");
        assert_eq!(gateway.labels["devconsul.node"], "dc1-client3");

        let plain = topology.node("dc1-client1").unwrap();
        assert!(mesh_gateway_service(&config, &topology, plain, "dc1-client1-pod").is_none());
    }

    #[test]
    fn test_dual_gateway_exposes_servers() {
        let yaml = r#"
consul_image: "consul:1.9.0"
topology:
  network_shape: dual
  datacenters:
    dc1: { servers: 1, clients: 2 }
    dc2: { servers: 1, clients: 1 }
  nodes:
    dc1-client2: { mesh_gateway: true }
"#;
        let (config, topology) = setup(yaml);
        let node = topology.node("dc1-client2").unwrap();
        let (_, gateway) = mesh_gateway_service(&config, &topology, node, "dc1-client2-pod").unwrap();

        let args: Vec<&str> = gateway.command.iter().map(String::as_str).collect();
        let dashes = args.iter().position(|a| *a == "--").unwrap();
        assert_eq!(
            &args[dashes + 1..dashes + 4],
            ["-expose-servers", "-wan-address", "10.1.1.22:443"]
        );
    }

    #[test]
    fn test_flat_gateway_has_no_wan_arguments() {
        let yaml = r#"
consul_image: "consul:1.9.0"
topology:
  datacenters:
    dc1: { servers: 1, clients: 1 }
  nodes:
    dc1-client1: { mesh_gateway: true }
"#;
        let (config, topology) = setup(yaml);
        let node = topology.node("dc1-client1").unwrap();
        let (_, gateway) = mesh_gateway_service(&config, &topology, node, "dc1-client1-pod").unwrap();
        assert!(!gateway.command.contains(&"-wan-address".to_string()));
        assert!(!gateway.command.contains(&"-expose-servers".to_string()));
    }
}
