//! Topology synthesis.
//!
//! Expands the per-datacenter counts of a [`TopologyConfig`] into concrete,
//! deterministically addressed nodes. Validation runs first and fails fast
//! on the first violation, in this order:
//!
//! 1. the primary datacenter is declared
//! 2. every datacenter name matches `dc<positive integer>`
//! 3. every datacenter has at least one server and one client
//! 4. the network shape is one of the supported selectors
//!
//! followed by the checks that depend on those (role group size, override
//! service names and targets, gateway reachability).

use log::{debug, warn};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use super::model::Topology;
use super::shape::NetworkShape;
use super::types::{
    Address, Datacenter, Node, NodeKind, ProxyKind, Service, SERVICE_PORT, UPSTREAM_LOCAL_PORT,
};
use crate::config::{DatacenterSpec, NodeOverride, TopologyConfig, PRIMARY_DATACENTER};
use crate::error::ConfigError;
use crate::ip::{AddressBlocks, AddressRegistry, HostRole, MAX_NODES_PER_ROLE};

static DATACENTER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^dc([1-9][0-9]*)$").expect("Invalid datacenter name regex"));

static SERVICE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-z0-9]*(-[a-z0-9]+)*$").expect("Invalid service name regex")
});

/// Container name suffixes a service name must not end with.
const RESERVED_SERVICE_SUFFIXES: &[&str] = &["pod", "sidecar", "mesh-gateway"];

const PING: &str = "ping";
const PONG: &str = "pong";

/// Build a topology from the topology block of the input.
pub fn build_topology(config: &TopologyConfig) -> Result<Topology, ConfigError> {
    TopologyBuilder::new(config).build()
}

/// Expands datacenter specs and overrides into a [`Topology`].
pub struct TopologyBuilder<'a> {
    datacenters: &'a BTreeMap<String, DatacenterSpec>,
    network_shape: Option<&'a str>,
    overrides: &'a BTreeMap<String, NodeOverride>,
}

impl<'a> TopologyBuilder<'a> {
    pub fn new(config: &'a TopologyConfig) -> Self {
        Self {
            datacenters: &config.datacenters,
            network_shape: config.network_shape.as_deref(),
            overrides: &config.nodes,
        }
    }

    pub fn build(self) -> Result<Topology, ConfigError> {
        let (shape, mut datacenters) = self.validate()?;
        // Datacenters are processed in name order regardless of input order.
        datacenters.sort_by(|a, b| a.name.cmp(&b.name));

        self.warn_unused_overrides();

        let mut registry = AddressRegistry::new();
        let mut nodes = Vec::new();
        for dc in &datacenters {
            self.synthesize_datacenter(dc, shape, &mut registry, &mut nodes)?;
        }

        debug!(
            "Built {} topology: {} datacenter(s), {} node(s), {} address(es)",
            shape,
            datacenters.len(),
            nodes.len(),
            registry.len()
        );

        Ok(Topology::from_parts(shape, datacenters, nodes))
    }

    fn validate(&self) -> Result<(NetworkShape, Vec<Datacenter>), ConfigError> {
        if !self.datacenters.contains_key(PRIMARY_DATACENTER) {
            return Err(ConfigError::MissingPrimaryDatacenter(
                PRIMARY_DATACENTER.to_string(),
            ));
        }

        let mut indexes = Vec::with_capacity(self.datacenters.len());
        for name in self.datacenters.keys() {
            indexes.push(parse_datacenter_index(name)?);
        }

        for (name, spec) in self.datacenters {
            if spec.servers == 0 {
                return Err(ConfigError::NoServers(name.clone()));
            }
            if spec.clients == 0 {
                return Err(ConfigError::NoClients(name.clone()));
            }
        }

        let shape = NetworkShape::from_selector(self.network_shape)?;

        for (name, spec) in self.datacenters {
            check_role_limit(name, "server", spec.servers)?;
            check_role_limit(name, "client", spec.clients)?;
        }

        for (node, o) in self.overrides {
            for name in [&o.service_name, &o.upstream_name].into_iter().flatten() {
                check_service_name(node, name)?;
            }
            if let Some(dc) = &o.upstream_datacenter {
                if !self.datacenters.contains_key(dc) {
                    return Err(ConfigError::UnknownUpstreamDatacenter {
                        node: node.clone(),
                        datacenter: dc.clone(),
                    });
                }
            }
        }

        if shape.federation().via_gateways() && self.datacenters.len() > 1 {
            for (name, spec) in self.datacenters {
                let has_gateway = (1..=spec.clients)
                    .any(|idx| self.override_for(&client_name(name, idx)).mesh_gateway);
                if !has_gateway {
                    return Err(ConfigError::MissingMeshGateway(name.clone()));
                }
            }
        }

        let datacenters = self
            .datacenters
            .iter()
            .zip(indexes)
            .map(|((name, spec), index)| {
                let blocks = AddressBlocks::new(index);
                Datacenter {
                    name: name.clone(),
                    primary: name == PRIMARY_DATACENTER,
                    index,
                    servers: spec.servers,
                    clients: spec.clients,
                    base_ip: blocks.local_base(),
                    wan_base_ip: blocks.wan_base(),
                }
            })
            .collect();

        Ok((shape, datacenters))
    }

    fn synthesize_datacenter(
        &self,
        dc: &Datacenter,
        shape: NetworkShape,
        registry: &mut AddressRegistry,
        nodes: &mut Vec<Node>,
    ) -> Result<(), ConfigError> {
        let blocks = AddressBlocks::new(dc.index);
        let local_network = shape.local_network(&dc.name);

        for idx in 1..=dc.servers {
            let name = server_name(&dc.name, idx);
            let ip = allocate(blocks.local_ip(HostRole::Server, idx), &dc.name, "server", dc.servers)?;
            registry.register(ip, &name)?;

            let mut node = Node::new(
                &dc.name,
                name,
                NodeKind::Server,
                idx - 1,
                Address {
                    network: local_network.to_string(),
                    ip,
                },
            );
            if shape.servers_on_wan() {
                let wan = allocate(blocks.wan_ip(HostRole::Server, idx), &dc.name, "server", dc.servers)?;
                registry.register(wan, &node.name)?;
                node.add_wan_address(wan);
            }
            debug!("Synthesized {} at {}", node.name, ip);
            nodes.push(node);
        }

        for idx in 1..=dc.clients {
            let name = client_name(&dc.name, idx);
            let ip = allocate(blocks.local_ip(HostRole::Client, idx), &dc.name, "client", dc.clients)?;
            registry.register(ip, &name)?;

            let node_override = self.override_for(&name);
            let kind = resolve_client_kind(idx, &node_override);
            let gateway = matches!(kind, NodeKind::MeshGateway);

            let mut node = Node::new(
                &dc.name,
                name,
                kind,
                idx - 1,
                Address {
                    network: local_network.to_string(),
                    ip,
                },
            );
            if gateway && shape.gateways_on_wan() {
                let wan = allocate(blocks.wan_ip(HostRole::Client, idx), &dc.name, "client", dc.clients)?;
                registry.register(wan, &node.name)?;
                node.add_wan_address(wan);
            }
            debug!("Synthesized {} ({}) at {}", node.name, node.role_name(), ip);
            nodes.push(node);
        }

        Ok(())
    }

    /// Override record for a node; missing entries behave as all-unset.
    fn override_for(&self, node_name: &str) -> NodeOverride {
        self.overrides.get(node_name).cloned().unwrap_or_default()
    }

    fn warn_unused_overrides(&self) {
        for name in self.overrides.keys() {
            let is_client = self.datacenters.iter().any(|(dc, spec)| {
                (1..=spec.clients).any(|idx| client_name(dc, idx) == *name)
            });
            if is_client {
                continue;
            }
            let is_server = self.datacenters.iter().any(|(dc, spec)| {
                (1..=spec.servers).any(|idx| server_name(dc, idx) == *name)
            });
            if is_server {
                warn!("Ignoring node override for server {}: only clients can be overridden", name);
            } else {
                warn!("Ignoring node override for unknown node {}", name);
            }
        }
    }
}

/// Resolve a client's role from its index and override record.
fn resolve_client_kind(idx: u32, node_override: &NodeOverride) -> NodeKind {
    if node_override.mesh_gateway {
        return NodeKind::MeshGateway;
    }

    let parity_name = if idx % 2 == 1 { PING } else { PONG };
    let name = node_override
        .service_name
        .clone()
        .unwrap_or_else(|| parity_name.to_string());
    let upstream_name = node_override.upstream_name.clone().unwrap_or_else(|| {
        opposite_service(&name)
            .or_else(|| opposite_service(parity_name))
            .unwrap_or(PONG)
            .to_string()
    });

    let proxy = if node_override.use_builtin_proxy {
        ProxyKind::Builtin
    } else {
        ProxyKind::Envoy
    };

    NodeKind::Client {
        service: Service {
            name,
            port: SERVICE_PORT,
            upstream_name,
            upstream_datacenter: node_override.upstream_datacenter.clone(),
            upstream_local_port: UPSTREAM_LOCAL_PORT,
            upstream_extra_hcl: node_override.upstream_extra_hcl.clone(),
            meta: node_override.meta.clone(),
        },
        proxy,
    }
}

fn opposite_service(name: &str) -> Option<&'static str> {
    match name {
        PING => Some(PONG),
        PONG => Some(PING),
        _ => None,
    }
}

fn parse_datacenter_index(name: &str) -> Result<u8, ConfigError> {
    DATACENTER_NAME
        .captures(name)
        .and_then(|caps| caps[1].parse::<u8>().ok())
        .ok_or_else(|| ConfigError::InvalidDatacenterName(name.to_string()))
}

/// Service names become container names and file names, so they are
/// limited to lowercase words joined by single hyphens.
fn check_service_name(node: &str, name: &str) -> Result<(), ConfigError> {
    let invalid = |reason| ConfigError::InvalidServiceName {
        node: node.to_string(),
        name: name.to_string(),
        reason,
    };
    if !SERVICE_NAME.is_match(name) {
        return Err(invalid("only lowercase letters, digits and single hyphens are allowed"));
    }
    let reserved = RESERVED_SERVICE_SUFFIXES
        .iter()
        .any(|suffix| name == *suffix || name.ends_with(&format!("-{}", suffix)));
    if reserved {
        return Err(invalid("collides with a generated container name"));
    }
    Ok(())
}

fn check_role_limit(datacenter: &str, role: &'static str, count: u32) -> Result<(), ConfigError> {
    if count > MAX_NODES_PER_ROLE {
        return Err(ConfigError::TooManyNodes {
            datacenter: datacenter.to_string(),
            role,
            count,
            limit: MAX_NODES_PER_ROLE,
        });
    }
    Ok(())
}

fn allocate(
    ip: Option<std::net::Ipv4Addr>,
    datacenter: &str,
    role: &'static str,
    count: u32,
) -> Result<std::net::Ipv4Addr, ConfigError> {
    ip.ok_or_else(|| ConfigError::TooManyNodes {
        datacenter: datacenter.to_string(),
        role,
        count,
        limit: MAX_NODES_PER_ROLE,
    })
}

pub fn server_name(datacenter: &str, idx: u32) -> String {
    format!("{}-server{}", datacenter, idx)
}

pub fn client_name(datacenter: &str, idx: u32) -> String {
    format!("{}-client{}", datacenter, idx)
}
