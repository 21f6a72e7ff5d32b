//! Topology entity types.
//!
//! Plain data produced by the builder. A node is exactly one of: a server,
//! a client hosting one application [`Service`], or a client acting as a
//! mesh gateway. [`NodeKind`] makes any other combination unrepresentable.

use serde::Serialize;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use super::shape::WAN_NETWORK;
use crate::error::TopologyError;

/// Port every application service listens on
pub const SERVICE_PORT: u16 = 8080;
/// Local port the sidecar binds for the upstream
pub const UPSTREAM_LOCAL_PORT: u16 = 9090;

/// One resolved datacenter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Datacenter {
    pub name: String,
    pub primary: bool,
    /// Numeric suffix of the name (`dc3` -> 3)
    pub index: u8,
    pub servers: u32,
    pub clients: u32,
    /// Three-octet prefix of the local block
    pub base_ip: String,
    /// Three-octet prefix of the WAN block
    pub wan_base_ip: String,
}

/// A network the topology declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Network {
    pub name: String,
    pub subnet: String,
}

/// An address on a named network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Address {
    pub network: String,
    pub ip: Ipv4Addr,
}

/// Which sidecar implementation fronts a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    Envoy,
    Builtin,
}

impl ProxyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProxyKind::Envoy => "envoy",
            ProxyKind::Builtin => "builtin",
        }
    }
}

/// Application service hosted on a client node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Service {
    pub name: String,
    pub port: u16,
    pub upstream_name: String,
    /// `None` means the node's own datacenter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_datacenter: Option<String>,
    pub upstream_local_port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_extra_hcl: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
}

/// Role of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Server,
    Client { service: Service, proxy: ProxyKind },
    MeshGateway,
}

/// A fully resolved node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub datacenter: String,
    pub name: String,
    pub kind: NodeKind,
    /// Local address first, WAN address (if any) second
    pub addresses: Vec<Address>,
    /// Zero-based position within the node's role group
    pub index: u32,
    local_network: String,
}

impl Node {
    pub(crate) fn new(
        datacenter: &str,
        name: String,
        kind: NodeKind,
        index: u32,
        local: Address,
    ) -> Self {
        Self {
            datacenter: datacenter.to_string(),
            name,
            kind,
            index,
            local_network: local.network.clone(),
            addresses: vec![local],
        }
    }

    pub(crate) fn add_wan_address(&mut self, ip: Ipv4Addr) {
        self.addresses.push(Address {
            network: WAN_NETWORK.to_string(),
            ip,
        });
    }

    pub fn is_server(&self) -> bool {
        matches!(self.kind, NodeKind::Server)
    }

    pub fn is_mesh_gateway(&self) -> bool {
        matches!(self.kind, NodeKind::MeshGateway)
    }

    pub fn service(&self) -> Option<&Service> {
        match &self.kind {
            NodeKind::Client { service, .. } => Some(service),
            _ => None,
        }
    }

    pub fn proxy(&self) -> Option<ProxyKind> {
        match &self.kind {
            NodeKind::Client { proxy, .. } => Some(*proxy),
            _ => None,
        }
    }

    pub fn role_name(&self) -> &'static str {
        match self.kind {
            NodeKind::Server => "server",
            NodeKind::Client { .. } => "client",
            NodeKind::MeshGateway => "mesh-gateway",
        }
    }

    pub fn local_network(&self) -> &str {
        &self.local_network
    }

    pub fn local_address(&self) -> Result<Ipv4Addr, TopologyError> {
        self.addresses
            .iter()
            .find(|a| a.network == self.local_network)
            .map(|a| a.ip)
            .ok_or_else(|| TopologyError::NoLocalAddress(self.name.clone()))
    }

    /// WAN address, present only when the shape put this node on the WAN.
    pub fn public_address(&self) -> Option<Ipv4Addr> {
        self.addresses
            .iter()
            .find(|a| a.network == WAN_NETWORK)
            .map(|a| a.ip)
    }

    pub fn require_public_address(&self) -> Result<Ipv4Addr, TopologyError> {
        self.public_address()
            .ok_or_else(|| TopologyError::NoPublicAddress(self.name.clone()))
    }

    /// Container labels identifying this node.
    pub fn labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("devconsul.dc".to_string(), self.datacenter.clone()),
            ("devconsul.node".to_string(), self.name.clone()),
        ])
    }

    /// Prefix of this node's TLS certificate files
    pub fn tls_file_prefix(&self) -> String {
        let role = if self.is_server() { "server" } else { "client" };
        format!("{}-{}-consul-{}", self.datacenter, role, self.index)
    }
}
