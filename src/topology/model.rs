//! The immutable, queryable topology.
//!
//! Nodes are stored in the one order every generator walks: all servers
//! across all datacenters (datacenter then index), followed by all clients
//! likewise. Artifacts are diffed byte-for-byte between runs, so this order
//! must never depend on hashing.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use super::shape::{AddressScope, NetworkShape, WanFederation, LAN_NETWORK, WAN_NETWORK};
use super::types::{Datacenter, Network, Node};
use crate::error::TopologyError;
use crate::ip::{datacenter_subnet, LAN_SUBNET, WAN_SUBNET};

/// Port mesh gateways accept WAN traffic on
pub const MESH_GATEWAY_WAN_PORT: u16 = 443;

#[derive(Debug, Clone)]
pub struct Topology {
    shape: NetworkShape,
    federation: WanFederation,
    gateways_expose_servers: bool,
    datacenters: Vec<Datacenter>,
    nodes: Vec<Node>,
    by_name: HashMap<String, usize>,
    server_count: usize,
}

impl Topology {
    /// Assemble a topology from datacenters (already name-sorted) and nodes
    /// in construction order.
    pub(crate) fn from_parts(
        shape: NetworkShape,
        datacenters: Vec<Datacenter>,
        constructed: Vec<Node>,
    ) -> Self {
        let (mut nodes, clients): (Vec<Node>, Vec<Node>) =
            constructed.into_iter().partition(Node::is_server);
        let server_count = nodes.len();
        nodes.extend(clients);

        let by_name = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.name.clone(), i))
            .collect();

        Self {
            shape,
            federation: shape.federation(),
            gateways_expose_servers: shape.gateways_expose_servers(),
            datacenters,
            nodes,
            by_name,
            server_count,
        }
    }

    pub fn shape(&self) -> NetworkShape {
        self.shape
    }

    pub fn federation(&self) -> WanFederation {
        self.federation
    }

    /// Whether mesh gateways expose this datacenter's servers over the WAN.
    pub fn gateways_expose_servers(&self) -> bool {
        self.gateways_expose_servers
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, name: &str) -> Result<&Node, TopologyError> {
        self.by_name
            .get(name)
            .map(|&i| &self.nodes[i])
            .ok_or_else(|| TopologyError::NodeNotFound(name.to_string()))
    }

    /// Every node in stable order: servers first, then clients.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.iter()
    }

    pub fn servers(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes[..self.server_count].iter()
    }

    pub fn clients(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes[self.server_count..].iter()
    }

    /// Run `f` over every node in stable order, stopping at the first error.
    pub fn walk<E>(&self, mut f: impl FnMut(&Node) -> Result<(), E>) -> Result<(), E> {
        self.nodes.iter().try_for_each(|n| f(n))
    }

    /// Datacenters sorted by name.
    pub fn datacenters(&self) -> &[Datacenter] {
        &self.datacenters
    }

    pub fn datacenter(&self, name: &str) -> Result<&Datacenter, TopologyError> {
        self.datacenters
            .iter()
            .find(|dc| dc.name == name)
            .ok_or_else(|| TopologyError::DatacenterNotFound(name.to_string()))
    }

    /// Local addresses of every server in `datacenter`, in index order.
    pub fn server_addresses(&self, datacenter: &str) -> Result<Vec<Ipv4Addr>, TopologyError> {
        self.datacenter(datacenter)?;
        self.servers()
            .filter(|n| n.datacenter == datacenter)
            .map(Node::local_address)
            .collect()
    }

    /// First server constructed for `datacenter`.
    pub fn leader(&self, datacenter: &str) -> Result<&Node, TopologyError> {
        self.servers()
            .find(|n| n.datacenter == datacenter)
            .ok_or_else(|| TopologyError::DatacenterNotFound(datacenter.to_string()))
    }

    pub fn leader_address(
        &self,
        datacenter: &str,
        scope: AddressScope,
    ) -> Result<Ipv4Addr, TopologyError> {
        let leader = self.leader(datacenter)?;
        match scope {
            AddressScope::Local => leader.local_address(),
            AddressScope::Public => leader.require_public_address(),
        }
    }

    /// Static WAN join list for servers, one leader per datacenter.
    ///
    /// Empty when federation goes through mesh gateways instead.
    pub fn retry_join_wan(&self) -> Result<Vec<Ipv4Addr>, TopologyError> {
        match self.federation.retry_join_scope() {
            Some(scope) => self
                .datacenters
                .iter()
                .map(|dc| self.leader_address(&dc.name, scope))
                .collect(),
            None => Ok(Vec::new()),
        }
    }

    /// `ip:port` WAN endpoints of the mesh gateways in `datacenter`.
    pub fn gateway_addresses(&self, datacenter: &str) -> Vec<String> {
        self.clients()
            .filter(|n| n.datacenter == datacenter && n.is_mesh_gateway())
            .filter_map(Node::public_address)
            .map(|ip| format!("{}:{}", ip, MESH_GATEWAY_WAN_PORT))
            .collect()
    }

    /// Networks the topology declares: one per datacenter (or the single
    /// shared LAN), plus the WAN when the shape needs one.
    pub fn networks(&self) -> Vec<Network> {
        let mut networks = match self.shape {
            NetworkShape::Flat => vec![Network {
                name: LAN_NETWORK.to_string(),
                subnet: LAN_SUBNET.to_string(),
            }],
            NetworkShape::Dual | NetworkShape::Islands => self
                .datacenters
                .iter()
                .map(|dc| Network {
                    name: dc.name.clone(),
                    subnet: datacenter_subnet(dc.index),
                })
                .collect(),
        };
        if self.shape.declares_wan_network() {
            networks.push(Network {
                name: WAN_NETWORK.to_string(),
                subnet: WAN_SUBNET.to_string(),
            });
        }
        networks
    }
}
