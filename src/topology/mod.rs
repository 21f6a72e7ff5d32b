//! Network topology module.
//!
//! Turns the declarative topology block into a resolved [`Topology`]:
//! datacenters, nodes, addresses and service placements. The topology is
//! built once per run and is read-only afterwards; every renderer derives
//! its output from it.

pub mod builder;
pub mod model;
pub mod shape;
pub mod types;

// Re-export key types and functions for easier access
pub use builder::{build_topology, client_name, server_name, TopologyBuilder};
pub use model::{Topology, MESH_GATEWAY_WAN_PORT};
pub use shape::{AddressScope, NetworkShape, WanFederation, LAN_NETWORK, WAN_NETWORK};
pub use types::{Address, Datacenter, Network, Node, NodeKind, ProxyKind, Service};
