//! # Node Registry
//!
//! Machine-readable summary of a generated topology, written next to the
//! other cache artifacts so test harnesses can discover nodes and their
//! addresses without parsing the orchestration manifest.
//!
//! ```json
//! {
//!   "network_shape": "dual",
//!   "datacenters": [ { "name": "dc1", "primary": true, ... } ],
//!   "nodes": [
//!     {
//!       "name": "dc1-server1",
//!       "datacenter": "dc1",
//!       "role": "server",
//!       "local_ip": "10.0.1.11",
//!       "wan_ip": "10.1.1.11"
//!     }
//!   ]
//! }
//! ```
//!
//! Nodes appear in the topology's stable order: all servers, then all
//! clients, datacenters sorted by name.

use serde::Serialize;
use std::net::Ipv4Addr;

use crate::error::RenderError;
use crate::render::Artifact;
use crate::topology::{Datacenter, Node, ProxyKind, Service, Topology};

pub const REGISTRY_FILE: &str = "cache/topology.json";

/// One node in the registry.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub name: String,
    pub datacenter: String,
    /// `server`, `client` or `mesh-gateway`
    pub role: &'static str,
    pub local_ip: Ipv4Addr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wan_ip: Option<Ipv4Addr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<Service>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyKind>,
}

impl NodeInfo {
    fn from_node(node: &Node) -> Result<Self, RenderError> {
        Ok(Self {
            name: node.name.clone(),
            datacenter: node.datacenter.clone(),
            role: node.role_name(),
            local_ip: node.local_address()?,
            wan_ip: node.public_address(),
            service: node.service().cloned(),
            proxy: node.proxy(),
        })
    }
}

/// Registry of every node in the topology.
#[derive(Serialize, Debug)]
pub struct NodeRegistry {
    pub network_shape: &'static str,
    pub datacenters: Vec<Datacenter>,
    pub nodes: Vec<NodeInfo>,
}

impl NodeRegistry {
    pub fn from_topology(topology: &Topology) -> Result<Self, RenderError> {
        let mut nodes = Vec::with_capacity(topology.len());
        topology.walk(|node| -> Result<(), RenderError> {
            nodes.push(NodeInfo::from_node(node)?);
            Ok(())
        })?;

        Ok(Self {
            network_shape: topology.shape().as_str(),
            datacenters: topology.datacenters().to_vec(),
            nodes,
        })
    }

    pub fn to_artifact(&self) -> Result<Artifact, RenderError> {
        let mut body = serde_json::to_string_pretty(self)?;
        body.push('\n');
        Ok(Artifact::new(REGISTRY_FILE, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatacenterSpec, NodeOverride, TopologyConfig};
    use crate::topology::build_topology;
    use std::collections::BTreeMap;

    fn topology() -> Topology {
        let config = TopologyConfig {
            network_shape: Some("islands".to_string()),
            datacenters: BTreeMap::from([
                ("dc1".to_string(), DatacenterSpec { servers: 1, clients: 2 }),
                ("dc2".to_string(), DatacenterSpec { servers: 1, clients: 1 }),
            ]),
            nodes: BTreeMap::from([
                (
                    "dc1-client2".to_string(),
                    NodeOverride {
                        mesh_gateway: true,
                        ..Default::default()
                    },
                ),
                (
                    "dc2-client1".to_string(),
                    NodeOverride {
                        mesh_gateway: true,
                        ..Default::default()
                    },
                ),
            ]),
        };
        build_topology(&config).unwrap()
    }

    #[test]
    fn test_registry_order_and_roles() {
        let registry = NodeRegistry::from_topology(&topology()).unwrap();
        assert_eq!(registry.network_shape, "islands");
        assert_eq!(registry.datacenters.len(), 2);

        let names: Vec<&str> = registry.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["dc1-server1", "dc2-server1", "dc1-client1", "dc1-client2", "dc2-client1"]
        );

        let gateway = &registry.nodes[3];
        assert_eq!(gateway.role, "mesh-gateway");
        assert_eq!(gateway.wan_ip, Some(Ipv4Addr::new(10, 1, 1, 22)));
        assert!(gateway.service.is_none());

        let client = &registry.nodes[2];
        assert_eq!(client.service.as_ref().map(|s| s.name.as_str()), Some("ping"));
        assert_eq!(client.wan_ip, None);
    }

    #[test]
    fn test_registry_artifact_is_json() {
        let artifact = NodeRegistry::from_topology(&topology())
            .unwrap()
            .to_artifact()
            .unwrap();
        assert_eq!(artifact.path, std::path::PathBuf::from(REGISTRY_FILE));

        let doc: serde_json::Value = serde_json::from_str(&artifact.body).unwrap();
        assert_eq!(doc["nodes"][0]["local_ip"], "10.0.1.11");
        assert_eq!(doc["nodes"][2]["proxy"], "envoy");
    }
}
