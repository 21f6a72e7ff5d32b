//! Container startup ordering.
//!
//! Edges come from topology membership alone:
//!
//! - a node's agent starts after its pod
//! - a client agent also starts after its datacenter leader's agent
//! - an application starts after its node's agent
//! - a sidecar starts after its application
//! - a mesh gateway starts after its node's agent
//!
//! [`StartupGraph::startup_order`] proves the graph is acyclic before any
//! manifest is emitted.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{RenderError, TopologyError};
use crate::topology::{Node, Service, Topology};

pub fn pod_name(node: &Node) -> String {
    format!("{}-pod", node.name)
}

pub fn agent_name(node: &Node) -> String {
    node.name.clone()
}

pub fn app_name(node: &Node, service: &Service) -> String {
    format!("{}-{}", node.name, service.name)
}

pub fn sidecar_name(node: &Node, service: &Service) -> String {
    format!("{}-{}-sidecar", node.name, service.name)
}

pub fn gateway_name(node: &Node) -> String {
    format!("{}-mesh-gateway", node.name)
}

/// Start-after edges between manifest services.
#[derive(Debug, Clone, Default)]
pub struct StartupGraph {
    /// service -> services it starts after
    edges: BTreeMap<String, Vec<String>>,
}

impl StartupGraph {
    pub fn from_topology(topology: &Topology) -> Result<Self, TopologyError> {
        let mut graph = Self::default();

        topology.walk(|node| {
            let pod = pod_name(node);
            let agent = agent_name(node);
            graph.add_service(&pod);
            graph.add_edge(&agent, &pod);

            if !node.is_server() {
                let leader = topology.leader(&node.datacenter)?;
                graph.add_edge(&agent, &agent_name(leader));
            }

            if node.is_mesh_gateway() {
                graph.add_edge(&gateway_name(node), &agent);
            }

            if let Some(service) = node.service() {
                let app = app_name(node, service);
                graph.add_edge(&app, &agent);
                graph.add_edge(&sidecar_name(node, service), &app);
            }
            Ok::<(), TopologyError>(())
        })?;

        Ok(graph)
    }

    pub fn add_service(&mut self, service: &str) {
        self.edges.entry(service.to_string()).or_default();
    }

    /// Record that `service` starts after `dependency`.
    pub fn add_edge(&mut self, service: &str, dependency: &str) {
        let deps = self.edges.entry(service.to_string()).or_default();
        if !deps.iter().any(|d| d == dependency) {
            deps.push(dependency.to_string());
        }
    }

    pub fn services(&self) -> impl Iterator<Item = &str> + '_ {
        self.edges.keys().map(String::as_str)
    }

    pub fn depends_on(&self, service: &str) -> &[String] {
        self.edges.get(service).map(Vec::as_slice).unwrap_or(&[])
    }

    /// A start order in which every service follows its dependencies.
    ///
    /// Fails if an edge points at an undeclared service or the edges form
    /// a cycle.
    pub fn startup_order(&self) -> Result<Vec<String>, RenderError> {
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        let mut pending: BTreeMap<&str, usize> = BTreeMap::new();

        for (service, deps) in &self.edges {
            pending.insert(service.as_str(), deps.len());
            for dep in deps {
                if !self.edges.contains_key(dep) {
                    return Err(RenderError::UnknownDependency {
                        service: service.clone(),
                        dependency: dep.clone(),
                    });
                }
                dependents.entry(dep.as_str()).or_default().push(service.as_str());
            }
        }

        let mut ready: BTreeSet<&str> = pending
            .iter()
            .filter(|(_, &n)| n == 0)
            .map(|(&s, _)| s)
            .collect();
        let mut order = Vec::with_capacity(self.edges.len());

        while let Some(service) = ready.pop_first() {
            order.push(service.to_string());
            for &dependent in dependents.get(service).map(Vec::as_slice).unwrap_or(&[]) {
                if let Some(n) = pending.get_mut(dependent) {
                    *n -= 1;
                    if *n == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        if order.len() == self.edges.len() {
            return Ok(order);
        }

        let stuck: BTreeSet<&str> = pending
            .iter()
            .filter(|(_, &n)| n > 0)
            .map(|(&s, _)| s)
            .collect();
        Err(RenderError::DependencyCycle(self.find_cycle(&stuck)))
    }

    /// Every stuck service still waits on another stuck service, so
    /// following dependencies inside `stuck` must revisit a service.
    fn find_cycle(&self, stuck: &BTreeSet<&str>) -> Vec<String> {
        let Some(&start) = stuck.iter().next() else {
            return Vec::new();
        };
        let mut path: Vec<&str> = vec![start];
        let mut current = start;
        loop {
            let next = self
                .depends_on(current)
                .iter()
                .map(String::as_str)
                .find(|d| stuck.contains(d));
            let Some(next) = next else {
                return path.iter().map(|s| s.to_string()).collect();
            };
            if let Some(pos) = path.iter().position(|&p| p == next) {
                let mut cycle: Vec<String> = path[pos..].iter().map(|s| s.to_string()).collect();
                cycle.push(next.to_string());
                return cycle;
            }
            path.push(next);
            current = next;
        }
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
            network_shape: Some("dual".to_string()),
            datacenters: BTreeMap::from([
                ("dc1".to_string(), DatacenterSpec { servers: 2, clients: 2 }),
                ("dc2".to_string(), DatacenterSpec { servers: 1, clients: 1 }),
            ]),
            nodes: BTreeMap::from([(
                "dc1-client2".to_string(),
                NodeOverride {
                    mesh_gateway: true,
                    ..Default::default()
                },
            )]),
        };
        build_topology(&config).unwrap()
    }

    #[test]
    fn test_edges_follow_membership() {
        let graph = StartupGraph::from_topology(&topology()).unwrap();

        assert_eq!(graph.depends_on("dc1-server1"), ["dc1-server1-pod"]);
        assert_eq!(graph.depends_on("dc1-server2"), ["dc1-server2-pod"]);
        assert_eq!(graph.depends_on("dc1-client1"), ["dc1-client1-pod", "dc1-server1"]);
        assert_eq!(graph.depends_on("dc2-client1"), ["dc2-client1-pod", "dc2-server1"]);
        assert_eq!(graph.depends_on("dc1-client1-ping"), ["dc1-client1"]);
        assert_eq!(graph.depends_on("dc1-client1-ping-sidecar"), ["dc1-client1-ping"]);
        assert_eq!(graph.depends_on("dc1-client2-mesh-gateway"), ["dc1-client2"]);
        assert!(graph.depends_on("dc1-client1-pod").is_empty());
    }

    #[test]
    fn test_startup_order_respects_edges() {
        let graph = StartupGraph::from_topology(&topology()).unwrap();
        let order = graph.startup_order().unwrap();
        assert_eq!(order.len(), graph.services().count());

        let position = |s: &str| order.iter().position(|o| o == s).unwrap();
        for service in graph.services() {
            for dep in graph.depends_on(service) {
                assert!(position(dep) < position(service), "{} before {}", dep, service);
            }
        }
    }

    #[test]
    fn test_cycle_is_reported() {
        let mut graph = StartupGraph::default();
        graph.add_edge("a", "b");
        graph.add_edge("b", "c");
        graph.add_edge("c", "a");
        graph.add_edge("d", "a");
        graph.add_service("e");

        match graph.startup_order() {
            Err(RenderError::DependencyCycle(cycle)) => {
                assert_eq!(cycle.first(), cycle.last());
                assert!(cycle.contains(&"b".to_string()));
                assert!(!cycle.contains(&"d".to_string()));
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_dependency() {
        let mut graph = StartupGraph::default();
        graph.add_edge("a", "missing");
        assert!(matches!(
            graph.startup_order(),
            Err(RenderError::UnknownDependency { .. })
        ));
    }
}
