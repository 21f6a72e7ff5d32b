//! Network shapes and the decisions that depend on them.
//!
//! Every shape-dependent choice made anywhere in the generator is answered
//! here, once, by the topology builder. Renderers read the resulting facts
//! off [`Topology`](super::Topology) and [`Node`](super::Node) and never
//! match on the shape themselves.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Name of the single shared network under the flat shape
pub const LAN_NETWORK: &str = "lan";
/// Name of the shared WAN network under the dual and islands shapes
pub const WAN_NETWORK: &str = "wan";

/// How datacenters are wired together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkShape {
    /// Every node on one flat network; no WAN addresses at all
    Flat,
    /// One network per datacenter plus a WAN that servers and gateways join
    Dual,
    /// One network per datacenter; only mesh gateways reach the WAN
    Islands,
}

/// How secondary datacenters find the primary's control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WanFederation {
    /// Static `retry_join_wan` over every datacenter's leader local address
    RetryJoinLocal,
    /// Static `retry_join_wan` over every datacenter's leader WAN address
    RetryJoinWan,
    /// Secondary servers dial the primary datacenter's mesh gateways
    MeshGateways,
}

/// Which of a node's addresses a lookup wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressScope {
    Local,
    Public,
}

impl NetworkShape {
    /// Parse the raw selector from the input; an absent selector means flat.
    pub fn from_selector(selector: Option<&str>) -> Result<Self, ConfigError> {
        match selector {
            None => Ok(NetworkShape::Flat),
            Some(raw) => raw.parse(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NetworkShape::Flat => "flat",
            NetworkShape::Dual => "dual",
            NetworkShape::Islands => "islands",
        }
    }

    /// Network a node in `datacenter` uses for its local address.
    pub fn local_network(self, datacenter: &str) -> &str {
        match self {
            NetworkShape::Flat => LAN_NETWORK,
            NetworkShape::Dual | NetworkShape::Islands => datacenter,
        }
    }

    /// Whether servers get an address on the WAN network.
    pub fn servers_on_wan(self) -> bool {
        match self {
            NetworkShape::Dual => true,
            NetworkShape::Flat | NetworkShape::Islands => false,
        }
    }

    /// Whether mesh gateways get an address on the WAN network.
    pub fn gateways_on_wan(self) -> bool {
        match self {
            NetworkShape::Dual | NetworkShape::Islands => true,
            NetworkShape::Flat => false,
        }
    }

    /// Whether the shared WAN network is declared at all.
    pub fn declares_wan_network(self) -> bool {
        match self {
            NetworkShape::Dual | NetworkShape::Islands => true,
            NetworkShape::Flat => false,
        }
    }

    /// Whether mesh gateways expose the local servers to other datacenters.
    pub fn gateways_expose_servers(self) -> bool {
        match self {
            NetworkShape::Dual | NetworkShape::Islands => true,
            NetworkShape::Flat => false,
        }
    }

    pub fn federation(self) -> WanFederation {
        match self {
            NetworkShape::Flat => WanFederation::RetryJoinLocal,
            NetworkShape::Dual => WanFederation::RetryJoinWan,
            NetworkShape::Islands => WanFederation::MeshGateways,
        }
    }
}

impl WanFederation {
    pub fn via_gateways(self) -> bool {
        matches!(self, WanFederation::MeshGateways)
    }

    /// Address scope used for the static `retry_join_wan` list, if any.
    pub fn retry_join_scope(self) -> Option<AddressScope> {
        match self {
            WanFederation::RetryJoinLocal => Some(AddressScope::Local),
            WanFederation::RetryJoinWan => Some(AddressScope::Public),
            WanFederation::MeshGateways => None,
        }
    }
}

impl FromStr for NetworkShape {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flat" | "" => Ok(NetworkShape::Flat),
            "dual" => Ok(NetworkShape::Dual),
            "islands" => Ok(NetworkShape::Islands),
            other => Err(ConfigError::UnknownNetworkShape(other.to_string())),
        }
    }
}

impl fmt::Display for NetworkShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_parsing() {
        assert_eq!(NetworkShape::from_selector(None).unwrap(), NetworkShape::Flat);
        assert_eq!(NetworkShape::from_selector(Some("")).unwrap(), NetworkShape::Flat);
        assert_eq!(NetworkShape::from_selector(Some("dual")).unwrap(), NetworkShape::Dual);
        assert_eq!(
            NetworkShape::from_selector(Some("islands")).unwrap(),
            NetworkShape::Islands
        );
        assert!(matches!(
            NetworkShape::from_selector(Some("split")),
            Err(ConfigError::UnknownNetworkShape(s)) if s == "split"
        ));
    }

    #[test]
    fn test_local_network_names() {
        assert_eq!(NetworkShape::Flat.local_network("dc2"), "lan");
        assert_eq!(NetworkShape::Dual.local_network("dc2"), "dc2");
        assert_eq!(NetworkShape::Islands.local_network("dc2"), "dc2");
    }

    #[test]
    fn test_wan_decisions() {
        assert!(!NetworkShape::Flat.declares_wan_network());
        assert!(!NetworkShape::Flat.gateways_on_wan());
        assert!(NetworkShape::Dual.servers_on_wan());
        assert!(NetworkShape::Dual.gateways_on_wan());
        assert!(!NetworkShape::Islands.servers_on_wan());
        assert!(NetworkShape::Islands.gateways_on_wan());
        assert!(!NetworkShape::Flat.gateways_expose_servers());
        assert!(NetworkShape::Dual.gateways_expose_servers());
        assert!(NetworkShape::Islands.gateways_expose_servers());
    }

    #[test]
    fn test_federation() {
        assert_eq!(
            NetworkShape::Flat.federation().retry_join_scope(),
            Some(AddressScope::Local)
        );
        assert_eq!(
            NetworkShape::Dual.federation().retry_join_scope(),
            Some(AddressScope::Public)
        );
        let islands = NetworkShape::Islands.federation();
        assert!(islands.via_gateways());
        assert_eq!(islands.retry_join_scope(), None);
    }
}
