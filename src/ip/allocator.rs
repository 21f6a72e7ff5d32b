//! IP address allocation logic.
//!
//! Servers take host octets `11..=19` and clients `21..=29`, so each role
//! group within a datacenter is capped at [`MAX_NODES_PER_ROLE`] members
//! before the two ranges would run into each other.

use std::net::Ipv4Addr;

/// Host octet offset for server nodes (`10 + index`)
pub const SERVER_HOST_OFFSET: u8 = 10;
/// Host octet offset for client nodes (`20 + index`)
pub const CLIENT_HOST_OFFSET: u8 = 20;
/// Largest role group a single datacenter can hold
pub const MAX_NODES_PER_ROLE: u32 = 9;

/// Subnet of the single shared network used by the flat shape
pub const LAN_SUBNET: &str = "10.0.0.0/16";
/// Subnet of the shared WAN network
pub const WAN_SUBNET: &str = "10.1.0.0/16";

const LOCAL_SECOND_OCTET: u8 = 0;
const WAN_SECOND_OCTET: u8 = 1;

/// Role group a host octet is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostRole {
    Server,
    Client,
}

impl HostRole {
    fn offset(self) -> u8 {
        match self {
            HostRole::Server => SERVER_HOST_OFFSET,
            HostRole::Client => CLIENT_HOST_OFFSET,
        }
    }
}

/// Host octet for the `index`-th (1-based) member of a role group.
///
/// Returns `None` when the index is zero or the octet would leave the
/// role's reserved range.
pub fn host_octet(role: HostRole, index: u32) -> Option<u8> {
    if index == 0 || index > MAX_NODES_PER_ROLE {
        return None;
    }
    let index = u8::try_from(index).ok()?;
    role.offset().checked_add(index)
}

/// Subnet of a datacenter's own network
pub fn datacenter_subnet(dc_index: u8) -> String {
    format!("10.{}.{}.0/24", LOCAL_SECOND_OCTET, dc_index)
}

/// Local and WAN address blocks belonging to one datacenter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressBlocks {
    dc_index: u8,
}

impl AddressBlocks {
    pub fn new(dc_index: u8) -> Self {
        Self { dc_index }
    }

    /// Dotted three-octet prefix of the local block, e.g. `10.0.2`
    pub fn local_base(&self) -> String {
        format!("10.{}.{}", LOCAL_SECOND_OCTET, self.dc_index)
    }

    /// Dotted three-octet prefix of the WAN block, e.g. `10.1.2`
    pub fn wan_base(&self) -> String {
        format!("10.{}.{}", WAN_SECOND_OCTET, self.dc_index)
    }

    pub fn local_ip(&self, role: HostRole, index: u32) -> Option<Ipv4Addr> {
        let host = host_octet(role, index)?;
        Some(Ipv4Addr::new(10, LOCAL_SECOND_OCTET, self.dc_index, host))
    }

    pub fn wan_ip(&self, role: HostRole, index: u32) -> Option<Ipv4Addr> {
        let host = host_octet(role, index)?;
        Some(Ipv4Addr::new(10, WAN_SECOND_OCTET, self.dc_index, host))
    }
}
