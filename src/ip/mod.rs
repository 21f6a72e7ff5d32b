//! IP address allocation and management module.
//!
//! Every datacenter owns two /24 blocks derived from its numeric index: a
//! local block on `10.0.<index>` and a WAN-facing block on `10.1.<index>`.
//! Host octets are assigned by role so that the same node always lands on
//! the same address across runs.

pub mod allocator;
pub mod registry;

// Re-export commonly used types
pub use allocator::{
    datacenter_subnet, host_octet, AddressBlocks, HostRole, LAN_SUBNET, MAX_NODES_PER_ROLE,
    WAN_SUBNET,
};
pub use registry::AddressRegistry;
