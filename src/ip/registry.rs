//! IP address registry.
//!
//! Tracks which node owns each allocated address so the builder can prove
//! uniqueness across the whole topology instead of assuming it.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use crate::error::ConfigError;

/// Registry of every address handed out during a topology build
#[derive(Debug, Default)]
pub struct AddressRegistry {
    /// IP -> owning node name
    assigned: BTreeMap<Ipv4Addr, String>,
}

impl AddressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `ip` as belonging to `owner`.
    ///
    /// Registering the same address twice for the same owner is a no-op.
    pub fn register(&mut self, ip: Ipv4Addr, owner: &str) -> Result<(), ConfigError> {
        match self.assigned.get(&ip) {
            Some(existing) if existing != owner => Err(ConfigError::AddressConflict {
                ip: ip.to_string(),
                first: existing.clone(),
                second: owner.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.assigned.insert(ip, owner.to_string());
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_distinct_addresses() {
        let mut registry = AddressRegistry::new();
        assert!(registry.is_empty());
        registry.register(Ipv4Addr::new(10, 0, 1, 11), "dc1-server1").unwrap();
        registry.register(Ipv4Addr::new(10, 1, 1, 11), "dc1-server1").unwrap();
        registry.register(Ipv4Addr::new(10, 0, 1, 21), "dc1-client1").unwrap();

        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_same_owner_is_idempotent() {
        let mut registry = AddressRegistry::new();
        let ip = Ipv4Addr::new(10, 0, 1, 11);
        registry.register(ip, "dc1-server1").unwrap();
        registry.register(ip, "dc1-server1").unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_conflict_is_reported() {
        let mut registry = AddressRegistry::new();
        let ip = Ipv4Addr::new(10, 0, 1, 21);
        registry.register(ip, "dc1-client1").unwrap();

        let err = registry.register(ip, "dc1-server11").unwrap_err();
        assert!(matches!(err, ConfigError::AddressConflict { .. }));
        assert!(err.to_string().contains("dc1-client1"));
    }
}
