use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// The only datacenter that may act as primary.
pub const PRIMARY_DATACENTER: &str = "dc1";

/// Log levels accepted by the Envoy proxies.
const ENVOY_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "critical", "off"];

/// Declarative description of a test cluster plus its global feature flags.
///
/// Loaded once and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Container image used for every Consul agent
    pub consul_image: String,
    /// Log verbosity for sidecar and gateway proxies
    #[serde(default = "default_envoy_log_level")]
    pub envoy_log_level: String,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub kubernetes: KubernetesConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    pub topology: TopologyConfig,
}

impl Config {
    /// Structural validation of global settings.
    ///
    /// Topology-level rules (primary datacenter, names, counts, network
    /// shape) are enforced by the topology builder.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.consul_image.trim().is_empty() {
            return Err(ValidationError::InvalidGeneral(
                "consul_image cannot be empty".to_string(),
            ));
        }

        if !ENVOY_LOG_LEVELS.contains(&self.envoy_log_level.as_str()) {
            return Err(ValidationError::InvalidGeneral(format!(
                "envoy_log_level {:?} is not one of {}",
                self.envoy_log_level,
                ENVOY_LOG_LEVELS.join(", ")
            )));
        }

        if let Some(key) = &self.security.gossip_key {
            if key.trim().is_empty() {
                return Err(ValidationError::InvalidSecurity(
                    "gossip_key cannot be empty when present".to_string(),
                ));
            }
        }

        if self.monitor.scrape_interval.is_zero() {
            return Err(ValidationError::InvalidMonitor(
                "scrape_interval must be greater than zero".to_string(),
            ));
        }

        if self.topology.datacenters.is_empty() {
            return Err(ValidationError::InvalidTopology(
                "at least one datacenter must be declared".to_string(),
            ));
        }

        Ok(())
    }

    pub fn tls_enabled(&self) -> bool {
        self.security.tls
    }

    pub fn kubernetes_enabled(&self) -> bool {
        self.kubernetes.enabled
    }

    pub fn prometheus_enabled(&self) -> bool {
        self.monitor.prometheus
    }
}

/// Encryption and ACL bootstrap material.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub tls: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gossip_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_master_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_master_token: Option<String>,
}

/// Kubernetes-style secret injection for sidecar logins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KubernetesConfig {
    #[serde(default)]
    pub enabled: bool,
}

/// Metrics stack settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub prometheus: bool,
    #[serde(default = "default_scrape_interval", with = "humantime_serde")]
    pub scrape_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            prometheus: false,
            scrape_interval: default_scrape_interval(),
        }
    }
}

/// The topology block of the input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Raw network shape selector; parsed and validated by the topology builder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_shape: Option<String>,
    pub datacenters: BTreeMap<String, DatacenterSpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub nodes: BTreeMap<String, NodeOverride>,
}

/// Requested server and client counts for one datacenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatacenterSpec {
    pub servers: u32,
    pub clients: u32,
}

/// Per-node overrides, keyed by node name in [`TopologyConfig::nodes`].
///
/// An omitted boolean and an explicit `false` mean the same thing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeOverride {
    #[serde(default)]
    pub mesh_gateway: bool,
    #[serde(default)]
    pub use_builtin_proxy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_datacenter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_extra_hcl: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid general configuration: {0}")]
    InvalidGeneral(String),
    #[error("Invalid security configuration: {0}")]
    InvalidSecurity(String),
    #[error("Invalid monitor configuration: {0}")]
    InvalidMonitor(String),
    #[error("Invalid topology configuration: {0}")]
    InvalidTopology(String),
}

fn default_envoy_log_level() -> String {
    "info".to_string()
}

fn default_scrape_interval() -> Duration {
    Duration::from_secs(5)
}
