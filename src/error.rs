//! Error types shared across the generator.
//!
//! Each stage of a run has its own error enum so callers can tell a bad
//! input file apart from a rendering bug or a failed write:
//!
//! - [`ConfigError`]: the declarative input cannot produce a topology
//! - [`TopologyError`]: a lookup against a built topology failed
//! - [`RenderError`]: an artifact could not be rendered
//! - [`PersistError`]: an artifact could not be written to disk
//!
//! [`GenerateError`] unifies them for the orchestrator.

use std::path::PathBuf;

use crate::config::ValidationError;

/// Input cannot be turned into a topology.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("primary datacenter {0:?} is missing from config")]
    MissingPrimaryDatacenter(String),
    #[error("{0}: not a valid datacenter name")]
    InvalidDatacenterName(String),
    #[error("{0}: must always have at least one server")]
    NoServers(String),
    #[error("{0}: must always have at least one client")]
    NoClients(String),
    #[error("unknown network_shape: {0}")]
    UnknownNetworkShape(String),
    #[error("{datacenter}: {count} {role}s exceeds the limit of {limit} per datacenter")]
    TooManyNodes {
        datacenter: String,
        role: &'static str,
        count: u32,
        limit: u32,
    },
    #[error("{0}: islands network shape requires at least one mesh gateway per datacenter")]
    MissingMeshGateway(String),
    #[error("{node}: upstream datacenter {datacenter:?} is not declared")]
    UnknownUpstreamDatacenter { node: String, datacenter: String },
    #[error("{node}: invalid service name {name:?}: {reason}")]
    InvalidServiceName {
        node: String,
        name: String,
        reason: &'static str,
    },
    #[error("address {ip} assigned to both {first} and {second}")]
    AddressConflict {
        ip: String,
        first: String,
        second: String,
    },
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Lookup against a built topology failed.
///
/// None of these can happen for names the builder produced itself; hitting
/// one means the topology and its caller disagree.
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("node not found: {0}")]
    NodeNotFound(String),
    #[error("no such datacenter: {0}")]
    DatacenterNotFound(String),
    #[error("node {0} has no local address")]
    NoLocalAddress(String),
    #[error("node {0} has no public address")]
    NoPublicAddress(String),
}

/// An artifact could not be rendered.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error("failed to serialize YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to format template: {0}")]
    Format(#[from] std::fmt::Error),
    #[error("startup dependency cycle through: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),
    #[error("service {service} depends on undeclared service {dependency}")]
    UnknownDependency { service: String, dependency: String },
}

/// An artifact could not be persisted.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to move temporary file into place at {}: {source}", path.display())]
    Rename {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },
}

impl PersistError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PersistError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Any failure during a generation run.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("render error: {0}")]
    Render(#[from] RenderError),
    #[error("persistence error: {0}")]
    Persist(#[from] PersistError),
}
