//! Orchestration manifest type definitions.
//!
//! These structures serialize to a docker-compose style YAML document.
//! Every map is a `BTreeMap` so two renders of the same topology produce
//! byte-identical output.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A rendered artifact waiting to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Path relative to the output directory
    pub path: PathBuf,
    pub body: String,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>, body: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            body: body.into(),
        }
    }
}

/// Root of the orchestration manifest.
#[derive(Serialize, Debug)]
pub struct ComposeFile {
    pub version: String,
    pub networks: BTreeMap<String, ComposeNetwork>,
    pub volumes: BTreeMap<String, ComposeVolume>,
    pub services: BTreeMap<String, ComposeService>,
}

/// A declared network with a fixed subnet.
#[derive(Serialize, Debug)]
pub struct ComposeNetwork {
    pub ipam: ComposeIpam,
}

#[derive(Serialize, Debug)]
pub struct ComposeIpam {
    pub driver: String,
    pub config: Vec<ComposeSubnet>,
}

#[derive(Serialize, Debug)]
pub struct ComposeSubnet {
    pub subnet: String,
}

/// A named volume; rendered as an empty mapping.
#[derive(Serialize, Debug, Default)]
pub struct ComposeVolume {}

/// One container in the manifest.
#[derive(Serialize, Debug, Default, Clone)]
pub struct ComposeService {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_mode: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    pub image: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub networks: BTreeMap<String, ServiceNetwork>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
}

impl ComposeService {
    /// A container sharing the network namespace of `pod`.
    pub fn in_pod(pod: &str, image: &str, kind: &str) -> Self {
        Self {
            network_mode: Some(format!("service:{}", pod)),
            image: image.to_string(),
            labels: BTreeMap::from([("devconsul.type".to_string(), kind.to_string())]),
            ..Default::default()
        }
    }
}

/// Static address of a service on one network.
#[derive(Serialize, Debug, Clone)]
pub struct ServiceNetwork {
    pub ipv4_address: String,
}
