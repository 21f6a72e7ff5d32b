//! # devconsul - Consul test cluster generator
//!
//! Turns a declarative description of a multi-datacenter Consul cluster into
//! the files needed to run it locally under a container orchestrator.
//!
//! ## Overview
//!
//! A run loads the YAML configuration, builds a [`topology::Topology`]
//! (datacenters, nodes, addresses, service placements), renders every
//! artifact in memory and persists the ones whose bytes changed. An
//! unchanged configuration produces zero writes, so nothing already running
//! gets restarted.
//!
//! ## Network Shapes
//!
//! - **flat**: every node on one shared network
//! - **dual**: one network per datacenter plus a WAN that servers and mesh
//!   gateways join
//! - **islands**: one network per datacenter; only mesh gateways reach the
//!   WAN and datacenters federate through them
//!
//! ## Architecture
//!
//! - `config`: configuration structures and structural validation
//! - `config_loader`: YAML loading
//! - `error`: error types for each stage of a run
//! - `ip`: per-datacenter address blocks and the address registry
//! - `topology`: topology building and the read-only topology model
//! - `render`: orchestration manifest, agent configs, scrape config,
//!   dashboard provisioning, service registrations
//! - `registry`: machine-readable node registry
//! - `utils`: write-only-if-changed persistence
//! - `orchestrator`: one batch generation pass
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use devconsul::{config_loader, orchestrator, utils::DirectoryStore};
//! use std::path::Path;
//!
//! let config = config_loader::load_config(Path::new("config.yaml"))?;
//! let mut store = DirectoryStore::new(".");
//! let report = orchestrator::generate(&config, &mut store, false)?;
//! println!("{} file(s) written", report.written);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Generated Files
//!
//! ```text
//! docker-compose.yml
//! cache/prometheus.yml            (metrics enabled)
//! cache/grafana-prometheus.yml    (metrics enabled)
//! cache/grafana.ini               (metrics enabled)
//! cache/servicereg__<node>__<service>.hcl
//! cache/topology.json
//! ```

pub mod config;
pub mod config_loader;
pub mod error;
pub mod ip;
pub mod orchestrator;
pub mod registry;
pub mod render;
pub mod topology;
pub mod utils;
