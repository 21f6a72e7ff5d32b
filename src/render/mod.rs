//! Artifact renderers.
//!
//! Every renderer is a pure function of the config and the built topology
//! and returns text; nothing here touches the file system.

pub mod agent;
pub mod compose;
pub mod grafana;
pub mod hcl;
pub mod prometheus;
pub mod registration;
pub mod services;
pub mod startup;
pub mod types;

pub use agent::{agent_config, render_agent_config, AgentConfigParams};
pub use compose::{build_compose, render_compose, COMPOSE_FILE};
pub use grafana::{grafana_artifacts, GRAFANA_DATASOURCE_FILE, GRAFANA_INI_FILE};
pub use prometheus::{build_prometheus, render_prometheus, scrape_jobs, JobSet, PROMETHEUS_FILE};
pub use registration::{registration_artifacts, registration_file, render_registration};
pub use startup::StartupGraph;
pub use types::{Artifact, ComposeFile, ComposeService};
