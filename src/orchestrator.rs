//! Generation orchestrator.
//!
//! One batch pass: build the topology, render every artifact in memory, then
//! persist. Nothing is written until every artifact has rendered, so a
//! configuration or render failure leaves the output directory untouched.

use log::info;

use crate::config::Config;
use crate::error::GenerateError;
use crate::registry::NodeRegistry;
use crate::render::{
    grafana_artifacts, registration_artifacts, render_compose, render_prometheus, Artifact,
    COMPOSE_FILE, PROMETHEUS_FILE,
};
use crate::topology::{build_topology, Topology};
use crate::utils::ArtifactStore;

/// Summary of one persistence pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    pub written: usize,
    pub unchanged: usize,
}

/// Render every artifact for `topology` in a stable order.
pub fn render_artifacts(config: &Config, topology: &Topology) -> Result<Vec<Artifact>, GenerateError> {
    let mut artifacts = vec![Artifact::new(COMPOSE_FILE, render_compose(config, topology)?)];

    if config.prometheus_enabled() {
        artifacts.push(Artifact::new(PROMETHEUS_FILE, render_prometheus(config, topology)?));
        artifacts.extend(grafana_artifacts());
    }

    artifacts.extend(registration_artifacts(topology)?);
    artifacts.push(NodeRegistry::from_topology(topology)?.to_artifact()?);

    Ok(artifacts)
}

pub fn persist_artifacts(
    artifacts: &[Artifact],
    store: &mut dyn ArtifactStore,
) -> Result<GenerationReport, GenerateError> {
    let mut report = GenerationReport::default();
    for artifact in artifacts {
        if store.write_if_changed(artifact)?.wrote() {
            report.written += 1;
        } else {
            report.unchanged += 1;
        }
    }
    Ok(report)
}

fn log_topology(topology: &Topology) {
    for node in topology.nodes() {
        let wan = node
            .public_address()
            .map(|ip| format!(" wan={}", ip))
            .unwrap_or_default();
        let service = node
            .service()
            .map(|s| format!(" service={}->{}", s.name, s.upstream_name))
            .unwrap_or_default();
        let local = node
            .local_address()
            .map(|ip| ip.to_string())
            .unwrap_or_default();
        info!(
            "node {} dc={} role={} local={}{}{}",
            node.name,
            node.datacenter,
            node.role_name(),
            local,
            wan,
            service
        );
    }
}

/// Build, render and persist everything described by `config`.
pub fn generate(
    config: &Config,
    store: &mut dyn ArtifactStore,
    verbose: bool,
) -> Result<GenerationReport, GenerateError> {
    let topology = build_topology(&config.topology)?;
    info!(
        "Built {} topology: {} datacenter(s), {} node(s)",
        topology.shape().as_str(),
        topology.datacenters().len(),
        topology.len()
    );
    if verbose {
        log_topology(&topology);
    }

    let artifacts = render_artifacts(config, &topology)?;
    let report = persist_artifacts(&artifacts, store)?;

    info!(
        "Generated {} artifact(s): {} written, {} unchanged",
        artifacts.len(),
        report.written,
        report.unchanged
    );
    Ok(report)
}
