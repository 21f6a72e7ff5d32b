//! Metrics scrape configuration.
//!
//! Jobs are aggregated by name: every node contributing to the same job
//! adds its targets to one entry, and targets are kept sorted.

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::Config;
use crate::error::RenderError;
use crate::topology::{Node, Topology};

pub const PROMETHEUS_FILE: &str = "cache/prometheus.yml";

const AGENT_METRICS_PATH: &str = "/v1/agent/metrics";
const AGENT_HTTP_PORT: u16 = 8500;
const PROXY_METRICS_PORT: u16 = 9102;
const SELF_JOB: &str = "prometheus";
const SELF_TARGET: &str = "localhost:9090";

#[derive(Serialize, Debug)]
pub struct PrometheusConfig {
    pub global: GlobalConfig,
    pub scrape_configs: Vec<ScrapeJob>,
}

#[derive(Serialize, Debug)]
pub struct GlobalConfig {
    #[serde(with = "humantime_serde")]
    pub scrape_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub evaluation_interval: Duration,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ScrapeJob {
    pub job_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_path: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, Vec<String>>,
    pub static_configs: Vec<StaticConfig>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct StaticConfig {
    pub targets: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl ScrapeJob {
    fn new(name: impl Into<String>, metrics_path: Option<&str>) -> Self {
        Self {
            job_name: name.into(),
            metrics_path: metrics_path.map(str::to_string),
            params: BTreeMap::new(),
            static_configs: vec![StaticConfig {
                targets: Vec::new(),
                labels: BTreeMap::new(),
            }],
        }
    }

    fn label(mut self, key: &str, value: &str) -> Self {
        self.static_configs[0]
            .labels
            .insert(key.to_string(), value.to_string());
        self
    }

    fn param(mut self, key: &str, value: &str) -> Self {
        self.params
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
        self
    }

    fn target(mut self, target: String) -> Self {
        self.static_configs[0].targets.push(target);
        self
    }

    pub fn targets(&self) -> &[String] {
        &self.static_configs[0].targets
    }
}

/// Scrape jobs keyed by name.
#[derive(Debug, Default)]
pub struct JobSet {
    jobs: BTreeMap<String, ScrapeJob>,
}

impl JobSet {
    /// Merge `job` into the set. An existing job with the same name only
    /// gains the new targets; its path, params and labels stay as first seen.
    pub fn add(&mut self, job: ScrapeJob) {
        match self.jobs.get_mut(&job.job_name) {
            Some(prev) => {
                let targets = &mut prev.static_configs[0].targets;
                for target in job.targets() {
                    if !targets.contains(target) {
                        targets.push(target.clone());
                    }
                }
                targets.sort();
            }
            None => {
                let mut job = job;
                job.static_configs[0].targets.sort();
                self.jobs.insert(job.job_name.clone(), job);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ScrapeJob> {
        self.jobs.get(name)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn into_jobs(self) -> Vec<ScrapeJob> {
        self.jobs.into_values().collect()
    }
}

fn agent_job(config: &Config, name: String, node: &Node, role: &str) -> Result<ScrapeJob, RenderError> {
    let mut job = ScrapeJob::new(name, Some(AGENT_METRICS_PATH))
        .param("format", "prometheus")
        .label("dc", &node.datacenter)
        .label("role", role)
        .target(format!("{}:{}", node.local_address()?, AGENT_HTTP_PORT));
    if let Some(token) = &config.security.agent_master_token {
        job = job.param("token", token);
    }
    Ok(job)
}

/// Collect the scrape jobs for every node in the topology.
pub fn scrape_jobs(config: &Config, topology: &Topology) -> Result<JobSet, RenderError> {
    let mut jobs = JobSet::default();
    jobs.add(ScrapeJob::new(SELF_JOB, None).target(SELF_TARGET.to_string()));

    topology.walk(|node| -> Result<(), RenderError> {
        if node.is_server() {
            let name = format!("consul-servers-{}", node.datacenter);
            jobs.add(agent_job(config, name, node, "consul-server")?);
            return Ok(());
        }

        let name = format!("consul-clients-{}", node.datacenter);
        jobs.add(agent_job(config, name, node, "consul-client")?);

        let proxy_target = format!("{}:{}", node.local_address()?, PROXY_METRICS_PORT);
        if node.is_mesh_gateway() {
            jobs.add(
                ScrapeJob::new(format!("mesh-gateways-{}", node.datacenter), Some("/metrics"))
                    .label("dc", &node.datacenter)
                    .label("role", "mesh-gateway")
                    .target(proxy_target),
            );
        } else if let Some(service) = node.service() {
            // Proxy jobs span datacenters, so they carry no dc label.
            let name = format!("{}-proxy", service.name);
            jobs.add(
                ScrapeJob::new(name.clone(), Some("/metrics"))
                    .label("role", &name)
                    .target(proxy_target),
            );
        }
        Ok(())
    })?;

    Ok(jobs)
}

pub fn build_prometheus(config: &Config, topology: &Topology) -> Result<PrometheusConfig, RenderError> {
    let interval = config.monitor.scrape_interval;
    Ok(PrometheusConfig {
        global: GlobalConfig {
            scrape_interval: interval,
            evaluation_interval: interval,
        },
        scrape_configs: scrape_jobs(config, topology)?.into_jobs(),
    })
}

pub fn render_prometheus(config: &Config, topology: &Topology) -> Result<String, RenderError> {
    Ok(serde_yaml::to_string(&build_prometheus(config, topology)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_loader::parse_config;
    use crate::topology::build_topology;

    const YAML: &str = r#"
consul_image: "consul:1.9.0"
security:
  agent_master_token: "agent-secret"
monitor:
  prometheus: true
  scrape_interval: 15s
topology:
  network_shape: dual
  datacenters:
    dc1: { servers: 2, clients: 3 }
    dc2: { servers: 1, clients: 2 }
  nodes:
    dc1-client3: { mesh_gateway: true }
"#;

    fn setup() -> (Config, Topology) {
        let config = parse_config(YAML).unwrap();
        let topology = build_topology(&config.topology).unwrap();
        (config, topology)
    }

    #[test]
    fn test_servers_aggregate_into_one_job() {
        let (config, topology) = setup();
        let jobs = scrape_jobs(&config, &topology).unwrap();

        let servers = jobs.get("consul-servers-dc1").unwrap();
        assert_eq!(servers.targets(), ["10.0.1.11:8500", "10.0.1.12:8500"]);
        assert_eq!(servers.metrics_path.as_deref(), Some("/v1/agent/metrics"));
        assert_eq!(servers.params["format"], vec!["prometheus"]);
        assert_eq!(servers.params["token"], vec!["agent-secret"]);
        assert_eq!(servers.static_configs[0].labels["dc"], "dc1");
        assert_eq!(servers.static_configs[0].labels["role"], "consul-server");
    }

    #[test]
    fn test_job_names() {
        let (config, topology) = setup();
        let jobs = scrape_jobs(&config, &topology).unwrap();
        let names: Vec<String> = jobs.into_jobs().into_iter().map(|j| j.job_name).collect();
        assert_eq!(
            names,
            vec![
                "consul-clients-dc1",
                "consul-clients-dc2",
                "consul-servers-dc1",
                "consul-servers-dc2",
                "mesh-gateways-dc1",
                "ping-proxy",
                "pong-proxy",
                "prometheus",
            ]
        );
    }

    #[test]
    fn test_proxy_jobs_span_datacenters() {
        let (config, topology) = setup();
        let jobs = scrape_jobs(&config, &topology).unwrap();

        // ping runs on dc1-client1 and dc2-client1
        let ping = jobs.get("ping-proxy").unwrap();
        assert_eq!(ping.targets(), ["10.0.1.21:9102", "10.0.2.21:9102"]);
        assert!(!ping.static_configs[0].labels.contains_key("dc"));

        let gateways = jobs.get("mesh-gateways-dc1").unwrap();
        assert_eq!(gateways.targets(), ["10.0.1.23:9102"]);
    }

    #[test]
    fn test_duplicate_targets_are_merged() {
        let mut jobs = JobSet::default();
        jobs.add(ScrapeJob::new("a", None).target("10.0.0.2:1".to_string()));
        jobs.add(ScrapeJob::new("a", None).target("10.0.0.1:1".to_string()));
        jobs.add(ScrapeJob::new("a", None).target("10.0.0.2:1".to_string()));
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs.get("a").unwrap().targets(), ["10.0.0.1:1", "10.0.0.2:1"]);
    }

    #[test]
    fn test_render_global_and_no_token_param() {
        let (mut config, topology) = setup();
        config.security.agent_master_token = None;
        let body = render_prometheus(&config, &topology).unwrap();

        let doc: serde_yaml::Value = serde_yaml::from_str(&body).unwrap();
        assert_eq!(doc["global"]["scrape_interval"].as_str(), Some("15s"));
        assert_eq!(doc["global"]["evaluation_interval"].as_str(), Some("15s"));
        assert!(!body.contains("token"));
        assert_eq!(body, render_prometheus(&config, &topology).unwrap());
    }
}
