//! Per-node Consul agent configuration.
//!
//! [`AgentConfigParams::for_node`] collects every value the agent needs from
//! the config and topology; [`render_agent_config`] turns it into HCL. The
//! HCL is embedded inline in the orchestration manifest.

use std::fmt::Write;
use std::net::Ipv4Addr;

use super::hcl::{quote, quoted_list};
use crate::config::{Config, PRIMARY_DATACENTER};
use crate::error::{RenderError, TopologyError};
use crate::topology::{Node, Topology};

/// Inputs to one agent's configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfigParams {
    pub advertise_addr: Ipv4Addr,
    pub advertise_addr_wan: Option<Ipv4Addr>,
    pub datacenter: String,
    pub server: bool,
    pub secondary_server: bool,
    /// Servers only: the size of the datacenter's server group
    pub bootstrap_expect: Option<usize>,
    pub retry_join: Vec<Ipv4Addr>,
    /// Servers only, when federation uses a static WAN join list
    pub retry_join_wan: Vec<Ipv4Addr>,
    pub federate_via_gateways: bool,
    /// Secondary servers only, when federating through mesh gateways
    pub primary_gateways: Vec<String>,
    pub gossip_key: Option<String>,
    /// Set when TLS is enabled
    pub tls_file_prefix: Option<String>,
    pub prometheus: bool,
    /// Primary servers only
    pub master_token: Option<String>,
    pub agent_master_token: Option<String>,
}

impl AgentConfigParams {
    pub fn for_node(
        config: &Config,
        topology: &Topology,
        node: &Node,
    ) -> Result<Self, TopologyError> {
        let server = node.is_server();
        let secondary_server = server && node.datacenter != PRIMARY_DATACENTER;
        let federation = topology.federation();
        let retry_join = topology.server_addresses(&node.datacenter)?;

        let mut params = Self {
            advertise_addr: node.local_address()?,
            advertise_addr_wan: None,
            datacenter: node.datacenter.clone(),
            server,
            secondary_server,
            bootstrap_expect: None,
            retry_join,
            retry_join_wan: Vec::new(),
            federate_via_gateways: false,
            primary_gateways: Vec::new(),
            gossip_key: config.security.gossip_key.clone(),
            tls_file_prefix: config.tls_enabled().then(|| node.tls_file_prefix()),
            prometheus: config.prometheus_enabled(),
            master_token: None,
            agent_master_token: config.security.agent_master_token.clone(),
        };

        if server {
            params.advertise_addr_wan = node.public_address();
            params.bootstrap_expect = Some(params.retry_join.len());
            params.retry_join_wan = topology.retry_join_wan()?;
            params.federate_via_gateways = federation.via_gateways();
            if federation.via_gateways() && secondary_server {
                params.primary_gateways = topology.gateway_addresses(PRIMARY_DATACENTER);
            }
            if !secondary_server {
                params.master_token = config.security.initial_master_token.clone();
            }
        }

        Ok(params)
    }
}

/// Render the agent configuration for `node`.
pub fn agent_config(config: &Config, topology: &Topology, node: &Node) -> Result<String, RenderError> {
    let params = AgentConfigParams::for_node(config, topology, node)?;
    render_agent_config(&params)
}

pub fn render_agent_config(p: &AgentConfigParams) -> Result<String, RenderError> {
    let mut out = String::new();

    if let Some(expect) = p.bootstrap_expect {
        writeln!(out, "bootstrap_expect       = {}", expect)?;
    }
    writeln!(out, "client_addr            = \"0.0.0.0\"")?;
    writeln!(out, "advertise_addr         = \"{}\"", p.advertise_addr)?;
    if let Some(wan) = p.advertise_addr_wan {
        writeln!(out, "advertise_addr_wan     = \"{}\"", wan)?;
    }
    writeln!(out, "translate_wan_addrs    = true")?;
    writeln!(out, "datacenter             = {}", quote(&p.datacenter))?;
    writeln!(out, "disable_update_check   = true")?;
    writeln!(out, "log_level              = \"debug\"")?;
    writeln!(out)?;
    writeln!(out, "enable_debug                  = true")?;
    writeln!(out, "enable_central_service_config = true")?;
    writeln!(out)?;
    writeln!(out, "primary_datacenter     = \"{}\"", PRIMARY_DATACENTER)?;
    writeln!(out, "retry_join             = [ {} ]", quoted_list(&p.retry_join))?;

    if p.federate_via_gateways {
        if p.secondary_server {
            writeln!(out, "primary_gateways          = [ {} ]", quoted_list(&p.primary_gateways))?;
            writeln!(out, "primary_gateways_interval = \"5s\"")?;
        }
    } else if p.server {
        writeln!(out, "retry_join_wan         = [ {} ]", quoted_list(&p.retry_join_wan))?;
    }

    writeln!(out, "server                 = {}", p.server)?;
    writeln!(out, "ui                     = true")?;

    if p.prometheus {
        writeln!(out)?;
        writeln!(out, "telemetry {{")?;
        writeln!(out, "  prometheus_retention_time = \"168h\"")?;
        writeln!(out, "}}")?;
    }

    if let Some(key) = &p.gossip_key {
        writeln!(out)?;
        writeln!(out, "encrypt                = {}", quote(key))?;
    }

    if let Some(prefix) = &p.tls_file_prefix {
        writeln!(out)?;
        writeln!(out, "ca_file                = \"/tls/consul-agent-ca.pem\"")?;
        writeln!(out, "cert_file              = \"/tls/{}.pem\"", prefix)?;
        writeln!(out, "key_file               = \"/tls/{}-key.pem\"", prefix)?;
        writeln!(out, "verify_incoming        = true")?;
        writeln!(out, "verify_outgoing        = true")?;
        writeln!(out, "verify_server_hostname = true")?;
    }

    writeln!(out)?;
    writeln!(out, "connect {{")?;
    writeln!(out, "  enabled = true")?;
    if p.federate_via_gateways {
        writeln!(out, "  enable_mesh_gateway_wan_federation = true")?;
    }
    writeln!(out, "}}")?;

    if !p.server {
        writeln!(out)?;
        writeln!(out, "ports {{")?;
        writeln!(out, "  grpc = 8502")?;
        writeln!(out, "}}")?;
    }

    writeln!(out)?;
    writeln!(out, "acl {{")?;
    writeln!(out, "  enabled                  = true")?;
    writeln!(out, "  default_policy           = \"deny\"")?;
    writeln!(out, "  down_policy              = \"extend-cache\"")?;
    writeln!(out, "  enable_token_persistence = true")?;
    if p.secondary_server {
        writeln!(out, "  enable_token_replication = true")?;
    }
    writeln!(out, "  tokens {{")?;
    if let Some(token) = &p.master_token {
        writeln!(out, "    master       = {}", quote(token))?;
    }
    if let Some(token) = &p.agent_master_token {
        writeln!(out, "    agent_master = {}", quote(token))?;
    }
    writeln!(out, "  }}")?;
    writeln!(out, "}}")?;

    Ok(out)
}
