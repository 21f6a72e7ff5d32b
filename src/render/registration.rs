//! Service registration definitions.
//!
//! One HCL file per application service, read by the sidecar bootstrap
//! script to register the service and its sidecar with the local agent.

use std::fmt::Write;

use super::hcl::{quote, quoted_list};
use super::types::Artifact;
use crate::error::RenderError;
use crate::topology::{Node, Service, Topology};

/// Path of a registration file relative to the output directory.
pub fn registration_file(node: &Node, service: &Service) -> String {
    format!("cache/servicereg__{}__{}.hcl", node.name, service.name)
}

pub fn render_registration(node: &Node, service: &Service) -> Result<String, RenderError> {
    let mut out = String::new();
    writeln!(out, "services = [")?;
    writeln!(out, "  {{")?;
    writeln!(out, "    name = {}", quote(&service.name))?;
    writeln!(out, "    port = {}", service.port)?;
    writeln!(out, "    tags = [{}]", quoted_list(&[node.datacenter.as_str()]))?;

    if !service.meta.is_empty() {
        writeln!(out, "    meta {{")?;
        for (k, v) in &service.meta {
            writeln!(out, "      {} = {}", quote(k), quote(v))?;
        }
        writeln!(out, "    }}")?;
    }

    writeln!(out, "    connect {{")?;
    writeln!(out, "      sidecar_service {{")?;
    writeln!(out, "        proxy {{")?;
    writeln!(out, "          upstreams = [")?;
    writeln!(out, "            {{")?;
    writeln!(out, "              destination_name   = {}", quote(&service.upstream_name))?;
    writeln!(out, "              local_bind_port    = {}", service.upstream_local_port)?;
    if let Some(dc) = &service.upstream_datacenter {
        writeln!(out, "              datacenter         = {}", quote(dc))?;
    }
    if let Some(extra) = &service.upstream_extra_hcl {
        for line in extra.lines().filter(|l| !l.trim().is_empty()) {
            writeln!(out, "              {}", line.trim_end())?;
        }
    }
    writeln!(out, "            }},")?;
    writeln!(out, "          ]")?;
    writeln!(out, "        }}")?;
    writeln!(out, "      }}")?;
    writeln!(out, "    }}")?;
    writeln!(out, "  }},")?;
    writeln!(out, "]")?;
    Ok(out)
}

/// Registration artifacts for every service node, in topology order.
pub fn registration_artifacts(topology: &Topology) -> Result<Vec<Artifact>, RenderError> {
    let mut artifacts = Vec::new();
    topology.walk(|node| -> Result<(), RenderError> {
        if let Some(service) = node.service() {
            artifacts.push(Artifact::new(
                registration_file(node, service),
                render_registration(node, service)?,
            ));
        }
        Ok(())
    })?;
    Ok(artifacts)
}
