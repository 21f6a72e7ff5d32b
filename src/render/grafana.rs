//! Dashboard provisioning files.
//!
//! Both files are fixed: a Prometheus datasource pointing at the local
//! metrics server, and anonymous admin access for the dashboard UI.

use super::types::Artifact;

pub const GRAFANA_DATASOURCE_FILE: &str = "cache/grafana-prometheus.yml";
pub const GRAFANA_INI_FILE: &str = "cache/grafana.ini";

const DATASOURCE: &str = "\
apiVersion: 1

datasources:
- name: Prometheus
  type: prometheus
  access: proxy
  url: http://localhost:9090
  isDefault: true
  version: 1
  editable: false
";

const GRAFANA_INI: &str = "\
[auth.anonymous]
enabled = true

# Organization name that should be used for unauthenticated users
org_name = Main Org.

# Role for unauthenticated users, other valid values are 'Editor' and 'Admin'
org_role = Admin
";

pub fn grafana_artifacts() -> Vec<Artifact> {
    vec![
        Artifact::new(GRAFANA_DATASOURCE_FILE, DATASOURCE),
        Artifact::new(GRAFANA_INI_FILE, GRAFANA_INI),
    ]
}
