use crate::config::Config;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::{info, warn};
use std::fs::File;
use std::path::Path;

/// Load, parse and structurally validate a configuration YAML file
pub fn load_config(config_path: &Path) -> Result<Config> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open config file '{}'", config_path.display()))?;

    let config: Config = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse config file '{}'", config_path.display()))?;

    config.validate()?;
    log_config_summary(&config);

    Ok(config)
}

/// Parse and validate configuration from an in-memory YAML document
pub fn parse_config(yaml: &str) -> Result<Config> {
    let config: Config = serde_yaml::from_str(yaml).wrap_err("Failed to parse config")?;
    config.validate()?;
    Ok(config)
}

fn log_config_summary(config: &Config) {
    info!(
        "Detected {} datacenter(s), network shape {}",
        config.topology.datacenters.len(),
        config.topology.network_shape.as_deref().unwrap_or("flat (default)")
    );

    if config.security.tls && config.security.gossip_key.is_none() {
        warn!("TLS is enabled but no gossip_key is set; gossip traffic will not be encrypted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let yaml = r#"
consul_image: "consul:1.9.0"
monitor:
  prometheus: true
topology:
  network_shape: flat
  datacenters:
    dc1: { servers: 1, clients: 2 }
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert!(config.prometheus_enabled());
        assert_eq!(config.topology.datacenters.len(), 1);
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config(Path::new("/definitely/not/here.yaml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_rejects_invalid_general() {
        let yaml = r#"
consul_image: ""
topology:
  datacenters:
    dc1: { servers: 1, clients: 1 }
"#;
        assert!(parse_config(yaml).is_err());
    }

    #[test]
    fn test_parse_rejects_malformed_yaml() {
        assert!(parse_config("consul_image: [unterminated").is_err());
    }
}
