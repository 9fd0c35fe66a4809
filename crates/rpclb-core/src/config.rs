//! Configuration types for rpclb

use serde::{Deserialize, Serialize};

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LbConfig {
    /// Balancer configuration
    pub balancer: BalancerConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl LbConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, crate::LbError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::LbError::Config(format!("Failed to read config file: {}", e))
        })?;
        toml::from_str(&content)
            .map_err(|e| crate::LbError::Config(format!("Failed to parse config: {}", e)))
    }
}

/// Balancer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Logical service name handed to the resolver
    pub target: String,
    /// Backend addresses for the static resolver
    pub addresses: Vec<String>,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            target: "default".to_string(),
            addresses: Vec::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = LbConfig::default();
        assert_eq!(config.balancer.target, "default");
        assert!(config.balancer.addresses.is_empty());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_parse() {
        let toml_str = r#"
[balancer]
target = "greeter"
addresses = ["10.0.0.1:50051", "10.0.0.2:50051"]
"#;
        let config: LbConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.balancer.target, "greeter");
        assert_eq!(config.balancer.addresses.len(), 2);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nlevel = \"debug\"").unwrap();

        let config = LbConfig::from_file(file.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.balancer.target, "default");
    }

    #[test]
    fn test_config_missing_file() {
        let err = LbConfig::from_file(std::path::Path::new("/nonexistent/rpclb.toml")).unwrap_err();
        assert!(matches!(err, crate::LbError::Config(_)));
    }
}
