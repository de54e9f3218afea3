//! Configuration module for netweave
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`NETWEAVE_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use netweave::config::NetweaveConfig;
//!
//! let config = NetweaveConfig::default();
//! assert_eq!(config.engine.deploy_concurrency, 8);
//!
//! let toml = r#"
//! [engine]
//! deploy_concurrency = 2
//! "#;
//! let config: NetweaveConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.engine.deploy_concurrency, 2);
//! ```

pub mod engine;
pub mod error;
pub mod logging;
pub mod pools;
pub mod templates;

pub use engine::EngineConfig;
pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use pools::PoolConfig;
pub use templates::{TemplateConfig, TemplateRule};

use crate::resource::{PoolId, PoolSpace};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Unified configuration for a netweave instance.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NetweaveConfig {
    /// Reconciliation engine settings
    pub engine: EngineConfig,
    /// Device-family to template dispatch
    pub templates: TemplateConfig,
    /// Pools declared at start-up
    pub pools: Vec<PoolConfig>,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl NetweaveConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supports NETWEAVE_* environment variables for common settings.
    /// Invalid values are silently ignored (defaults are kept).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("NETWEAVE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("NETWEAVE_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        if let Ok(concurrency) = std::env::var("NETWEAVE_DEPLOY_CONCURRENCY") {
            if let Ok(c) = concurrency.parse() {
                self.engine.deploy_concurrency = c;
            }
        }
        if let Ok(template) = std::env::var("NETWEAVE_DEFAULT_TEMPLATE") {
            self.templates.default = template;
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.deploy_concurrency == 0 {
            return Err(ConfigError::invalid(
                "engine.deploy_concurrency",
                "must be at least 1",
            ));
        }
        if self.engine.site_timeout_seconds == 0 {
            return Err(ConfigError::invalid(
                "engine.site_timeout_seconds",
                "must be non-zero",
            ));
        }

        if self.templates.default.is_empty() {
            return Err(ConfigError::invalid(
                "templates.default",
                "default template cannot be empty",
            ));
        }
        for (i, rule) in self.templates.rules.iter().enumerate() {
            if rule.family.is_empty() {
                return Err(ConfigError::invalid(
                    format!("templates.rules[{}].family", i),
                    "family cannot be empty",
                ));
            }
            if rule.template.is_empty() {
                return Err(ConfigError::invalid(
                    format!("templates.rules[{}].template", i),
                    "template cannot be empty",
                ));
            }
        }

        validate_pools(&self.pools)
    }
}

/// Check pool declarations for empty names, inverted ranges and
/// conflicting redeclarations of the same (name, scope).
pub fn validate_pools(pools: &[PoolConfig]) -> Result<(), ConfigError> {
    let mut seen: HashMap<PoolId, &PoolSpace> = HashMap::new();

    for (i, pool) in pools.iter().enumerate() {
        if pool.name.is_empty() {
            return Err(ConfigError::invalid(
                format!("pools[{}].name", i),
                "name cannot be empty",
            ));
        }
        if let PoolSpace::Id { start, end } = pool.space {
            if start > end {
                return Err(ConfigError::invalid(
                    format!("pools[{}]", i),
                    format!("start {} is above end {}", start, end),
                ));
            }
        }

        let id = PoolId::new(pool.name.as_str(), pool.scope.as_str());
        if let Some(previous) = seen.insert(id.clone(), &pool.space) {
            if previous != &pool.space {
                return Err(ConfigError::invalid(
                    format!("pools[{}]", i),
                    format!("pool {} declared twice with different spaces", id),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_netweave_config_defaults() {
        let config = NetweaveConfig::default();
        assert_eq!(config.engine.deploy_concurrency, 8);
        assert_eq!(config.templates.default, "openconfig");
        assert!(config.pools.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_parse_full_toml() {
        let toml = include_str!("../../netweave.example.toml");
        let config: NetweaveConfig = toml::from_str(toml).unwrap();
        assert!(!config.pools.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_load_from_file() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[engine]\ndeploy_concurrency = 3").unwrap();

        let config = NetweaveConfig::load(Some(temp.path())).unwrap();
        assert_eq!(config.engine.deploy_concurrency, 3);
    }

    #[test]
    fn test_config_missing_file_error() {
        let result = NetweaveConfig::load(Some(Path::new("/nonexistent/netweave.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_config_parse_error() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[engine\nbroken").unwrap();
        let result = NetweaveConfig::load(Some(temp.path()));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_config_load_none_returns_defaults() {
        let config = NetweaveConfig::load(None).unwrap();
        assert_eq!(config.engine.site_timeout_seconds, 120);
    }

    // Env overrides touch process-wide state, so they share one test
    #[test]
    fn test_config_env_overrides() {
        std::env::set_var("NETWEAVE_LOG_LEVEL", "debug");
        std::env::set_var("NETWEAVE_LOG_FORMAT", "json");
        std::env::set_var("NETWEAVE_DEPLOY_CONCURRENCY", "not-a-number");
        std::env::set_var("NETWEAVE_DEFAULT_TEMPLATE", "generic");
        let config = NetweaveConfig::default().with_env_overrides();
        std::env::remove_var("NETWEAVE_LOG_LEVEL");
        std::env::remove_var("NETWEAVE_LOG_FORMAT");
        std::env::remove_var("NETWEAVE_DEPLOY_CONCURRENCY");
        std::env::remove_var("NETWEAVE_DEFAULT_TEMPLATE");

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        // Invalid value keeps the default
        assert_eq!(config.engine.deploy_concurrency, 8);
        assert_eq!(config.templates.default, "generic");
    }

    #[test]
    fn test_config_validation_zero_concurrency() {
        let mut config = NetweaveConfig::default();
        config.engine.deploy_concurrency = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation { ref field, .. }) if field == "engine.deploy_concurrency"
        ));
    }

    #[test]
    fn test_config_validation_empty_rule_template() {
        let mut config = NetweaveConfig::default();
        config.templates.rules.push(TemplateRule::new("7750 SR", ""));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation { ref field, .. }) if field.ends_with(".template")
        ));
    }

    #[test]
    fn test_config_validation_conflicting_pools() {
        let toml = r#"
        [[pools]]
        name = "ip-pool"
        kind = "subnet"
        address_space = "10.0.0.0/18"

        [[pools]]
        name = "ip-pool"
        kind = "subnet"
        address_space = "10.64.0.0/18"
        "#;
        let config: NetweaveConfig = toml::from_str(toml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation { ref field, .. }) if field == "pools[1]"
        ));
    }

    #[test]
    fn test_config_validation_inverted_id_range() {
        let toml = r#"
        [[pools]]
        name = "vlan"
        kind = "id"
        start = 10
        end = 1
        "#;
        let config: NetweaveConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }
}
