// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{
    DEFAULT_PAGE_SIZE, DEFAULT_POLL_INTERVAL_MS, DEFAULT_PRIORITY, DEFAULT_SHUTDOWN_GRACE_SECS,
    FALLBACK_MAX_CONCURRENCY,
};
use crate::errors::ConfigError;
use crate::priority::Priority;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Engine configuration.
///
/// Every field is optional; the `get_*` accessors fall back to the defaults in
/// [`crate::config::consts`]. Files ending in `.toml` are read as TOML,
/// anything else as YAML.
///
/// # Example
/// ```yaml
/// poll_interval_ms: 500
/// max_concurrency: 8
/// queue_limits:
///   archive: 1
///   transfer: 2
/// shutdown_grace_secs: 10
/// model_dir: ./models
/// processor_store_dir: ./state
/// default_priority: 5.0
/// page_size: 25
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub poll_interval_ms: Option<u64>,
    pub max_concurrency: Option<usize>,
    /// Slots per runner queue, keyed by the task's `QueueName` static metadata.
    #[serde(default)]
    pub queue_limits: HashMap<String, usize>,
    pub shutdown_grace_secs: Option<u64>,
    /// Directory of `.yaml` workflow models.
    pub model_dir: Option<PathBuf>,
    /// Directory where processor snapshots are kept across restarts.
    pub processor_store_dir: Option<PathBuf>,
    pub default_priority: Option<f64>,
    pub page_size: Option<usize>,
}

impl EngineConfig {
    pub fn get_poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS))
    }

    /// Configured concurrency, or the host's available parallelism.
    pub fn get_max_concurrency(&self) -> usize {
        self.max_concurrency.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(FALLBACK_MAX_CONCURRENCY)
        })
    }

    pub fn get_shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs.unwrap_or(DEFAULT_SHUTDOWN_GRACE_SECS))
    }

    pub fn get_default_priority(&self) -> Priority {
        Priority::new(self.default_priority.unwrap_or(DEFAULT_PRIORITY))
    }

    pub fn get_page_size(&self) -> usize {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// Rejects settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == Some(0) {
            return Err(ConfigError::Invalid("max_concurrency must be at least 1".into()));
        }
        if self.poll_interval_ms == Some(0) {
            return Err(ConfigError::Invalid("poll_interval_ms must be at least 1".into()));
        }
        if self.page_size == Some(0) {
            return Err(ConfigError::Invalid("page_size must be at least 1".into()));
        }
        if let Some((queue, _)) = self.queue_limits.iter().find(|(_, slots)| **slots == 0) {
            return Err(ConfigError::Invalid(format!(
                "queue_limits.{queue} must be at least 1"
            )));
        }
        if let Some(priority) = self.default_priority {
            let range = Priority::LOWEST.value()..=Priority::HIGHEST.value();
            if !range.contains(&priority) {
                return Err(ConfigError::Invalid(format!(
                    "default_priority {priority} is outside {}..={}",
                    range.start(),
                    range.end()
                )));
            }
        }
        Ok(())
    }
}

/// Loads a config from a YAML or TOML file, chosen by extension.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&content)?
    } else {
        serde_yaml::from_str(&content)?
    };
    Ok(cfg)
}

/// Loads a config and rejects invalid settings.
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
    let cfg = load_config(path)?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn write_config(suffix: &str, body: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parse_yaml_config() {
        let yaml = r#"
poll_interval_ms: 250
max_concurrency: 3
queue_limits:
  archive: 1
model_dir: models
"#;
        let file = write_config(".yaml", yaml);
        let cfg = load_and_validate_config(file.path()).unwrap();
        assert_eq!(cfg.get_poll_interval(), Duration::from_millis(250));
        assert_eq!(cfg.get_max_concurrency(), 3);
        assert_eq!(cfg.queue_limits.get("archive"), Some(&1));
        assert_eq!(cfg.model_dir, Some(PathBuf::from("models")));
    }

    #[test]
    fn parse_toml_config() {
        let toml = r#"
shutdown_grace_secs = 1
default_priority = 7.5

[queue_limits]
transfer = 2
"#;
        let file = write_config(".toml", toml);
        let cfg = load_and_validate_config(file.path()).unwrap();
        assert_eq!(cfg.get_shutdown_grace(), Duration::from_secs(1));
        assert_eq!(cfg.get_default_priority(), Priority::HIGH);
        assert_eq!(cfg.queue_limits.get("transfer"), Some(&2));
    }

    #[test]
    fn test_defaults_apply_to_empty_config() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.get_poll_interval(), Duration::from_millis(DEFAULT_POLL_INTERVAL_MS));
        assert_eq!(cfg.get_default_priority(), Priority::MEDIUM);
        assert_eq!(cfg.get_page_size(), DEFAULT_PAGE_SIZE);
        assert!(cfg.get_max_concurrency() >= 1);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_zero_settings_are_rejected() {
        for yaml in [
            "max_concurrency: 0",
            "poll_interval_ms: 0",
            "page_size: 0",
            "queue_limits: { archive: 0 }",
            "default_priority: 11.0",
        ] {
            let file = write_config(".yaml", yaml);
            let result = load_and_validate_config(file.path());
            assert!(matches!(result, Err(ConfigError::Invalid(_))), "accepted: {yaml}");
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = load_config("/definitely/not/here.yaml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_malformed_yaml_is_reported() {
        let file = write_config(".yml", "max_concurrency: [not, a, number]");
        assert!(matches!(load_config(file.path()), Err(ConfigError::Yaml(_))));
    }
}
