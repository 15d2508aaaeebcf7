use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::{EndpointConfig, Latency};
use crate::model::{Dataset, Instance, Project};
use crate::source::{Fixtures, InstanceSource, SourceError};

pub const CONFIG_ENV: &str = "NBCONSOLE_CONFIG";
const CONFIG_NAMES: [&str; 4] = [
    "nbconsole.yml",
    "nbconsole.yaml",
    ".nbconsole.yml",
    ".nbconsole.yaml",
];

/// Root configuration file structure
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ConsoleConfig {
    /// Config file version
    #[serde(default = "default_version")]
    pub version: String,

    /// Console title
    #[serde(default)]
    pub name: Option<String>,

    /// Recorded as `creator` on new instances
    #[serde(default)]
    pub user: Option<String>,

    /// Simulated backend latencies
    #[serde(default)]
    pub latency: Latency,

    #[serde(default)]
    pub endpoints: EndpointConfig,

    #[serde(default)]
    pub instances: Vec<Instance>,

    #[serde(default)]
    pub projects: Vec<Project>,

    #[serde(default)]
    pub datasets: Vec<Dataset>,
}

fn default_version() -> String {
    "1".into()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid fixtures: {0}")]
    Fixtures(#[from] SourceError),
    #[error("instance '{id}' has an empty {field}")]
    EmptyField { id: String, field: &'static str },
    #[error("endpoints.base_url must start with http:// or https://, got '{0}'")]
    BadBaseUrl(String),
    #[error("no config file found, searched: {searched:?}")]
    NotFound { searched: Vec<PathBuf> },
}

impl ConsoleConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a string (useful for testing)
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: ConsoleConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Search for a config file: `NBCONSOLE_CONFIG` first, then the standard
    /// names in `start_dir` and each of its parents.
    pub fn discover(start_dir: &Path) -> Result<(PathBuf, Self), ConfigError> {
        let mut searched = Vec::new();

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Ok((path.clone(), Self::load(&path)?));
            }
            searched.push(path);
        }

        let mut dir = Some(start_dir);
        while let Some(current) = dir {
            for name in &CONFIG_NAMES {
                let path = current.join(name);
                if path.exists() {
                    return Ok((path.clone(), Self::load(&path)?));
                }
                searched.push(path);
            }
            dir = current.parent();
        }

        Err(ConfigError::NotFound { searched })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for inst in &self.instances {
            for (field, value) in [
                ("name", &inst.name),
                ("spec", &inst.spec),
                ("image", &inst.image),
            ] {
                if value.trim().is_empty() {
                    return Err(ConfigError::EmptyField {
                        id: inst.id.clone(),
                        field,
                    });
                }
            }
        }

        let base = &self.endpoints.base_url;
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::BadBaseUrl(base.clone()));
        }

        self.fixtures().check()?;
        Ok(())
    }

    pub fn fixtures(&self) -> Fixtures {
        Fixtures {
            instances: self.instances.clone(),
            projects: self.projects.clone(),
            datasets: self.datasets.clone(),
        }
    }

    pub fn title(&self) -> &str {
        self.name.as_deref().unwrap_or("notebooks")
    }
}

#[async_trait]
impl InstanceSource for ConsoleConfig {
    async fn fetch(&self) -> Result<Fixtures, SourceError> {
        Ok(self.fixtures())
    }

    fn name(&self) -> &'static str {
        "config"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InstanceStatus;

    #[test]
    fn test_parse_simple_config() {
        let yaml = r#"
version: "1"
name: ml-team
user: alice
latency:
  start_ms: 500
instances:
  - id: NB-20240301-a1
    name: resnet-train
    status: stopped
    spec: "GPU: 1*V100(32GB)"
    image: pytorch-2.1
    created_at: 2024-03-01T09:30:00Z
    creator: alice
    tags:
      - { key: team, value: cv }
"#;
        let config = ConsoleConfig::from_str(yaml).unwrap();
        assert_eq!(config.title(), "ml-team");
        assert_eq!(config.latency.start_ms, 500);
        assert_eq!(config.latency.stop_ms, 1500);
        assert_eq!(config.instances.len(), 1);
        assert_eq!(config.instances[0].status, InstanceStatus::Stopped);
        assert_eq!(config.instances[0].runtime, None);
        assert_eq!(config.endpoints.ssh_port, 22);
    }

    #[test]
    fn test_duplicate_instance_ids() {
        let yaml = r#"
instances:
  - { id: a, name: one, status: stopped, spec: s, image: i, created_at: 2024-03-01T00:00:00Z, creator: x }
  - { id: a, name: two, status: running, spec: s, image: i, created_at: 2024-03-01T00:00:00Z, creator: x }
"#;
        let result = ConsoleConfig::from_str(yaml);
        assert!(matches!(
            result,
            Err(ConfigError::Fixtures(SourceError::DuplicateId { .. }))
        ));
    }

    #[test]
    fn test_unknown_project_reference() {
        let yaml = r#"
projects:
  - { id: vision, name: Vision, owner: alice, created_at: 2024-01-01T00:00:00Z }
datasets:
  - { id: ds1, name: imagenet, project: nlp, created_at: 2024-01-01T00:00:00Z }
"#;
        let result = ConsoleConfig::from_str(yaml);
        assert!(matches!(
            result,
            Err(ConfigError::Fixtures(SourceError::UnknownProject { .. }))
        ));
    }

    #[test]
    fn test_empty_field_and_bad_url() {
        let yaml = r#"
instances:
  - { id: a, name: " ", status: stopped, spec: s, image: i, created_at: 2024-03-01T00:00:00Z, creator: x }
"#;
        assert!(matches!(
            ConsoleConfig::from_str(yaml),
            Err(ConfigError::EmptyField { field: "name", .. })
        ));

        let yaml = "endpoints:\n  base_url: console.local\n";
        assert!(matches!(
            ConsoleConfig::from_str(yaml),
            Err(ConfigError::BadBaseUrl(_))
        ));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ConsoleConfig::from_str("{}").unwrap();
        assert_eq!(config.version, "1");
        assert_eq!(config.latency, Latency::default());
        assert!(config.instances.is_empty());
    }
}
