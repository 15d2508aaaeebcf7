//! Wiring shared by every subcommand: config discovery, backend and manager

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notebook_core::backend::{EndpointConfig, Latency, SimulatedBackend};
use notebook_core::config::{ConfigError, ConsoleConfig};
use notebook_core::manager::LifecycleManager;
use notebook_core::notify::Notifier;
use notebook_core::source::InstanceSource;

use crate::fixtures::DemoSource;

pub struct Setup {
    pub title: String,
    /// Where the listing came from; `None` for built-in demo data
    pub config_path: Option<PathBuf>,
    pub user: Option<String>,
    pub latency: Latency,
    pub endpoints: EndpointConfig,
    source: Box<dyn InstanceSource>,
}

impl Setup {
    /// Use `explicit` if given, otherwise discover a config from the current
    /// directory upward. No config at all means demo data.
    pub fn load(explicit: Option<&Path>) -> Result<Self, String> {
        let found = match explicit {
            Some(path) => ConsoleConfig::load(path)
                .map(|c| Some((path.to_path_buf(), c)))
                .map_err(|e| format!("Failed to load {}: {}", path.display(), e))?,
            None => {
                let cwd = std::env::current_dir()
                    .map_err(|e| format!("Failed to get current directory: {}", e))?;
                match ConsoleConfig::discover(&cwd) {
                    Ok(found) => Some(found),
                    Err(ConfigError::NotFound { .. }) => None,
                    Err(e) => return Err(format!("Invalid config: {}", e)),
                }
            }
        };

        Ok(match found {
            Some((path, config)) => {
                tracing::info!(path = %path.display(), "loaded config");
                Self {
                    title: config.title().to_string(),
                    config_path: Some(path),
                    user: config.user.clone(),
                    latency: config.latency,
                    endpoints: config.endpoints.clone(),
                    source: Box::new(config),
                }
            }
            None => {
                tracing::info!("no config found, using demo data");
                let endpoints = EndpointConfig::default();
                Self {
                    title: "demo".to_string(),
                    config_path: None,
                    user: None,
                    latency: Latency::default(),
                    endpoints: endpoints.clone(),
                    source: Box::new(DemoSource::new(endpoints)),
                }
            }
        })
    }

    pub fn source_label(&self) -> String {
        match &self.config_path {
            Some(path) => path.display().to_string(),
            None => "built-in demo data".to_string(),
        }
    }

    /// Manager seeded from this setup's source, reporting to `notifier`.
    pub async fn manager(&self, notifier: Arc<dyn Notifier>) -> Result<LifecycleManager, String> {
        self.manager_with_latency(notifier, self.latency).await
    }

    pub async fn manager_with_latency(
        &self,
        notifier: Arc<dyn Notifier>,
        latency: Latency,
    ) -> Result<LifecycleManager, String> {
        let backend = SimulatedBackend::new(latency).with_endpoints(self.endpoints.clone());
        let mut manager = LifecycleManager::new(Arc::new(backend), notifier);
        if let Some(user) = &self.user {
            manager = manager.with_user(user.clone());
        }
        manager
            .load(self.source.as_ref())
            .await
            .map_err(|e| format!("Failed to load instances: {}", e))?;
        Ok(manager)
    }
}
