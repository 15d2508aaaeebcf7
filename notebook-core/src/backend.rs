use std::collections::BTreeSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::link;
use crate::model::{Instance, InstanceId};

/// Addresses a started instance is reachable at
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    pub url: String,
    pub ssh_command: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("instance {id} could not be scheduled: {reason}")]
    Refused { id: InstanceId, reason: String },
}

/// Compute backend behind the console.
///
/// Each call resolves once the backend considers the operation finished. The
/// lifecycle manager runs these calls inside its task scope and applies the
/// completion only if the scope is still alive.
///
/// - `SimulatedBackend`: fixed latency, always succeeds unless told otherwise
#[async_trait]
pub trait Backend: Send + Sync {
    /// Bring a stopped instance up.
    async fn start(&self, instance: &Instance) -> Result<Endpoints, BackendError>;

    /// Shut a running instance down.
    async fn stop(&self, instance: &Instance) -> Result<(), BackendError>;

    /// Allocate and boot a freshly created instance.
    async fn provision(&self, instance: &Instance) -> Result<Endpoints, BackendError>;

    fn name(&self) -> &'static str;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Latency {
    #[serde(default = "default_start_ms")]
    pub start_ms: u64,
    #[serde(default = "default_stop_ms")]
    pub stop_ms: u64,
    #[serde(default = "default_create_ms")]
    pub create_ms: u64,
}

fn default_start_ms() -> u64 {
    2000
}
fn default_stop_ms() -> u64 {
    1500
}
fn default_create_ms() -> u64 {
    3000
}

impl Default for Latency {
    fn default() -> Self {
        Self {
            start_ms: default_start_ms(),
            stop_ms: default_stop_ms(),
            create_ms: default_create_ms(),
        }
    }
}

impl Latency {
    pub fn uniform(ms: u64) -> Self {
        Self {
            start_ms: ms,
            stop_ms: ms,
            create_ms: ms,
        }
    }

    pub fn start(&self) -> Duration {
        Duration::from_millis(self.start_ms)
    }
    pub fn stop(&self) -> Duration {
        Duration::from_millis(self.stop_ms)
    }
    pub fn create(&self) -> Duration {
        Duration::from_millis(self.create_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_ssh_host")]
    pub ssh_host: String,
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
}

fn default_base_url() -> String {
    "https://console.local".into()
}
fn default_ssh_host() -> String {
    "dev.console.local".into()
}
fn default_ssh_port() -> u16 {
    22
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            ssh_host: default_ssh_host(),
            ssh_port: default_ssh_port(),
        }
    }
}

/// Stand-in backend: sleeps for the configured latency, then succeeds.
pub struct SimulatedBackend {
    latency: Latency,
    endpoints: EndpointConfig,
    failing: Mutex<BTreeSet<InstanceId>>,
}

impl SimulatedBackend {
    pub fn new(latency: Latency) -> Self {
        Self {
            latency,
            endpoints: EndpointConfig::default(),
            failing: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn with_endpoints(mut self, endpoints: EndpointConfig) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Make the next operation on `id` fail once.
    pub fn fail_next(&self, id: &str) {
        self.failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.to_string());
    }

    fn take_failure(&self, id: &str) -> Option<BackendError> {
        let mut failing = self.failing.lock().unwrap_or_else(|e| e.into_inner());
        failing.remove(id).then(|| BackendError::Refused {
            id: id.to_string(),
            reason: "insufficient capacity for the requested flavor".into(),
        })
    }

    fn endpoints_for(&self, instance: &Instance) -> Endpoints {
        Endpoints {
            url: link::workspace_url(&self.endpoints.base_url, &instance.id),
            ssh_command: instance.ssh_enabled.then(|| {
                link::ssh_command(&self.endpoints.ssh_host, &instance.id, self.endpoints.ssh_port)
            }),
        }
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new(Latency::default())
    }
}

#[async_trait]
impl Backend for SimulatedBackend {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn start(&self, instance: &Instance) -> Result<Endpoints, BackendError> {
        tokio::time::sleep(self.latency.start()).await;
        if let Some(err) = self.take_failure(&instance.id) {
            return Err(err);
        }
        Ok(self.endpoints_for(instance))
    }

    async fn stop(&self, instance: &Instance) -> Result<(), BackendError> {
        tokio::time::sleep(self.latency.stop()).await;
        match self.take_failure(&instance.id) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn provision(&self, instance: &Instance) -> Result<Endpoints, BackendError> {
        tokio::time::sleep(self.latency.create()).await;
        if let Some(err) = self.take_failure(&instance.id) {
            return Err(err);
        }
        Ok(self.endpoints_for(instance))
    }
}
