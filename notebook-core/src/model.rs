use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type InstanceId = String;
pub type ProjectId = String;

/// Lifecycle status of a notebook instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Running,
    Stopped,
    Starting,
    Stopping,
    Failed,
}

impl InstanceStatus {
    pub const ALL: [InstanceStatus; 5] = [
        InstanceStatus::Running,
        InstanceStatus::Stopped,
        InstanceStatus::Starting,
        InstanceStatus::Stopping,
        InstanceStatus::Failed,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Stopping => "stopping",
            Self::Failed => "failed",
        }
    }

    /// Starting/Stopping bridge an action to its backend completion.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Starting | Self::Stopping)
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// How a user attaches to a running instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectKind {
    Jupyter,
    VsCode,
    Ssh,
}

impl ConnectKind {
    pub const ALL: [ConnectKind; 3] = [ConnectKind::Jupyter, ConnectKind::VsCode, ConnectKind::Ssh];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Jupyter => "JupyterLab",
            Self::VsCode => "VS Code",
            Self::Ssh => "SSH",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// Block volume attached to the instance
    Evs,
    /// Object storage bucket mounted as a directory
    Obs,
    Local,
}

impl StorageKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Evs => "EVS",
            Self::Obs => "OBS",
            Self::Local => "local",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StorageMount {
    pub name: String,
    pub kind: StorageKind,
    pub mount_path: String,
    #[serde(default)]
    pub capacity_gb: Option<u32>,
}

/// A notebook development environment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: InstanceStatus,
    /// Compute flavor, e.g. "GPU: 1*V100(32GB) | CPU: 8 vCPUs 64GB"
    pub spec: String,
    pub image: String,
    /// Time since the last successful start; `None` while not running
    #[serde(default, with = "runtime_secs")]
    pub runtime: Option<Duration>,
    #[serde(default)]
    pub ssh_enabled: bool,
    #[serde(default)]
    pub auto_stop_hours: Option<u32>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub ssh_command: Option<String>,
    pub created_at: DateTime<Utc>,
    pub creator: String,
    #[serde(default)]
    pub project: Option<ProjectId>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub storage: Vec<StorageMount>,
}

impl Instance {
    pub fn runtime_label(&self) -> String {
        match self.runtime {
            None => "-".to_string(),
            Some(d) => {
                let mins = d.as_secs() / 60;
                if mins < 60 {
                    format!("{}m", mins)
                } else {
                    format!("{}h {}m", mins / 60, mins % 60)
                }
            }
        }
    }

    pub fn tag(&self, key: &str) -> Option<&Tag> {
        self.tags.iter().find(|t| t.key == key)
    }

    /// Insert or replace a tag, keeping first-insertion order.
    pub fn upsert_tag(&mut self, tag: Tag) {
        match self.tags.iter_mut().find(|t| t.key == tag.key) {
            Some(existing) => existing.value = tag.value,
            None => self.tags.push(tag),
        }
    }

    pub fn remove_tag(&mut self, key: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t.key != key);
        self.tags.len() != before
    }
}

mod runtime_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    pub name: String,
    pub project: ProjectId,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub records: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}
