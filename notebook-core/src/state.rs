use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Dataset, Instance, InstanceId, Project};

/// Per-instance timeline cap
pub const EVENT_CAP: usize = 200;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventLevel {
    Info,
    Warning,
    Error,
}

impl EventLevel {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARN",
            Self::Error => "ERROR",
        }
    }
}

/// Entry on an instance's "events" tab
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstanceEvent {
    pub at: DateTime<Utc>,
    pub level: EventLevel,
    pub message: String,
}

#[derive(Debug)]
pub struct EventStore {
    pub cap: usize,
    pub per_instance: BTreeMap<InstanceId, VecDeque<InstanceEvent>>,
}

impl EventStore {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            per_instance: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, id: &InstanceId, event: InstanceEvent) {
        let q = self.per_instance.entry(id.clone()).or_default();
        q.push_back(event);
        while q.len() > self.cap {
            q.pop_front();
        }
    }

    pub fn get(&self, id: &str) -> impl Iterator<Item = &InstanceEvent> {
        self.per_instance.get(id).into_iter().flatten()
    }

    pub fn clear(&mut self, id: &str) {
        self.per_instance.remove(id);
    }
}

/// Everything the console shows. Instances are kept newest first.
#[derive(Debug)]
pub struct ConsoleState {
    pub instances: Vec<Instance>,
    pub projects: Vec<Project>,
    pub datasets: Vec<Dataset>,
    pub events: EventStore,
    pub last_event_id: u64,
}

impl Default for ConsoleState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleState {
    pub fn new() -> Self {
        Self {
            instances: Vec::new(),
            projects: Vec::new(),
            datasets: Vec::new(),
            events: EventStore::new(EVENT_CAP),
            last_event_id: 0,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Instance> {
        self.instances.iter().find(|i| i.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Instance> {
        self.instances.iter_mut().find(|i| i.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.instances.iter().position(|i| i.id == id)
    }

    /// Prepend, keeping ids unique. Returns false if the id is taken.
    pub fn prepend(&mut self, instance: Instance) -> bool {
        if self.contains(&instance.id) {
            return false;
        }
        self.instances.insert(0, instance);
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<Instance> {
        let idx = self.position(id)?;
        self.events.clear(id);
        Some(self.instances.remove(idx))
    }

    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn datasets_of<'a>(&'a self, project: &'a str) -> impl Iterator<Item = &'a Dataset> + 'a {
        self.datasets.iter().filter(move |d| d.project == project)
    }
}
