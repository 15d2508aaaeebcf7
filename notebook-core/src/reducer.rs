use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::form::EditRequest;
use crate::model::{Dataset, Instance, InstanceId, InstanceStatus, Project, Tag};
use crate::state::{ConsoleState, EventLevel, InstanceEvent};

#[derive(Clone, Debug)]
pub enum ConsoleEvent {
    Loaded {
        instances: Vec<Instance>,
        projects: Vec<Project>,
        datasets: Vec<Dataset>,
    },
    InstanceCreated {
        instance: Instance,
    },
    StatusChanged {
        id: InstanceId,
        status: InstanceStatus,
    },
    /// Start finished: running, runtime reset, addresses populated
    Started {
        id: InstanceId,
        url: String,
        ssh_command: Option<String>,
    },
    /// Stop finished: stopped, runtime cleared
    Stopped {
        id: InstanceId,
    },
    Edited {
        id: InstanceId,
        patch: EditRequest,
    },
    DescriptionUpdated {
        id: InstanceId,
        description: String,
    },
    TagSet {
        id: InstanceId,
        tag: Tag,
    },
    TagRemoved {
        id: InstanceId,
        key: String,
    },
    InstanceDeleted {
        id: InstanceId,
    },
    Logged {
        id: InstanceId,
        level: EventLevel,
        message: String,
    },
    /// Wall-clock progress for running instances
    Tick {
        elapsed: Duration,
    },
}

#[derive(Clone, Debug)]
pub struct EventEnvelope {
    pub id: u64,
    pub at: DateTime<Utc>,
    pub event: ConsoleEvent,
}

pub fn reduce(state: &mut ConsoleState, env: &EventEnvelope) {
    state.last_event_id = env.id;

    match &env.event {
        ConsoleEvent::Loaded {
            instances,
            projects,
            datasets,
        } => {
            state.instances = instances.clone();
            state.projects = projects.clone();
            state.datasets = datasets.clone();
        }
        ConsoleEvent::InstanceCreated { instance } => {
            state.prepend(instance.clone());
        }
        ConsoleEvent::StatusChanged { id, status } => {
            if let Some(inst) = state.get_mut(id) {
                inst.status = *status;
            }
        }
        ConsoleEvent::Started {
            id,
            url,
            ssh_command,
        } => {
            if let Some(inst) = state.get_mut(id) {
                inst.status = InstanceStatus::Running;
                inst.runtime = Some(Duration::ZERO);
                inst.url = Some(url.clone());
                if inst.ssh_enabled {
                    inst.ssh_command = ssh_command.clone();
                }
            }
        }
        ConsoleEvent::Stopped { id } => {
            if let Some(inst) = state.get_mut(id) {
                inst.status = InstanceStatus::Stopped;
                inst.runtime = None;
            }
        }
        ConsoleEvent::Edited { id, patch } => {
            if let Some(inst) = state.get_mut(id) {
                if let Some(name) = &patch.name {
                    inst.name = name.clone();
                }
                if let Some(spec) = &patch.spec {
                    inst.spec = spec.clone();
                }
                if let Some(image) = &patch.image {
                    inst.image = image.clone();
                }
                if let Some(ssh) = patch.ssh_enabled {
                    inst.ssh_enabled = ssh;
                    if !ssh {
                        inst.ssh_command = None;
                    }
                }
                if let Some(hours) = patch.auto_stop_hours {
                    inst.auto_stop_hours = hours;
                }
            }
        }
        ConsoleEvent::DescriptionUpdated { id, description } => {
            if let Some(inst) = state.get_mut(id) {
                inst.description = description.clone();
            }
        }
        ConsoleEvent::TagSet { id, tag } => {
            if let Some(inst) = state.get_mut(id) {
                inst.upsert_tag(tag.clone());
            }
        }
        ConsoleEvent::TagRemoved { id, key } => {
            if let Some(inst) = state.get_mut(id) {
                inst.remove_tag(key);
            }
        }
        ConsoleEvent::InstanceDeleted { id } => {
            state.remove(id);
        }
        ConsoleEvent::Logged { id, level, message } => {
            if state.contains(id) {
                state.events.push(id, InstanceEvent {
                    at: env.at,
                    level: *level,
                    message: message.clone(),
                });
            }
        }
        ConsoleEvent::Tick { elapsed } => {
            for inst in state
                .instances
                .iter_mut()
                .filter(|i| i.status == InstanceStatus::Running)
            {
                inst.runtime = Some(inst.runtime.unwrap_or_default() + *elapsed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(id: u64, event: ConsoleEvent) -> EventEnvelope {
        EventEnvelope {
            id,
            at: Utc::now(),
            event,
        }
    }

    fn instance(id: &str, status: InstanceStatus) -> Instance {
        Instance {
            id: id.into(),
            name: id.into(),
            description: String::new(),
            status,
            spec: "CPU".into(),
            image: "img".into(),
            runtime: None,
            ssh_enabled: true,
            auto_stop_hours: None,
            url: None,
            ssh_command: None,
            created_at: Utc::now(),
            creator: "me".into(),
            project: None,
            tags: Vec::new(),
            storage: Vec::new(),
        }
    }

    #[test]
    fn test_started_and_stopped_reset_runtime() {
        let mut state = ConsoleState::new();
        reduce(&mut state, &envelope(1, ConsoleEvent::InstanceCreated {
            instance: instance("a", InstanceStatus::Starting),
        }));
        reduce(&mut state, &envelope(2, ConsoleEvent::Started {
            id: "a".into(),
            url: "https://x/a".into(),
            ssh_command: Some("ssh a".into()),
        }));
        let a = state.get("a").unwrap();
        assert_eq!(a.status, InstanceStatus::Running);
        assert_eq!(a.runtime, Some(Duration::ZERO));
        assert_eq!(a.ssh_command.as_deref(), Some("ssh a"));

        reduce(&mut state, &envelope(3, ConsoleEvent::Tick {
            elapsed: Duration::from_secs(90),
        }));
        assert_eq!(state.get("a").unwrap().runtime, Some(Duration::from_secs(90)));

        reduce(&mut state, &envelope(4, ConsoleEvent::Stopped { id: "a".into() }));
        let a = state.get("a").unwrap();
        assert_eq!(a.status, InstanceStatus::Stopped);
        assert_eq!(a.runtime, None);
        assert_eq!(state.last_event_id, 4);
    }

    #[test]
    fn test_created_instances_are_prepended() {
        let mut state = ConsoleState::new();
        for (n, id) in ["a", "b", "c"].iter().enumerate() {
            reduce(&mut state, &envelope(n as u64, ConsoleEvent::InstanceCreated {
                instance: instance(id, InstanceStatus::Stopped),
            }));
        }
        let ids: Vec<_> = state.instances.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_delete_drops_record_and_events() {
        let mut state = ConsoleState::new();
        reduce(&mut state, &envelope(1, ConsoleEvent::InstanceCreated {
            instance: instance("a", InstanceStatus::Stopped),
        }));
        reduce(&mut state, &envelope(2, ConsoleEvent::Logged {
            id: "a".into(),
            level: EventLevel::Info,
            message: "created".into(),
        }));
        assert_eq!(state.events.get("a").count(), 1);

        reduce(&mut state, &envelope(3, ConsoleEvent::InstanceDeleted { id: "a".into() }));
        assert!(!state.contains("a"));
        assert_eq!(state.events.get("a").count(), 0);

        // Late log for a deleted instance is dropped
        reduce(&mut state, &envelope(4, ConsoleEvent::Logged {
            id: "a".into(),
            level: EventLevel::Info,
            message: "late".into(),
        }));
        assert_eq!(state.events.get("a").count(), 0);
    }

    #[test]
    fn test_edit_patch_applies_only_given_fields() {
        let mut state = ConsoleState::new();
        let mut inst = instance("a", InstanceStatus::Stopped);
        inst.ssh_command = Some("ssh a".into());
        reduce(&mut state, &envelope(1, ConsoleEvent::InstanceCreated { instance: inst }));
        reduce(&mut state, &envelope(2, ConsoleEvent::Edited {
            id: "a".into(),
            patch: EditRequest {
                image: Some("tf-2.15".into()),
                ssh_enabled: Some(false),
                ..Default::default()
            },
        }));
        let a = state.get("a").unwrap();
        assert_eq!(a.image, "tf-2.15");
        assert_eq!(a.spec, "CPU");
        assert!(!a.ssh_enabled);
        assert_eq!(a.ssh_command, None);
    }
}
