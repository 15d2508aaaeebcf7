//! `nbconsole demo` - scripted lifecycle walkthrough without the TUI
//!
//! Drives the manager through start, create, stop, connect, delete and
//! dispose, printing the keyed toast after each step so the
//! loading -> success replacement is visible.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::TryRecvError};

use notebook_core::backend::Latency;
use notebook_core::form::{CreateRequest, EditRequest};
use notebook_core::manager::LifecycleManager;
use notebook_core::model::{ConnectKind, InstanceStatus};
use notebook_core::notify::{NotificationCenter, op_key};
use notebook_core::reducer::{ConsoleEvent, EventEnvelope};

use crate::console::Setup;

const DEMO_LATENCY_MS: u64 = 300;

struct Walkthrough {
    manager: LifecycleManager,
    center: Arc<NotificationCenter>,
    events: broadcast::Receiver<EventEnvelope>,
}

impl Walkthrough {
    fn step(&self, title: &str) {
        println!("\n== {} ==", title);
    }

    fn toast(&self, operation: &str, id: &str) {
        match self.center.get(&op_key(operation, id)) {
            Some(n) => println!("  toast [{}] {}: {}", n.key, n.level.label(), n.text),
            None => println!("  toast [{}] (none)", op_key(operation, id)),
        }
    }

    /// Print reducer events emitted since the last drain.
    fn drain_events(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(env) => {
                    if let Some(line) = describe(&env.event) {
                        println!("  #{:<3} {}", env.id, line);
                    }
                }
                Err(TryRecvError::Lagged(n)) => println!("  ({} events skipped)", n),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    async fn status(&self, id: &str) -> String {
        match self.manager.instance(id).await {
            Some(inst) => format!("{} ({})", inst.status, inst.runtime_label()),
            None => "gone".to_string(),
        }
    }

    async fn first_with(&self, statuses: &[InstanceStatus]) -> Option<String> {
        self.manager
            .instances()
            .await
            .into_iter()
            .find(|i| statuses.contains(&i.status))
            .map(|i| i.id)
    }
}

fn describe(event: &ConsoleEvent) -> Option<String> {
    Some(match event {
        ConsoleEvent::Loaded { instances, .. } => format!("loaded {} instance(s)", instances.len()),
        ConsoleEvent::InstanceCreated { instance } => {
            format!("{} created ({})", instance.id, instance.status)
        }
        ConsoleEvent::StatusChanged { id, status } => format!("{} -> {}", id, status),
        ConsoleEvent::Started { id, url, .. } => format!("{} running at {}", id, url),
        ConsoleEvent::Stopped { id } => format!("{} stopped", id),
        ConsoleEvent::Edited { id, .. } => format!("{} edited", id),
        ConsoleEvent::DescriptionUpdated { id, .. } => format!("{} description updated", id),
        ConsoleEvent::TagSet { id, tag } => format!("{} tagged {}", id, tag),
        ConsoleEvent::TagRemoved { id, key } => format!("{} untagged {}", id, key),
        ConsoleEvent::InstanceDeleted { id } => format!("{} deleted", id),
        ConsoleEvent::Logged { .. } | ConsoleEvent::Tick { .. } => return None,
    })
}

/// Run the demo command
pub async fn run_demo(setup: &Setup) -> Result<(), String> {
    let center = Arc::new(NotificationCenter::new());
    let manager = setup
        .manager_with_latency(center.clone(), Latency::uniform(DEMO_LATENCY_MS))
        .await?;
    let events = manager.subscribe();
    let mut w = Walkthrough {
        manager,
        center,
        events,
    };

    println!("Source: {}", setup.source_label());
    println!("Backend: {} ({}ms per operation)", w.manager.backend_name(), DEMO_LATENCY_MS);

    // Start
    if let Some(id) = w
        .first_with(&[InstanceStatus::Stopped, InstanceStatus::Failed])
        .await
    {
        w.step(&format!("start {}", id));
        w.manager.start(&id).await.map_err(|e| e.to_string())?;
        w.toast("start", &id);
        if let Err(e) = w.manager.start(&id).await {
            println!("  second start rejected: {}", e);
        }
        w.manager.settle().await;
        w.toast("start", &id);
        println!("  status: {}", w.status(&id).await);
        w.drain_events();
    }

    // Create
    w.step("create demo-notebook");
    let mut req = CreateRequest::new("demo-notebook", "CPU: 2 vCPUs 8GB", "python-3.11");
    req.ssh_enabled = true;
    req.auto_stop_hours = Some(2);
    let created = w.manager.create(req).await.map_err(|e| e.to_string())?;
    println!("  new id: {} status: {}", created, w.status(&created).await);
    w.toast("create", &created);
    w.manager.settle().await;
    w.toast("create", &created);
    println!("  status: {}", w.status(&created).await);
    w.drain_events();

    // Edit while running
    w.step(&format!("edit {} while running", created));
    let patch = EditRequest {
        image: Some("python-3.12".into()),
        ..Default::default()
    };
    match w.manager.edit(&created, patch).await {
        Ok(()) => println!("  edit applied"),
        Err(e) => println!("  rejected: {}", e),
    }

    // Connect
    w.step(&format!("connect {}", created));
    for kind in ConnectKind::ALL {
        match w.manager.connect(&created, kind).await {
            Ok(target) => println!("  {:<8} {}", kind.label(), target.as_str()),
            Err(e) => println!("  {:<8} {}", kind.label(), e),
        }
    }

    // Stop
    w.step(&format!("stop {}", created));
    if let Err(e) = w.manager.stop(&created, false).await {
        println!("  without confirmation: {}", e);
    }
    w.manager.stop(&created, true).await.map_err(|e| e.to_string())?;
    w.toast("stop", &created);
    w.manager.settle().await;
    w.toast("stop", &created);
    println!("  status: {}", w.status(&created).await);
    w.drain_events();

    // Delete
    w.step(&format!("delete {}", created));
    w.manager.delete(&created).await.map_err(|e| e.to_string())?;
    w.toast("delete", &created);
    println!("  status: {}", w.status(&created).await);
    w.drain_events();

    // Dispose with a start in flight
    if let Some(id) = w
        .first_with(&[InstanceStatus::Stopped, InstanceStatus::Failed])
        .await
    {
        w.step(&format!("dispose while {} is starting", id));
        w.manager.start(&id).await.map_err(|e| e.to_string())?;
        println!("  pending completions: {}", w.manager.pending());
        w.manager.dispose();
        w.manager.settle().await;
        println!("  status after dispose: {}", w.status(&id).await);
        if let Err(e) = w.manager.start(&id).await {
            println!("  further operations: {}", e);
        }
        w.drain_events();
    }

    println!("\n{} toast key(s) recorded", w.center.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use notebook_core::model::Tag;

    #[test]
    fn test_describe_skips_noise() {
        assert!(describe(&ConsoleEvent::Tick {
            elapsed: std::time::Duration::from_secs(1)
        })
        .is_none());
        assert_eq!(
            describe(&ConsoleEvent::TagSet {
                id: "NB-1".into(),
                tag: Tag::new("team", "cv"),
            })
            .as_deref(),
            Some("NB-1 tagged team=cv")
        );
    }
}
