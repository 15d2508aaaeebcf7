//! Keyed notifications
//!
//! Lifecycle operations report progress through the [`Notifier`] port. A
//! notification is keyed by a logical operation id, so the "done" message for
//! an operation replaces its "in progress" message.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Info,
    Loading,
    Success,
    Error,
}

impl Level {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Loading => "loading",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Notification {
    pub key: String,
    pub level: Level,
    pub text: String,
    pub at: DateTime<Utc>,
    /// Bumped on every write; orders notifications newest-first
    pub seq: u64,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, key: &str, level: Level, text: &str);
}

/// Logical operation key, e.g. `start:NB-2024...`
pub fn op_key(operation: &str, id: &str) -> String {
    format!("{operation}:{id}")
}

#[derive(Default)]
struct Inner {
    by_key: BTreeMap<String, Notification>,
    seq: u64,
}

/// In-memory toast bus. Writing a key overwrites whatever that key held.
#[derive(Default)]
pub struct NotificationCenter {
    inner: Mutex<Inner>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Notification> {
        self.lock().by_key.get(key).cloned()
    }

    pub fn latest(&self) -> Option<Notification> {
        self.lock().by_key.values().max_by_key(|n| n.seq).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned toast bus still holds usable data.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Notifier for NotificationCenter {
    fn notify(&self, key: &str, level: Level, text: &str) {
        let mut inner = self.lock();
        inner.seq += 1;
        let seq = inner.seq;
        inner.by_key.insert(
            key.to_string(),
            Notification {
                key: key.to_string(),
                level,
                text: text.to_string(),
                at: Utc::now(),
                seq,
            },
        );
    }
}

/// Forwards notifications to `tracing`; used by the non-interactive CLI.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, key: &str, level: Level, text: &str) {
        match level {
            Level::Error => tracing::error!(%key, "{text}"),
            Level::Loading => tracing::debug!(%key, "{text}"),
            Level::Info | Level::Success => tracing::info!(%key, "{text}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_key_replaces_message() {
        let center = NotificationCenter::new();
        center.notify("start:a", Level::Loading, "starting a");
        center.notify("start:b", Level::Loading, "starting b");
        center.notify("start:a", Level::Success, "a started");

        assert_eq!(center.len(), 2);
        let a = center.get("start:a").unwrap();
        assert_eq!(a.level, Level::Success);
        assert_eq!(a.text, "a started");
        assert_eq!(center.latest().unwrap().key, "start:a");
    }

    #[test]
    fn test_latest_follows_last_write() {
        let center = NotificationCenter::new();
        assert!(center.is_empty());
        center.notify("x", Level::Info, "1");
        center.notify("y", Level::Info, "2");
        assert_eq!(center.latest().unwrap().key, "y");

        // Rewriting an older key brings it back to the front
        center.notify("x", Level::Success, "3");
        assert_eq!(center.latest().unwrap().key, "x");
        assert_eq!(center.len(), 2);
    }

    #[test]
    fn test_op_key() {
        assert_eq!(op_key("stop", "NB-1"), "stop:NB-1");
    }
}
