//! Instance lifecycle manager
//!
//! Owns the console state and is the only thing that mutates it. Every
//! operation follows the same shape:
//!
//! 1. take the state write lock
//! 2. ask [`lifecycle::next_state`] whether the action is allowed
//! 3. apply the immediate effect as reducer events
//! 4. notify, and for start/stop/create spawn the backend call into the
//!    task scope; its completion is re-validated before it is applied
//!
//! Checking and applying under one lock means a second start issued before
//! the first completes sees `Starting` and is rejected.
//!
//! Each start/stop/create takes a fresh operation number for its instance.
//! A completion only lands while its number is still the current one, so a
//! create that was overtaken by `mark_failed` and a new start cannot finish
//! that start early.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{RwLock, RwLockReadGuard, broadcast};
use tracing::{debug, info, warn};

use crate::backend::{Backend, BackendError, Endpoints};
use crate::error::OperationError;
use crate::filter::QueryFilter;
use crate::form::{self, CreateRequest, EditRequest};
use crate::lifecycle::{self, Action, CREATED_STATUS};
use crate::link::ConnectTarget;
use crate::model::{ConnectKind, Instance, InstanceId, InstanceStatus, Tag};
use crate::notify::{Level, Notifier, op_key};
use crate::reducer::{ConsoleEvent, EventEnvelope, reduce};
use crate::source::{InstanceSource, SourceError};
use crate::state::{ConsoleState, EventLevel, InstanceEvent};
use crate::tasks::{CancelToken, TaskScope};

const EVENT_CHANNEL_CAP: usize = 1_000;

/// State and ports shared with in-flight completions
struct Shared {
    state: RwLock<ConsoleState>,
    notifier: Arc<dyn Notifier>,
    event_tx: broadcast::Sender<EventEnvelope>,
    next_event_id: AtomicU64,
    /// Current in-flight operation per instance. Only touched with the state
    /// write lock held.
    ops: Mutex<BTreeMap<InstanceId, (u64, Pending)>>,
    next_op: AtomicU64,
}

impl Shared {
    fn emit(&self, state: &mut ConsoleState, event: ConsoleEvent) {
        let env = EventEnvelope {
            id: self.next_event_id.fetch_add(1, Ordering::SeqCst),
            at: Utc::now(),
            event,
        };
        reduce(state, &env);
        // No subscribers is fine
        let _ = self.event_tx.send(env);
    }

    fn log(&self, state: &mut ConsoleState, id: &str, level: EventLevel, message: String) {
        self.emit(state, ConsoleEvent::Logged {
            id: id.to_string(),
            level,
            message,
        });
    }

    fn notify(&self, key: &str, level: Level, text: &str) {
        self.notifier.notify(key, level, text);
    }

    fn ops(&self) -> MutexGuard<'_, BTreeMap<InstanceId, (u64, Pending)>> {
        self.ops.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Supersede whatever was in flight for `id`.
    fn begin_op(&self, id: &str, pending: Pending) -> u64 {
        let seq = self.next_op.fetch_add(1, Ordering::SeqCst);
        self.ops().insert(id.to_string(), (seq, pending));
        seq
    }

    /// Forget the in-flight operation for `id`, returning what it was.
    fn end_op(&self, id: &str) -> Option<Pending> {
        self.ops().remove(id).map(|(_, pending)| pending)
    }

    fn is_current(&self, id: &str, seq: u64) -> bool {
        self.ops().get(id).is_some_and(|(current, _)| *current == seq)
    }
}

#[derive(Clone, Copy, Debug)]
enum Pending {
    Start,
    Stop,
    Create,
}

impl Pending {
    fn op(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Create => "create",
        }
    }

    fn completion(&self) -> Action {
        match self {
            Self::Start | Self::Create => Action::CompleteStart,
            Self::Stop => Action::CompleteStop,
        }
    }
}

pub struct LifecycleManager {
    shared: Arc<Shared>,
    backend: Arc<dyn Backend>,
    scope: TaskScope,
    disposed: AtomicBool,
    user: String,
}

impl LifecycleManager {
    pub fn new(backend: Arc<dyn Backend>, notifier: Arc<dyn Notifier>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAP);
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(ConsoleState::new()),
                notifier,
                event_tx,
                next_event_id: AtomicU64::new(1),
                ops: Mutex::new(BTreeMap::new()),
                next_op: AtomicU64::new(1),
            }),
            backend,
            scope: TaskScope::new(),
            disposed: AtomicBool::new(false),
            user: "console".to_string(),
        }
    }

    /// Name recorded as `creator` on instances created through this manager.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Replace the listing with whatever `source` returns.
    pub async fn load(&self, source: &dyn InstanceSource) -> Result<usize, SourceError> {
        let fixtures = source.fetch().await?;
        fixtures.check()?;
        let count = fixtures.instances.len();

        let mut state = self.shared.state.write().await;
        self.shared.emit(&mut state, ConsoleEvent::Loaded {
            instances: fixtures.instances,
            projects: fixtures.projects,
            datasets: fixtures.datasets,
        });
        info!(source = source.name(), instances = count, "listing loaded");
        Ok(count)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.shared.event_tx.subscribe()
    }

    /// Read access for rendering. Do not hold across awaits on this manager.
    pub async fn read(&self) -> RwLockReadGuard<'_, ConsoleState> {
        self.shared.state.read().await
    }

    pub async fn instances(&self) -> Vec<Instance> {
        self.shared.state.read().await.instances.clone()
    }

    pub async fn instance(&self, id: &str) -> Option<Instance> {
        self.shared.state.read().await.get(id).cloned()
    }

    pub async fn events(&self, id: &str) -> Vec<InstanceEvent> {
        self.shared.state.read().await.events.get(id).cloned().collect()
    }

    pub async fn filtered(&self, filter: &QueryFilter) -> Vec<Instance> {
        let state = self.shared.state.read().await;
        filter.apply(&state.instances).into_iter().cloned().collect()
    }

    // ---------- lifecycle actions ----------

    /// Start a stopped or failed instance.
    pub async fn start(&self, id: &str) -> Result<(), OperationError> {
        self.ensure_live()?;
        let (snapshot, seq) = {
            let mut state = self.shared.state.write().await;
            let inst = lookup(&state, id)?;
            check(inst, Action::Start)?;
            let snapshot = inst.clone();
            self.shared.emit(&mut state, ConsoleEvent::StatusChanged {
                id: id.to_string(),
                status: InstanceStatus::Starting,
            });
            self.shared
                .log(&mut state, id, EventLevel::Info, "start requested".into());
            (snapshot, self.shared.begin_op(id, Pending::Start))
        };

        info!(%id, "starting instance");
        self.shared.notify(
            &op_key("start", id),
            Level::Loading,
            &format!("Starting {}...", snapshot.name),
        );
        self.spawn_completion(Pending::Start, seq, snapshot);
        Ok(())
    }

    /// Stop a running instance. Unconfirmed requests are rejected untouched.
    pub async fn stop(&self, id: &str, confirmed: bool) -> Result<(), OperationError> {
        self.ensure_live()?;
        let (snapshot, seq) = {
            let mut state = self.shared.state.write().await;
            let inst = lookup(&state, id)?;
            check(inst, Action::Stop { confirmed })?;
            let snapshot = inst.clone();
            self.shared.emit(&mut state, ConsoleEvent::StatusChanged {
                id: id.to_string(),
                status: InstanceStatus::Stopping,
            });
            self.shared
                .log(&mut state, id, EventLevel::Info, "stop requested".into());
            (snapshot, self.shared.begin_op(id, Pending::Stop))
        };

        info!(%id, "stopping instance");
        self.shared.notify(
            &op_key("stop", id),
            Level::Loading,
            &format!("Stopping {}...", snapshot.name),
        );
        self.spawn_completion(Pending::Stop, seq, snapshot);
        Ok(())
    }

    /// Remove an instance in any status. Pending completions for it become
    /// no-ops.
    pub async fn delete(&self, id: &str) -> Result<Instance, OperationError> {
        self.ensure_live()?;
        let (removed, interrupted) = {
            let mut state = self.shared.state.write().await;
            let inst = lookup(&state, id)?;
            check(inst, Action::Delete)?;
            let removed = inst.clone();
            self.shared.emit(&mut state, ConsoleEvent::InstanceDeleted { id: id.to_string() });
            (removed, self.shared.end_op(id))
        };

        info!(%id, "instance deleted");
        if let Some(pending) = interrupted {
            self.shared.notify(
                &op_key(pending.op(), id),
                Level::Info,
                &format!("{} of {} cancelled", pending.op(), removed.name),
            );
        }
        self.shared.notify(
            &op_key("delete", id),
            Level::Success,
            &format!("Deleted {}", removed.name),
        );
        Ok(removed)
    }

    /// Validate the form, prepend a new instance in `Starting` and provision it.
    pub async fn create(&self, req: CreateRequest) -> Result<InstanceId, OperationError> {
        self.ensure_live()?;
        req.validate()?;

        let (instance, seq) = {
            let mut state = self.shared.state.write().await;
            let id = fresh_id(&state);
            let instance = Instance {
                id: id.clone(),
                name: req.name,
                description: req.description,
                status: CREATED_STATUS,
                spec: req.spec,
                image: req.image,
                runtime: None,
                ssh_enabled: req.ssh_enabled,
                auto_stop_hours: req.auto_stop_hours,
                url: None,
                ssh_command: None,
                created_at: Utc::now(),
                creator: self.user.clone(),
                project: req.project,
                tags: req.tags,
                storage: req.storage,
            };
            self.shared.emit(&mut state, ConsoleEvent::InstanceCreated {
                instance: instance.clone(),
            });
            self.shared
                .log(&mut state, &id, EventLevel::Info, "instance created".into());
            let seq = self.shared.begin_op(&id, Pending::Create);
            (instance, seq)
        };

        info!(id = %instance.id, name = %instance.name, "creating instance");
        self.shared.notify(
            &op_key("create", &instance.id),
            Level::Loading,
            &format!("Creating {}...", instance.name),
        );
        let id = instance.id.clone();
        self.spawn_completion(Pending::Create, seq, instance);
        Ok(id)
    }

    /// Edit configuration fields. Only allowed while stopped.
    pub async fn edit(&self, id: &str, patch: EditRequest) -> Result<(), OperationError> {
        self.ensure_live()?;
        patch.validate()?;

        let mut state = self.shared.state.write().await;
        let inst = lookup(&state, id)?;
        check(inst, Action::Edit)?;
        if patch.is_empty() {
            return Ok(());
        }
        let name = patch.name.clone().unwrap_or_else(|| inst.name.clone());
        self.shared.emit(&mut state, ConsoleEvent::Edited {
            id: id.to_string(),
            patch,
        });
        self.shared
            .log(&mut state, id, EventLevel::Info, "configuration updated".into());
        drop(state);

        self.shared
            .notify(&op_key("edit", id), Level::Success, &format!("Updated {}", name));
        Ok(())
    }

    pub async fn update_description(&self, id: &str, description: &str) -> Result<(), OperationError> {
        self.ensure_live()?;
        form::validate_description(description)?;

        let mut state = self.shared.state.write().await;
        let inst = lookup(&state, id)?;
        check(inst, Action::UpdateDescription)?;
        self.shared.emit(&mut state, ConsoleEvent::DescriptionUpdated {
            id: id.to_string(),
            description: description.to_string(),
        });
        drop(state);

        self.shared
            .notify(&op_key("edit", id), Level::Success, "Description updated");
        Ok(())
    }

    pub async fn set_tag(&self, id: &str, tag: Tag) -> Result<(), OperationError> {
        self.ensure_live()?;
        if tag.key.trim().is_empty() {
            return Err(OperationError::validation("tag key", "is required"));
        }

        let mut state = self.shared.state.write().await;
        let inst = lookup(&state, id)?;
        check(inst, Action::Retag)?;
        self.shared.emit(&mut state, ConsoleEvent::TagSet {
            id: id.to_string(),
            tag,
        });
        Ok(())
    }

    /// Returns whether a tag with `key` existed.
    pub async fn remove_tag(&self, id: &str, key: &str) -> Result<bool, OperationError> {
        self.ensure_live()?;

        let mut state = self.shared.state.write().await;
        let inst = lookup(&state, id)?;
        check(inst, Action::Retag)?;
        if inst.tag(key).is_none() {
            return Ok(false);
        }
        self.shared.emit(&mut state, ConsoleEvent::TagRemoved {
            id: id.to_string(),
            key: key.to_string(),
        });
        Ok(true)
    }

    /// Resolve where to send the user for `kind`. Launching the session is up
    /// to the caller.
    pub async fn connect(&self, id: &str, kind: ConnectKind) -> Result<ConnectTarget, OperationError> {
        self.ensure_live()?;
        let state = self.shared.state.read().await;
        let inst = lookup(&state, id)?;
        check(inst, Action::Connect(kind))?;
        ConnectTarget::resolve(inst, kind).ok_or_else(|| {
            OperationError::validation(
                "connect",
                format!("{} access is not enabled for {}", kind.label(), inst.name),
            )
        })
    }

    /// External failure signal. Nothing inside the console produces this on
    /// its own; it exists for operators and backends that report failures.
    pub async fn mark_failed(&self, id: &str, reason: &str) -> Result<(), OperationError> {
        self.ensure_live()?;
        let mut state = self.shared.state.write().await;
        let inst = lookup(&state, id)?;
        check(inst, Action::Fail)?;
        let name = inst.name.clone();
        self.shared.emit(&mut state, ConsoleEvent::StatusChanged {
            id: id.to_string(),
            status: InstanceStatus::Failed,
        });
        self.shared
            .log(&mut state, id, EventLevel::Error, reason.to_string());
        let interrupted = self.shared.end_op(id);
        drop(state);

        warn!(%id, %reason, "instance marked failed");
        if let Some(pending) = interrupted {
            self.shared.notify(
                &op_key(pending.op(), id),
                Level::Error,
                &format!("Failed to {} {}: {}", pending.op(), name, reason),
            );
        }
        self.shared.notify(
            &op_key("status", id),
            Level::Error,
            &format!("{} failed: {}", name, reason),
        );
        Ok(())
    }

    /// Advance runtime of running instances.
    pub async fn tick(&self, elapsed: Duration) {
        if self.is_disposed() {
            return;
        }
        let mut state = self.shared.state.write().await;
        self.shared.emit(&mut state, ConsoleEvent::Tick { elapsed });
    }

    // ---------- scope ----------

    /// Completions still in flight.
    pub fn pending(&self) -> usize {
        self.scope.pending()
    }

    /// Wait for every in-flight completion to land.
    pub async fn settle(&self) {
        self.scope.join_all().await;
    }

    /// Tear down: cancel in-flight completions and refuse further operations.
    pub fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            debug!(pending = self.scope.pending(), "disposing lifecycle manager");
            self.scope.cancel();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn ensure_live(&self) -> Result<(), OperationError> {
        if self.is_disposed() {
            Err(OperationError::Disposed)
        } else {
            Ok(())
        }
    }

    fn spawn_completion(&self, pending: Pending, seq: u64, instance: Instance) {
        let shared = self.shared.clone();
        let backend = self.backend.clone();
        let token = self.scope.token();
        let id = instance.id.clone();

        let spawned = self.scope.spawn(async move {
            let outcome = match pending {
                Pending::Start => backend.start(&instance).await.map(Some),
                Pending::Create => backend.provision(&instance).await.map(Some),
                Pending::Stop => backend.stop(&instance).await.map(|_| None),
            };
            complete(&shared, &token, pending, seq, &instance, outcome).await;
        });
        if !spawned {
            debug!(%id, op = pending.op(), "scope cancelled, completion dropped");
        }
    }
}

impl Drop for LifecycleManager {
    fn drop(&mut self) {
        self.dispose();
    }
}

async fn complete(
    shared: &Shared,
    token: &CancelToken,
    pending: Pending,
    seq: u64,
    instance: &Instance,
    outcome: Result<Option<Endpoints>, BackendError>,
) {
    let id = instance.id.as_str();
    let key = op_key(pending.op(), id);

    let mut state = shared.state.write().await;
    if token.is_cancelled() {
        debug!(%id, op = pending.op(), "completion after dispose ignored");
        return;
    }
    let Some(current) = state.get(id).map(|i| i.status) else {
        debug!(%id, op = pending.op(), "instance gone, completion ignored");
        return;
    };
    if !shared.is_current(id, seq) {
        shared.log(
            &mut state,
            id,
            EventLevel::Warning,
            format!("{} result arrived after the instance moved on; ignored", pending.op()),
        );
        debug!(%id, op = pending.op(), "superseded completion dropped");
        return;
    }
    shared.end_op(id);

    match outcome {
        Ok(endpoints) => {
            if let Err(reason) = lifecycle::next_state(current, pending.completion()) {
                debug!(%id, %reason, "stale completion ignored");
                return;
            }
            let text = match (pending, endpoints) {
                (Pending::Stop, _) => {
                    shared.emit(&mut state, ConsoleEvent::Stopped { id: id.to_string() });
                    format!("{} stopped", instance.name)
                }
                (_, Some(ep)) => {
                    shared.emit(&mut state, ConsoleEvent::Started {
                        id: id.to_string(),
                        url: ep.url,
                        ssh_command: ep.ssh_command,
                    });
                    format!("{} is running", instance.name)
                }
                (_, None) => {
                    warn!(%id, "backend returned no endpoints for a start");
                    return;
                }
            };
            shared.log(&mut state, id, EventLevel::Info, text.clone());
            drop(state);

            info!(%id, op = pending.op(), "operation completed");
            shared.notify(&key, Level::Success, &text);
        }
        Err(err) => {
            if lifecycle::next_state(current, Action::Fail).is_err() {
                return;
            }
            shared.emit(&mut state, ConsoleEvent::StatusChanged {
                id: id.to_string(),
                status: InstanceStatus::Failed,
            });
            shared.log(&mut state, id, EventLevel::Error, err.to_string());
            drop(state);

            warn!(%id, op = pending.op(), error = %err, "backend operation failed");
            shared.notify(
                &key,
                Level::Error,
                &format!("Failed to {} {}: {}", pending.op(), instance.name, err),
            );
        }
    }
}

fn lookup<'a>(state: &'a ConsoleState, id: &str) -> Result<&'a Instance, OperationError> {
    state.get(id).ok_or_else(|| OperationError::NotFound { id: id.to_string() })
}

fn check(inst: &Instance, action: Action) -> Result<(), OperationError> {
    lifecycle::next_state(inst.status, action)
        .map(|_| ())
        .map_err(|reason| OperationError::Rejected {
            id: inst.id.clone(),
            reason,
        })
}

/// `NB-<yyyymmdd>-<8 hex>`, retried until it collides with nothing.
fn fresh_id(state: &ConsoleState) -> InstanceId {
    let day = Utc::now().format("%Y%m%d");
    loop {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let id = format!("NB-{}-{}", day, &suffix[..8]);
        if !state.contains(&id) {
            return id;
        }
    }
}
