//! Instance lifecycle transitions
//!
//! Every status change goes through [`next_state`]. The manager consults it
//! before applying any effect, and the UI uses [`available_actions`] to decide
//! which controls to offer, so both agree on one table.

use thiserror::Error;

use crate::model::{ConnectKind, InstanceStatus};

/// Status a freshly created instance starts in.
pub const CREATED_STATUS: InstanceStatus = InstanceStatus::Starting;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// User asks to start a stopped or failed instance
    Start,
    /// User asks to stop a running instance; requires explicit confirmation
    Stop { confirmed: bool },
    Delete,
    /// Edit name/spec/image/ssh/auto-stop fields
    Edit,
    UpdateDescription,
    /// Add or remove a tag
    Retag,
    Connect(ConnectKind),
    /// Backend reported that a start or create finished
    CompleteStart,
    /// Backend reported that a stop finished
    CompleteStop,
    /// External failure signal (backend error or operator injection)
    Fail,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop { .. } => "stop",
            Self::Delete => "delete",
            Self::Edit => "edit",
            Self::UpdateDescription => "update description",
            Self::Retag => "retag",
            Self::Connect(_) => "connect",
            Self::CompleteStart => "complete start",
            Self::CompleteStop => "complete stop",
            Self::Fail => "fail",
        }
    }
}

/// Outcome of an accepted action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Status moves to the given value
    To(InstanceStatus),
    /// Action is allowed but leaves status as it is
    Unchanged,
    /// Instance leaves the collection
    Remove,
}

impl Transition {
    /// Status after applying this transition to `current`, or `None` if removed.
    pub fn apply(self, current: InstanceStatus) -> Option<InstanceStatus> {
        match self {
            Self::To(next) => Some(next),
            Self::Unchanged => Some(current),
            Self::Remove => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Rejected {
    #[error("cannot {action} while {status}")]
    NotAllowed {
        action: &'static str,
        status: InstanceStatus,
    },
    #[error("stopping an instance must be confirmed")]
    ConfirmationRequired,
}

/// The lifecycle table.
///
/// | action            | allowed from        | result    |
/// |-------------------|---------------------|-----------|
/// | Start             | Stopped, Failed     | Starting  |
/// | Stop (confirmed)  | Running             | Stopping  |
/// | Delete            | any                 | removed   |
/// | Edit              | Stopped             | unchanged |
/// | UpdateDescription | any                 | unchanged |
/// | Retag             | any                 | unchanged |
/// | Connect           | Running             | unchanged |
/// | CompleteStart     | Starting            | Running   |
/// | CompleteStop      | Stopping            | Stopped   |
/// | Fail              | any but Failed      | Failed    |
pub fn next_state(current: InstanceStatus, action: Action) -> Result<Transition, Rejected> {
    use InstanceStatus::*;

    let reject = || Rejected::NotAllowed {
        action: action.label(),
        status: current,
    };

    match (action, current) {
        (Action::Start, Stopped | Failed) => Ok(Transition::To(Starting)),
        (Action::Stop { confirmed: false }, Running) => Err(Rejected::ConfirmationRequired),
        (Action::Stop { confirmed: true }, Running) => Ok(Transition::To(Stopping)),
        (Action::Delete, _) => Ok(Transition::Remove),
        (Action::Edit, Stopped) => Ok(Transition::Unchanged),
        (Action::UpdateDescription | Action::Retag, _) => Ok(Transition::Unchanged),
        (Action::Connect(_), Running) => Ok(Transition::Unchanged),
        (Action::CompleteStart, Starting) => Ok(Transition::To(Running)),
        (Action::CompleteStop, Stopping) => Ok(Transition::To(Stopped)),
        (Action::Fail, Failed) => Err(reject()),
        (Action::Fail, _) => Ok(Transition::To(Failed)),
        _ => Err(reject()),
    }
}

/// User-facing actions the console offers for an instance in `status`.
pub fn available_actions(status: InstanceStatus) -> Vec<Action> {
    let mut candidates = vec![
        Action::Start,
        Action::Stop { confirmed: true },
        Action::Edit,
    ];
    candidates.extend(ConnectKind::ALL.map(Action::Connect));
    candidates.extend([Action::UpdateDescription, Action::Retag, Action::Delete]);

    candidates
        .into_iter()
        .filter(|a| next_state(status, *a).is_ok())
        .collect()
}

pub fn can(status: InstanceStatus, action: Action) -> bool {
    next_state(status, action).is_ok()
}
