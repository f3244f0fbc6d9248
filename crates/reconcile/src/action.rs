//! Actions taken during a reconcile run.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single change made to the host or the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// A group was created on the host
    CreateGroup { name: String },
    /// The OS-assigned GID of a group was recorded
    LearnGroupGid { name: String, gid: u32 },
    /// A user was created on the host
    CreateUser { name: String },
    /// UID and primary GID of a user were recorded
    LearnUserIds { name: String, uid: u32, gid: u32 },
    /// A user was added to a supplementary group
    AddMembership { user: String, group: String },
}

impl Action {
    /// Whether the action changed the host (as opposed to the store).
    pub fn is_host_change(&self) -> bool {
        !matches!(self, Self::LearnGroupGid { .. } | Self::LearnUserIds { .. })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateGroup { name } => write!(f, "groupadd {name}"),
            Self::LearnGroupGid { name, gid } => write!(f, "db: set group {name} gid={gid}"),
            Self::CreateUser { name } => write!(f, "useradd {name}"),
            Self::LearnUserIds { name, uid, gid } => {
                write!(f, "db: set user {name} uid={uid} gid={gid}")
            }
            Self::AddMembership { user, group } => write!(f, "usermod -aG {group} {user}"),
        }
    }
}

/// Ordered record of what a reconcile run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub actions: Vec<Action>,
}

impl Report {
    /// True when the host and store were already in sync.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Number of actions that changed the host; the rest were store writes.
    pub fn host_changes(&self) -> usize {
        self.actions.iter().filter(|a| a.is_host_change()).count()
    }

    /// Human-readable description of every action, in order.
    pub fn descriptions(&self) -> Vec<String> {
        self.actions.iter().map(ToString::to_string).collect()
    }

    pub(crate) fn record(&mut self, action: Action) {
        log::info!("{action}");
        self.actions.push(action);
    }
}
