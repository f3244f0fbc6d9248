//! Desired-state records.

use serde::{Deserialize, Serialize};

/// A group that should exist on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredGroup {
    pub name: String,
    /// Pinned GID; `None` until chosen by the OS and learned back
    pub gid: Option<u32>,
}

impl DesiredGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            gid: None,
        }
    }

    pub fn with_gid(mut self, gid: u32) -> Self {
        self.gid = Some(gid);
        self
    }
}

/// A user that should exist on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredUser {
    pub name: String,
    pub uid: Option<u32>,
    /// Primary GID
    pub gid: Option<u32>,
}

impl DesiredUser {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uid: None,
            gid: None,
        }
    }

    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }

    pub fn with_gid(mut self, gid: u32) -> Self {
        self.gid = Some(gid);
        self
    }
}

/// A supplementary group membership that should exist on the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DesiredMembership {
    pub user: String,
    pub group: String,
}

impl DesiredMembership {
    pub fn new(user: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            group: group.into(),
        }
    }
}
