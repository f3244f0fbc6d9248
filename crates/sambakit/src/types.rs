//! Core types for identity and share administration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// UID and primary GID of a Linux user, as reported by `getent passwd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIds {
    /// User ID
    pub uid: u32,
    /// Primary group ID
    pub gid: u32,
}

/// A Linux group as listed by `getent group`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinuxGroup {
    /// Group name
    pub name: String,
    /// Group ID
    pub gid: u32,
    /// Supplementary members listed in the group database
    #[serde(default)]
    pub members: Vec<String>,
}

/// A regular (non-system) Linux user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinuxUser {
    /// Login name
    pub name: String,
    /// User ID
    pub uid: u32,
    /// All group IDs the user belongs to, sorted ascending
    #[serde(default)]
    pub gids: Vec<u32>,
}

/// State of a share block in the managed shares index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedShareState {
    /// Share name from the begin marker
    pub name: String,
    /// Whether the include line is commented out
    pub disabled: bool,
}

/// Options for writing a share snippet file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareOptions {
    /// Share (section) name
    pub name: String,
    /// Absolute directory exported by the share
    pub path: String,
    /// Rendered as `read only = yes|no`
    pub read_only: bool,
    /// Rendered as `browseable = yes|no`
    pub browseable: bool,
    /// Comma separated `valid users` list, e.g. `"vater, @eltern"`
    #[serde(default)]
    pub valid_users: String,
}

impl ShareOptions {
    /// Writable, browseable share open to every authenticated user.
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            read_only: false,
            browseable: true,
            valid_users: String::new(),
        }
    }

    /// Set whether the share is read-only.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Set whether the share shows up in browse lists.
    pub fn browseable(mut self, browseable: bool) -> Self {
        self.browseable = browseable;
        self
    }

    /// Restrict access to the given users and `@groups`.
    pub fn valid_users(mut self, valid_users: impl Into<String>) -> Self {
        self.valid_users = valid_users.into();
        self
    }
}

/// Result of a yes/no health probe with the reason when it failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Whether the check passed
    pub ok: bool,
    /// Why the check failed; empty when `ok`
    #[serde(default)]
    pub detail: String,
}

impl HealthCheck {
    /// A passing check.
    pub fn passed() -> Self {
        Self {
            ok: true,
            detail: String::new(),
        }
    }

    /// A failing check with the reason.
    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: detail.into(),
        }
    }
}

/// Flattened view of the effective Samba configuration.
///
/// Section names keep their case; keys are lowercased.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveConfig {
    /// Settings per section, including `global`
    pub sections: BTreeMap<String, BTreeMap<String, String>>,
    /// Unparsed `testparm -s` output
    #[serde(skip)]
    pub raw: String,
}

impl EffectiveConfig {
    /// Look up a section by name.
    pub fn section(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        self.sections.get(name)
    }

    /// Share sections, i.e. everything except `[global]`.
    pub fn shares(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, String>)> {
        self.sections
            .iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case("global"))
    }

    /// `read only` setting of a share, accepting the `readonly` synonym.
    pub fn read_only(&self, share: &str) -> Option<&str> {
        let section = self.section(share)?;
        section
            .get("read only")
            .or_else(|| section.get("readonly"))
            .map(String::as_str)
    }
}
