//! # sambakit
//!
//! Linux identity and Samba share administration for a single host.
//!
//! This crate provides functionality for:
//! - Inspecting and creating Linux users, groups and memberships
//! - Managing Samba accounts (`smbpasswd`, `pdbedit`)
//! - Checking and reloading the Samba service
//! - Parsing and editing the managed shares index
//! - Writing per-share configuration snippets
//!
//! ## Example
//!
//! ```no_run
//! use sambakit::Host;
//!
//! let host = Host::new();
//!
//! if !host.group_exists("eltern").unwrap() {
//!     host.create_group("eltern", None).unwrap();
//! }
//! let gid = host.group_gid("eltern").unwrap();
//! println!("eltern has gid {gid:?}");
//! ```
//!
//! ## Shares index
//!
//! Share blocks written by this crate are wrapped in marker comments so
//! they can be toggled and removed without touching hand-written sections.
//!
//! ```no_run
//! use sambakit::index;
//! use std::path::Path;
//!
//! let index_path = Path::new("/etc/samba/shares.d/ui/shares.conf");
//! let share_file = Path::new("/etc/samba/shares.d/ui/photos.conf");
//!
//! index::set_disabled(index_path, "photos", share_file, true).unwrap();
//! let states = index::parse_file(index_path).unwrap();
//! assert!(states["photos"].disabled);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod identity;
pub mod index;
pub mod runner;
pub mod samba;
pub mod service;
pub mod snippet;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod types;

pub use error::{Error, ErrorCategory, Result};
pub use runner::{CommandOutput, Runner};
pub use types::{
    EffectiveConfig, HealthCheck, LinuxGroup, LinuxUser, ManagedShareState, ShareOptions, UserIds,
};

use runner::system::SystemRunner;

/// Handle on the local system's identities and Samba service.
///
/// Every operation goes through the wrapped [`Runner`]; the host itself
/// holds no state.
pub struct Host {
    runner: Box<dyn Runner>,
}

impl Host {
    /// Create a host that runs real system commands.
    pub fn new() -> Self {
        Self {
            runner: Box::new(SystemRunner::new()),
        }
    }

    /// Create a host with a custom runner (useful for testing).
    pub fn with_runner(runner: Box<dyn Runner>) -> Self {
        Self { runner }
    }

    /// Check whether a program can be found on `PATH`.
    pub fn has_command(&self, program: &str) -> bool {
        self.runner
            .run(runner::PROBE_TIMEOUT, "which", &[program])
            .is_ok_and(|output| output.success())
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}
