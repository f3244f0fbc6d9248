//! # Reconcile
//!
//! Converges Linux groups, users and memberships to the desired state and
//! learns OS-assigned IDs back into the store.
//!
//! A run makes three ordered passes:
//!
//! 1. **Groups**: create missing groups, then record the GID of every group
//!    whose desired GID is still unset.
//! 2. **Users**: create missing users, then record UID/GID where the store
//!    has none (or all of them for a user created in this run).
//! 3. **Memberships**: add users to their supplementary groups, creating a
//!    group first if it vanished from the host.
//!
//! IDs already in the store are never overwritten from what the OS reports.
//! The first failing step aborts the run; steps already taken stay applied
//! and a later run picks up where this one stopped.
//!
//! ## Example
//!
//! ```no_run
//! use desired::Store;
//! use sambakit::Host;
//! use std::path::Path;
//!
//! let store = Store::open(Path::new("/data/app.db")).unwrap();
//! let report = reconcile::apply(&Host::new(), &store).unwrap();
//! for line in report.descriptions() {
//!     println!("{line}");
//! }
//! ```

pub mod action;
pub mod error;

pub use action::{Action, Report};
pub use error::{Error, Result};

use desired::{DesiredGroup, DesiredMembership, DesiredState, DesiredUser};
use error::Context;
use sambakit::Host;

/// Bring the host in line with the desired state.
pub fn apply<S: DesiredState + ?Sized>(host: &Host, store: &S) -> Result<Report> {
    let groups = store
        .list_groups()
        .map_err(|source| Error::Load { what: "groups", source })?;
    let users = store
        .list_users()
        .map_err(|source| Error::Load { what: "users", source })?;
    let memberships = store
        .list_memberships()
        .map_err(|source| Error::Load {
            what: "memberships",
            source,
        })?;

    let mut run = Run {
        host,
        store,
        report: Report::default(),
    };

    log::debug!("checking {} groups", groups.len());
    for group in &groups {
        run.ensure_group(group)?;
    }

    log::debug!("checking {} users", users.len());
    for user in &users {
        run.ensure_user(user)?;
    }

    log::debug!("checking {} memberships", memberships.len());
    for membership in &memberships {
        run.ensure_membership(membership)?;
    }

    if run.report.is_empty() {
        log::info!("already in sync");
    }
    Ok(run.report)
}

struct Run<'a, S: ?Sized> {
    host: &'a Host,
    store: &'a S,
    report: Report,
}

impl<S: DesiredState + ?Sized> Run<'_, S> {
    fn ensure_group(&mut self, group: &DesiredGroup) -> Result<()> {
        let name = &group.name;

        if !self.host.group_exists(name).context("check group", name)? {
            self.host
                .create_group(name, group.gid)
                .context("create group", name)?;
            self.report.record(Action::CreateGroup { name: name.clone() });
        }

        if group.gid.is_some() {
            return Ok(());
        }

        if let Some(gid) = self.host.group_gid(name).context("read gid for group", name)? {
            self.store
                .update_group_gid(name, gid)
                .context("persist gid for group", name)?;
            self.report.record(Action::LearnGroupGid {
                name: name.clone(),
                gid,
            });
        }
        Ok(())
    }

    fn ensure_user(&mut self, user: &DesiredUser) -> Result<()> {
        let name = &user.name;

        let created = !self.host.user_exists(name).context("check user", name)?;
        if created {
            self.host
                .create_user(name, user.uid, user.gid)
                .context("create user", name)?;
            self.report.record(Action::CreateUser { name: name.clone() });
        }

        if !created && user.uid.is_some() && user.gid.is_some() {
            return Ok(());
        }

        let observed = self
            .host
            .user_ids(name)
            .context("read uid/gid for user", name)?;

        // A user created in this run reports exactly what the OS assigned;
        // otherwise only the missing fields are filled in.
        let (uid, gid) = if created {
            (observed.uid, observed.gid)
        } else {
            (
                user.uid.unwrap_or(observed.uid),
                user.gid.unwrap_or(observed.gid),
            )
        };

        self.store
            .update_user_ids(name, uid, gid)
            .context("persist uid/gid for user", name)?;
        self.report.record(Action::LearnUserIds {
            name: name.clone(),
            uid,
            gid,
        });
        Ok(())
    }

    fn ensure_membership(&mut self, membership: &DesiredMembership) -> Result<()> {
        let DesiredMembership { user, group } = membership;
        let entity = || format!("{user} in {group}");

        if self
            .host
            .is_user_in_group(user, group)
            .context("check membership", entity())?
        {
            return Ok(());
        }

        // The learned GID is not written back here, unlike the group pass.
        if !self
            .host
            .group_exists(group)
            .context("check group", group.as_str())?
        {
            self.host
                .create_group(group, None)
                .context("create missing group for membership", group.as_str())?;
            self.report.record(Action::CreateGroup {
                name: group.clone(),
            });
        }

        self.host
            .add_user_to_group(user, group)
            .context("add", format!("{user} to {group}"))?;
        self.report.record(Action::AddMembership {
            user: user.clone(),
            group: group.clone(),
        });
        Ok(())
    }
}
