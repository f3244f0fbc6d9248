use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use desired::{DesiredState, DesiredUser, Store};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::Context;
use crate::cli::UsersCommand;
use crate::ui;

pub fn run(ctx: &Context, cmd: UsersCommand) -> Result<()> {
    match cmd {
        UsersCommand::List { json } => list(ctx, json),
        UsersCommand::Add {
            name,
            uid,
            gid,
            groups,
            password,
            stdin,
            no_apply,
        } => add(ctx, &name, uid, gid, &groups, password, stdin, no_apply),
        UsersCommand::Passwd { name, stdin } => passwd(&name, stdin),
        UsersCommand::Enable { name } => {
            sambakit::Host::new()
                .enable_samba_user(&name)
                .with_context(|| format!("Failed to enable {name}"))?;
            ui::success(&format!("Enabled Samba account {name}"));
            Ok(())
        }
        UsersCommand::Disable { name } => {
            sambakit::Host::new()
                .disable_samba_user(&name)
                .with_context(|| format!("Failed to disable {name}"))?;
            ui::success(&format!("Disabled Samba account {name}"));
            Ok(())
        }
        UsersCommand::Delete { name, forget, yes } => delete(ctx, &name, forget, yes),
        UsersCommand::Groups {
            name,
            groups,
            no_apply,
        } => set_groups(ctx, &name, &groups, no_apply),
    }
}

#[derive(Debug, Serialize)]
struct UserRow {
    name: String,
    samba: bool,
    linux: bool,
    desired: bool,
    uid: Option<u32>,
    gid: Option<u32>,
    groups: Vec<String>,
}

/// Join Samba accounts with desired users, keyed by name.
fn collect_rows(
    samba_users: &[String],
    desired: &[DesiredUser],
    memberships: &[desired::DesiredMembership],
    linux_exists: impl Fn(&str) -> bool,
) -> Vec<UserRow> {
    let mut rows: BTreeMap<&str, UserRow> = BTreeMap::new();

    for user in desired {
        rows.insert(
            user.name.as_str(),
            UserRow {
                name: user.name.clone(),
                samba: false,
                linux: false,
                desired: true,
                uid: user.uid,
                gid: user.gid,
                groups: Vec::new(),
            },
        );
    }
    for name in samba_users {
        rows.entry(name.as_str())
            .or_insert_with(|| UserRow {
                name: name.clone(),
                samba: false,
                linux: false,
                desired: false,
                uid: None,
                gid: None,
                groups: Vec::new(),
            })
            .samba = true;
    }
    for membership in memberships {
        if let Some(row) = rows.get_mut(membership.user.as_str()) {
            row.groups.push(membership.group.clone());
        }
    }

    rows.into_values()
        .map(|mut row| {
            row.linux = linux_exists(&row.name);
            row
        })
        .collect()
}

fn list(ctx: &Context, json: bool) -> Result<()> {
    let host = sambakit::Host::new();
    let store = super::open_store(&ctx.settings)?;

    let samba_users = match host.list_samba_users() {
        Ok(users) => users,
        Err(e) => {
            log::warn!("Could not list Samba accounts: {e}");
            Vec::new()
        }
    };
    let desired_users = store.list_users().context("Failed to load users")?;
    let memberships = store
        .list_memberships()
        .context("Failed to load memberships")?;

    let rows = collect_rows(&samba_users, &desired_users, &memberships, |name| {
        host.user_exists(name).unwrap_or(false)
    });

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    ui::header("Users");
    if rows.is_empty() {
        ui::dim("No users");
        return Ok(());
    }
    for row in &rows {
        let samba = if row.samba {
            "samba".green()
        } else {
            "no samba".dimmed()
        };
        let linux = if row.linux {
            "linux".green()
        } else {
            "no linux user".red()
        };
        println!(
            "  {:<16} {} {} {}",
            row.name.bold(),
            samba,
            linux,
            format!(
                "uid={} gid={}",
                ui::id_or_dash(row.uid),
                ui::id_or_dash(row.gid)
            )
            .dimmed()
        );
        if !row.groups.is_empty() {
            ui::dim(&format!("  groups: {}", row.groups.join(", ")));
        }
    }
    Ok(())
}

/// Fail when a group is not in the store; memberships reference it.
fn require_groups(store: &Store, groups: &[String]) -> Result<()> {
    for group in groups {
        if store.get_group(group)?.is_none() {
            bail!("Unknown group '{group}'. Add it first: samba-admin groups add {group}");
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn add(
    ctx: &Context,
    name: &str,
    uid: Option<u32>,
    gid: Option<u32>,
    groups: &[String],
    with_password: bool,
    stdin: bool,
    no_apply: bool,
) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        bail!("User name required");
    }

    let mut store = super::open_store(&ctx.settings)?;
    require_groups(&store, groups)?;

    let password = if with_password {
        Some(super::read_password(stdin)?)
    } else {
        None
    };

    store
        .upsert_user(&DesiredUser {
            name: name.to_string(),
            uid,
            gid,
        })
        .with_context(|| format!("Failed to save user {name}"))?;
    if !groups.is_empty() {
        store
            .set_user_groups(name, groups)
            .with_context(|| format!("Failed to save groups of {name}"))?;
    }
    ui::success(&format!("Recorded user {name}"));

    let host = sambakit::Host::new();
    if !no_apply {
        super::apply_and_report(&host, &store)?;
    }

    if let Some(password) = password {
        if !host.user_exists(name).unwrap_or(false) {
            bail!("Linux user {name} does not exist yet; run 'samba-admin reconcile' first");
        }
        host.add_samba_user(name, &password)
            .with_context(|| format!("Failed to create Samba account {name}"))?;
        ui::success(&format!("Created Samba account {name}"));
    }
    Ok(())
}

fn passwd(name: &str, stdin: bool) -> Result<()> {
    let password = super::read_password(stdin)?;
    sambakit::Host::new()
        .set_samba_password(name, &password)
        .with_context(|| format!("Failed to set password for {name}"))?;
    ui::success(&format!("Password updated for {name}"));
    Ok(())
}

fn delete(ctx: &Context, name: &str, forget: bool, yes: bool) -> Result<()> {
    if !super::confirm(&format!("Delete Samba account {name}?"), yes)? {
        ui::info("Cancelled");
        return Ok(());
    }

    sambakit::Host::new()
        .delete_samba_user(name)
        .with_context(|| format!("Failed to delete {name}"))?;
    ui::success(&format!("Deleted Samba account {name}"));

    if forget {
        let store = super::open_store(&ctx.settings)?;
        store
            .delete_user(name)
            .with_context(|| format!("Failed to remove {name} from the store"))?;
        ui::success(&format!("Removed {name} from the store"));
    } else {
        ui::dim("The Linux user and its desired record are kept");
    }
    Ok(())
}

fn set_groups(ctx: &Context, name: &str, groups: &[String], no_apply: bool) -> Result<()> {
    let mut store = super::open_store(&ctx.settings)?;
    if store.get_user(name)?.is_none() {
        bail!("Unknown user '{name}'. Add it first: samba-admin users add {name}");
    }
    require_groups(&store, groups)?;

    let previous = store.list_user_groups(name)?;
    store
        .set_user_groups(name, groups)
        .with_context(|| format!("Failed to save groups of {name}"))?;
    ui::success(&format!("Recorded groups of {name}: {}", groups.join(", ")));

    let dropped: Vec<&str> = previous
        .iter()
        .filter(|group| !groups.contains(group))
        .map(String::as_str)
        .collect();
    if !dropped.is_empty() {
        ui::warn(&format!(
            "{name} stays a member of {} on the host; remove it manually with gpasswd -d",
            dropped.join(", ")
        ));
    }

    if !no_apply {
        super::apply_and_report(&sambakit::Host::new(), &store)?;
    }
    Ok(())
}
