use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use desired::{DesiredGroup, DesiredState};
use serde::Serialize;

use crate::Context;
use crate::cli::GroupsCommand;
use crate::ui;

pub fn run(ctx: &Context, cmd: GroupsCommand) -> Result<()> {
    match cmd {
        GroupsCommand::List { json } => list(ctx, json),
        GroupsCommand::Add {
            name,
            gid,
            no_apply,
        } => add(ctx, &name, gid, no_apply),
        GroupsCommand::Rm { name } => rm(ctx, &name),
    }
}

#[derive(Debug, Serialize)]
struct GroupRow {
    name: String,
    gid: Option<u32>,
    /// GID found on the host, if the group exists there
    host_gid: Option<u32>,
    members: u64,
}

fn list(ctx: &Context, json: bool) -> Result<()> {
    let store = super::open_store(&ctx.settings)?;
    let host = sambakit::Host::new();

    let mut rows = Vec::new();
    for group in store.list_groups().context("Failed to load groups")? {
        rows.push(GroupRow {
            host_gid: host.group_gid(&group.name).unwrap_or(None),
            members: store.count_group_assignments(&group.name)?,
            name: group.name,
            gid: group.gid,
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    ui::header("Groups");
    if rows.is_empty() {
        ui::dim("No groups");
        return Ok(());
    }
    for row in &rows {
        let state = match (row.gid, row.host_gid) {
            (_, None) => "missing on host".yellow(),
            (Some(want), Some(have)) if want != have => format!("host gid={have}").red(),
            _ => "ok".green(),
        };
        println!(
            "  {:<16} {} {} {}",
            row.name.bold(),
            format!("gid={}", ui::id_or_dash(row.gid)).dimmed(),
            state,
            format!("{} member(s)", row.members).dimmed()
        );
    }
    Ok(())
}

fn add(ctx: &Context, name: &str, gid: Option<u32>, no_apply: bool) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Group name required");
    }

    let store = super::open_store(&ctx.settings)?;
    store
        .upsert_group(&DesiredGroup {
            name: name.to_string(),
            gid,
        })
        .with_context(|| format!("Failed to save group {name}"))?;
    ui::success(&format!("Recorded group {name}"));

    if !no_apply {
        super::apply_and_report(&sambakit::Host::new(), &store)?;
    }
    Ok(())
}

fn rm(ctx: &Context, name: &str) -> Result<()> {
    let store = super::open_store(&ctx.settings)?;
    if store.get_group(name)?.is_none() {
        bail!("Unknown group '{name}'");
    }

    let assigned = store.count_group_assignments(name)?;
    if assigned > 0 {
        bail!("Group '{name}' still has {assigned} member(s); remove them first");
    }

    store
        .delete_group(name)
        .with_context(|| format!("Failed to remove group {name}"))?;
    ui::success(&format!("Removed group {name} from the store"));
    ui::dim("The Linux group is kept");
    Ok(())
}
