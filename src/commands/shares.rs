use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use sambakit::{EffectiveConfig, ManagedShareState, ShareOptions, index, snippet};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use crate::Context;
use crate::cli::SharesCommand;
use crate::ui;

pub fn run(ctx: &Context, cmd: SharesCommand) -> Result<()> {
    match cmd {
        SharesCommand::List { json } => list(ctx, json),
        SharesCommand::Show { name } => show(ctx, &name),
        SharesCommand::Create {
            name,
            path,
            read_only,
            hidden,
            valid_users,
            no_reload,
        } => {
            let options = ShareOptions::new(name, path)
                .read_only(read_only)
                .browseable(!hidden)
                .valid_users(valid_users);
            create(ctx, &options, no_reload)
        }
        SharesCommand::Enable { name, no_reload } => set_disabled(ctx, &name, false, no_reload),
        SharesCommand::Disable { name, no_reload } => set_disabled(ctx, &name, true, no_reload),
        SharesCommand::Rm {
            name,
            no_reload,
            yes,
        } => rm(ctx, &name, no_reload, yes),
    }
}

#[derive(Debug, Serialize)]
struct ShareRow {
    name: String,
    path: String,
    read_only: String,
    path_ok: bool,
    /// Owner and mode, or why they could not be read
    permissions: String,
    managed: bool,
    disabled: bool,
}

/// One row per effective share, plus managed shares Samba did not load.
fn build_rows(
    config: &EffectiveConfig,
    managed: &BTreeMap<String, ManagedShareState>,
    permissions: impl Fn(&Path) -> Result<String, String>,
) -> Vec<ShareRow> {
    let mut rows: Vec<ShareRow> = config
        .shares()
        .map(|(name, settings)| {
            let path = settings
                .get("path")
                .filter(|p| !p.is_empty())
                .cloned()
                .unwrap_or_else(|| "(not set)".to_string());
            let (path_ok, permissions) = match permissions(Path::new(&path)) {
                Ok(perms) => (true, perms),
                Err(reason) => (false, reason),
            };
            let state = managed.get(name);
            ShareRow {
                name: name.clone(),
                path,
                read_only: config.read_only(name).unwrap_or("(unknown)").to_string(),
                path_ok,
                permissions,
                managed: state.is_some(),
                disabled: state.is_some_and(|s| s.disabled),
            }
        })
        .collect();

    for (name, state) in managed {
        if config.section(name).is_none() {
            rows.push(ShareRow {
                name: name.clone(),
                path: "(not loaded)".to_string(),
                read_only: "(unknown)".to_string(),
                path_ok: false,
                permissions: String::new(),
                managed: true,
                disabled: state.disabled,
            });
        }
    }

    sort_rows(&mut rows);
    rows
}

/// Managed shares first, enabled before disabled, then by name.
fn sort_rows(rows: &mut [ShareRow]) {
    rows.sort_by(|a, b| {
        b.managed
            .cmp(&a.managed)
            .then(a.disabled.cmp(&b.disabled))
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}

fn list(ctx: &Context, json: bool) -> Result<()> {
    let settings = &ctx.settings;
    let host = sambakit::Host::new();

    let config = host
        .read_effective_config(&settings.smb_conf)
        .with_context(|| format!("Failed to read {}", settings.smb_conf.display()))?;
    let managed = index::parse_file(&settings.shares_index).unwrap_or_else(|e| {
        log::warn!("Could not read shares index: {e}");
        BTreeMap::new()
    });

    let rows = build_rows(&config, &managed, sambakit::service::path_permissions);

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    ui::header("Shares");
    ui::kv("smb.conf", &settings.smb_conf.display().to_string());
    println!();
    if rows.is_empty() {
        ui::dim("No shares");
        return Ok(());
    }
    for row in &rows {
        let badge = match (row.managed, row.disabled) {
            (true, true) => "disabled".yellow(),
            (true, false) => "managed".green(),
            (false, _) => "manual".dimmed(),
        };
        let path = if row.path_ok {
            row.path.normal()
        } else {
            row.path.red()
        };
        println!(
            "  {:<16} {:<9} {} {}",
            row.name.bold(),
            badge,
            path,
            format!("read only={}", row.read_only).dimmed()
        );
        if !row.permissions.is_empty() {
            ui::dim(&format!("  {}", row.permissions));
        }
    }

    if ctx.verbose > 0 {
        ui::section("testparm -s");
        print!("{}", config.raw);
    }
    Ok(())
}

fn show(ctx: &Context, name: &str) -> Result<()> {
    let settings = &ctx.settings;
    let config = sambakit::Host::new()
        .read_effective_config(&settings.smb_conf)
        .with_context(|| format!("Failed to read {}", settings.smb_conf.display()))?;

    let Some(section) = config.section(name) else {
        bail!("Share '{name}' not found in effective config");
    };

    ui::header(&format!("Share {name}"));
    for (key, value) in section {
        ui::kv(key, value);
    }

    ui::section("Path");
    let path = section.get("path").map(String::as_str).unwrap_or_default();
    match sambakit::service::path_permissions(Path::new(path)) {
        Ok(perms) => ui::kv(path, &perms),
        Err(reason) => {
            let label = if path.is_empty() { "path" } else { path };
            ui::kv(label, &reason.red().to_string());
        }
    }

    let managed = index::parse_file(&settings.shares_index)?;
    ui::section("Management");
    match managed.get(name) {
        Some(state) if state.disabled => ui::kv("state", "managed, disabled"),
        Some(_) => ui::kv("state", "managed"),
        None => ui::kv("state", "not managed by samba-admin"),
    }
    Ok(())
}

fn create(ctx: &Context, options: &ShareOptions, no_reload: bool) -> Result<()> {
    let settings = &ctx.settings;
    super::require_index_include(settings)?;

    let share_path = Path::new(options.path.trim());
    if !share_path.starts_with(&settings.share_root) {
        ui::warn(&format!(
            "{} is outside the share root {}",
            share_path.display(),
            settings.share_root.display()
        ));
    }
    if !share_path.is_dir() {
        ui::warn(&format!("{} does not exist yet", share_path.display()));
    }

    let share_file = snippet::create_share_snippet(&settings.shares_dir, options)
        .context("Failed to write share snippet")?;
    ui::success(&format!("Wrote {}", share_file.display()));

    let name = options.name.trim();
    index::ensure_referenced(&settings.shares_index, name, &share_file)
        .context("Failed to update shares index")?;
    ui::success(&format!("Share {name} is referenced from the index"));

    super::reload_unless(&sambakit::Host::new(), no_reload)
}

fn set_disabled(ctx: &Context, name: &str, disabled: bool, no_reload: bool) -> Result<()> {
    let settings = &ctx.settings;
    snippet::validate_share_name(name)?;
    super::require_index_include(settings)?;

    let share_file = settings.share_file(name);
    if let Err(e) = index::ensure_referenced(&settings.shares_index, name, &share_file) {
        log::debug!("Could not ensure index entry for {name}: {e}");
    }
    index::set_disabled(&settings.shares_index, name, &share_file, disabled)
        .context("Failed to update shares index")?;
    ui::success(&format!(
        "{} share {name}",
        if disabled { "Disabled" } else { "Enabled" }
    ));

    super::reload_unless(&sambakit::Host::new(), no_reload)
}

fn rm(ctx: &Context, name: &str, no_reload: bool, yes: bool) -> Result<()> {
    let settings = &ctx.settings;
    snippet::validate_share_name(name)?;
    super::require_index_include(settings)?;

    if !super::confirm(&format!("Remove share {name}?"), yes)? {
        ui::info("Cancelled");
        return Ok(());
    }

    match index::remove(&settings.shares_index, name) {
        Ok(()) => {}
        Err(e) if e.is_not_managed() => {
            bail!("{e}\n{}", e.category().advice());
        }
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to remove {name} from the shares index"));
        }
    }

    let share_file = settings.share_file(name);
    match fs::remove_file(&share_file) {
        Ok(()) => ui::success(&format!("Deleted {}", share_file.display())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::debug!("No snippet at {}", share_file.display());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to delete {}", share_file.display()));
        }
    }
    ui::success(&format!("Removed share {name}"));

    super::reload_unless(&sambakit::Host::new(), no_reload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn effective(output: &str) -> EffectiveConfig {
        sambakit::service::parse_effective_config(output)
    }

    fn managed(entries: &[(&str, bool)]) -> BTreeMap<String, ManagedShareState> {
        entries
            .iter()
            .map(|(name, disabled)| {
                (
                    (*name).to_string(),
                    ManagedShareState {
                        name: (*name).to_string(),
                        disabled: *disabled,
                    },
                )
            })
            .collect()
    }

    fn row_names(rows: &[ShareRow]) -> Vec<&str> {
        rows.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_rows_sorted_managed_first() {
        let config = effective(
            "[global]\n\tworkgroup = WG\n\n[zeta]\n\tpath = /shares/zeta\n\n\
             [Alpha]\n\tpath = /shares/alpha\n\n[photos]\n\tpath = /shares/photos\n\n\
             [docs]\n\tpath = /shares/docs\n",
        );
        let rows = build_rows(
            &config,
            &managed(&[("photos", true), ("docs", false)]),
            |_| Ok("uid=0 gid=0 mode=drwxr-xr-x".into()),
        );
        assert_eq!(row_names(&rows), vec!["docs", "photos", "Alpha", "zeta"]);
        assert!(rows[1].disabled);
        assert!(!rows[2].managed);
    }

    #[test]
    fn test_rows_defaults_and_permissions() {
        let config = effective(
            "[scratch]\n\tcomment = no path\n\n[media]\n\tpath = /missing\n\treadonly = Yes\n",
        );
        let rows = build_rows(&config, &BTreeMap::new(), |path| {
            if path == Path::new("/missing") {
                Err("No such file or directory".into())
            } else {
                Ok("ok".into())
            }
        });

        let media = &rows[0];
        assert_eq!(media.name, "media");
        assert_eq!(media.read_only, "Yes");
        assert!(!media.path_ok);
        assert_eq!(media.permissions, "No such file or directory");

        let scratch = &rows[1];
        assert_eq!(scratch.path, "(not set)");
        assert_eq!(scratch.read_only, "(unknown)");
    }

    #[test]
    fn test_rows_include_unloaded_managed_shares() {
        let config = effective("[docs]\n\tpath = /shares/docs\n");
        let rows = build_rows(&config, &managed(&[("photos", true)]), |_| Ok("ok".into()));

        assert_eq!(row_names(&rows), vec!["photos", "docs"]);
        assert_eq!(rows[0].path, "(not loaded)");
        assert!(rows[0].disabled);
    }
}
