// Desired state
pub mod groups;
pub mod reconcile;
pub mod users;

// Samba
pub mod shares;

// Diagnostics
pub mod doctor;
pub mod status;

use anyhow::{Context, Result};
use std::io::{self, BufRead};

use crate::config::Settings;
use crate::ui;

/// Open the desired-state store configured in `settings`.
pub fn open_store(settings: &Settings) -> Result<desired::Store> {
    desired::Store::open(&settings.database)
        .with_context(|| format!("Failed to open store at {}", settings.database.display()))
}

/// Run the reconciliation engine and print what it changed.
pub fn apply_and_report(
    host: &sambakit::Host,
    store: &desired::Store,
) -> Result<::reconcile::Report> {
    let report = ::reconcile::apply(host, store).context("Reconcile failed")?;
    if report.is_empty() {
        ui::info("Host already in sync");
    } else {
        for description in report.descriptions() {
            ui::success(&description);
        }
    }
    Ok(report)
}

/// Fail unless smb.conf includes the managed shares index.
pub fn require_index_include(settings: &Settings) -> Result<()> {
    sambakit::snippet::check_smb_conf_includes(&settings.smb_conf, &settings.shares_index)
        .context("smb.conf is not modified by samba-admin; add the include manually")
}

/// Reload Samba unless the caller opted out.
pub fn reload_unless(host: &sambakit::Host, no_reload: bool) -> Result<()> {
    if no_reload {
        ui::dim("Skipped Samba reload");
        return Ok(());
    }
    host.reload_config().context("Reload failed")?;
    ui::success("Reloaded Samba configuration");
    Ok(())
}

/// Read a new password, from stdin or an interactive prompt.
pub fn read_password(from_stdin: bool) -> Result<String> {
    let password = if from_stdin {
        first_line(io::stdin().lock())?
    } else {
        dialoguer::Password::new()
            .with_prompt("New Samba password")
            .with_confirmation("Repeat password", "Passwords don't match")
            .interact()
            .context("Failed to read password")?
    };
    if password.is_empty() {
        anyhow::bail!("Password must not be empty");
    }
    Ok(password)
}

/// First line of `reader` without its line ending.
fn first_line(mut reader: impl BufRead) -> Result<String> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Ask before a destructive step; `yes` skips the prompt.
pub fn confirm(prompt: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Failed to read confirmation")
}
