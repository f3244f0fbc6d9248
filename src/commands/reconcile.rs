use anyhow::{Context as _, Result};

use crate::Context;
use crate::ui;

pub fn run(ctx: &Context, json: bool) -> Result<()> {
    let store = super::open_store(&ctx.settings)?;
    let host = sambakit::Host::new();

    if json {
        let report = ::reconcile::apply(&host, &store).context("Reconcile failed")?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if !ctx.quiet {
        ui::header("Reconcile");
    }
    let report = super::apply_and_report(&host, &store)?;
    if !report.is_empty() && !ctx.quiet {
        println!();
        let host_changes = report.host_changes();
        ui::dim(&format!(
            "{host_changes} host change(s), {} store update(s)",
            report.len() - host_changes
        ));
    }
    Ok(())
}
