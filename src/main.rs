mod cli;
mod commands;
mod config;
mod paths;
mod ui;

use anyhow::{Context as _, Result};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub settings: config::Settings,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    if let Command::Completions { shell } = cli.command {
        generate(shell, &mut Cli::command(), "samba-admin", &mut io::stdout());
        return Ok(());
    }

    let settings = config::Settings::load(cli.config.as_deref())?;
    log::debug!("{settings:?}");

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        settings,
    };

    match cli.command {
        Command::Reconcile { json } => commands::reconcile::run(&ctx, json),
        Command::Users(cmd) => commands::users::run(&ctx, cmd),
        Command::Groups(cmd) => commands::groups::run(&ctx, cmd),
        Command::Shares(cmd) => commands::shares::run(&ctx, cmd),
        Command::Status => commands::status::run(&ctx),
        Command::Doctor => commands::doctor::run(&ctx),
        Command::Reload => {
            sambakit::Host::new()
                .reload_config()
                .context("Reload failed")?;
            ui::success("Reloaded Samba configuration");
            Ok(())
        }
        Command::Completions { .. } => Ok(()),
    }
}
