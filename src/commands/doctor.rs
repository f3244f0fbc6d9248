use anyhow::Result;
use colored::Colorize;
use desired::DesiredState;
use sambakit::{HealthCheck, Host};

use super::status::SambaChecks;
use crate::Context;
use crate::config::Settings;
use crate::ui;

struct Issue {
    category: &'static str,
    summary: String,
    detail: Option<String>,
    fix: Option<String>,
    fix_cmd: Option<String>,
}

/// Tools samba-admin shells out to, with the package that provides them.
const REQUIRED_COMMANDS: [(&str, &str, &str); 10] = [
    ("getent", "Name service lookups", "libc-bin"),
    ("groupadd", "Create groups", "passwd"),
    ("useradd", "Create users", "passwd"),
    ("usermod", "Change group memberships", "passwd"),
    ("id", "List user groups", "coreutils"),
    ("smbpasswd", "Samba accounts", "samba-common-bin"),
    ("pdbedit", "List Samba accounts", "samba-common-bin"),
    ("testparm", "Check Samba configuration", "samba-common-bin"),
    ("smbcontrol", "Reload Samba", "samba-common-bin"),
    ("pidof", "Find smbd", "procps"),
];

pub fn run(ctx: &Context) -> Result<()> {
    ui::header("samba-admin Health Check");

    let host = Host::new();
    let mut issues: Vec<Issue> = Vec::new();

    check_commands(&host, &mut issues);
    check_privileges(&mut issues);
    check_samba(&host, &ctx.settings, &mut issues);
    check_store(&host, &ctx.settings, &mut issues);

    println!();
    if issues.is_empty() {
        ui::success("All checks passed!");
    } else {
        print_issue_summary(&issues);
    }

    Ok(())
}

fn print_issue_summary(issues: &[Issue]) {
    let count = issues.len();
    let label = if count == 1 { "Issue" } else { "Issues" };
    ui::header(&format!("{count} {label} Found"));

    for (i, issue) in issues.iter().enumerate() {
        println!(
            "  {}  {} {}",
            format!("{}.", i + 1).bold(),
            issue.summary,
            format!("[{}]", issue.category).dimmed()
        );
        if let Some(detail) = &issue.detail {
            for line in detail.lines() {
                println!("      {}", line.dimmed());
            }
        }
        if let Some(fix) = &issue.fix {
            println!("      {} {}", "Fix:".cyan(), fix);
        }
        if let Some(cmd) = &issue.fix_cmd {
            println!("      {} {}", "$".dimmed(), cmd.bold());
        }
        println!();
    }
}

fn check_commands(host: &Host, issues: &mut Vec<Issue>) {
    ui::section("Required Commands");

    let mut missing_packages: Vec<&str> = Vec::new();
    for (cmd, desc, package) in REQUIRED_COMMANDS {
        if host.has_command(cmd) {
            println!("  {} {} - {}", "✓".green(), cmd, desc.dimmed());
        } else {
            println!("  {} {} - {} {}", "✗".red(), cmd, desc, "(missing)".red());
            issues.push(Issue {
                category: "Required Commands",
                summary: format!("{cmd} is not installed"),
                detail: Some(format!("{desc}; provided by {package}")),
                fix: None,
                fix_cmd: None,
            });
            if !missing_packages.contains(&package) {
                missing_packages.push(package);
            }
        }
    }

    if let Some(issue) = issues
        .iter_mut()
        .rev()
        .find(|i| i.category == "Required Commands")
    {
        issue.fix = Some("Install the missing packages".into());
        issue.fix_cmd = Some(format!("apt-get install {}", missing_packages.join(" ")));
    }
}

fn check_privileges(issues: &mut Vec<Issue>) {
    ui::section("Privileges");

    if is_root() {
        println!("  {} running as root", "✓".green());
    } else {
        println!("  {} not running as root", "✗".red());
        issues.push(Issue {
            category: "Privileges",
            summary: "Not running as root".into(),
            detail: Some("Creating users, groups and Samba accounts needs root".into()),
            fix: Some("Run samba-admin with sudo".into()),
            fix_cmd: Some("sudo samba-admin doctor".into()),
        });
    }
}

#[cfg(unix)]
fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn is_root() -> bool {
    false
}

fn check_samba(host: &Host, settings: &Settings, issues: &mut Vec<Issue>) {
    ui::section("Samba");

    let checks = SambaChecks::collect(host, settings);
    checks.print();

    push_failed(
        issues,
        &checks.config,
        "Samba configuration is invalid",
        "Fix the reported errors in smb.conf".into(),
        Some(format!("testparm -s {}", settings.smb_conf.display())),
    );
    push_failed(
        issues,
        &checks.smbd,
        "smbd is not running",
        "Start the Samba service".into(),
        Some("systemctl start smbd".into()),
    );
    push_failed(
        issues,
        &checks.include,
        "smb.conf does not include the shares index",
        format!("Add this line to [global] in {}", settings.smb_conf.display()),
        Some(format!("include = {}", settings.shares_index.display())),
    );
}

fn push_failed(
    issues: &mut Vec<Issue>,
    check: &HealthCheck,
    summary: &str,
    fix: String,
    fix_cmd: Option<String>,
) {
    if check.ok {
        return;
    }
    issues.push(Issue {
        category: "Samba",
        summary: summary.to_string(),
        detail: (!check.detail.is_empty()).then(|| check.detail.clone()),
        fix: Some(fix),
        fix_cmd,
    });
}

fn check_store(host: &Host, settings: &Settings, issues: &mut Vec<Issue>) {
    ui::section("Desired State");

    let store = match super::open_store(settings) {
        Ok(store) => store,
        Err(e) => {
            println!("  {} store {}", "✗".red(), settings.database.display());
            issues.push(Issue {
                category: "Desired State",
                summary: "Could not open the store".into(),
                detail: Some(format!("{e:#}")),
                fix: Some("Check that the directory is writable or set APP_DB".into()),
                fix_cmd: None,
            });
            return;
        }
    };
    println!("  {} store {}", "✓".green(), settings.database.display());

    let missing_groups: Vec<String> = store
        .list_groups()
        .unwrap_or_default()
        .into_iter()
        .filter(|g| !host.group_exists(&g.name).unwrap_or(false))
        .map(|g| g.name)
        .collect();
    let missing_users: Vec<String> = store
        .list_users()
        .unwrap_or_default()
        .into_iter()
        .filter(|u| !host.user_exists(&u.name).unwrap_or(false))
        .map(|u| u.name)
        .collect();

    if missing_groups.is_empty() && missing_users.is_empty() {
        println!("  {} host matches desired users and groups", "✓".green());
        return;
    }

    println!("  {} host is out of sync", "✗".yellow());
    let mut detail = Vec::new();
    if !missing_groups.is_empty() {
        detail.push(format!("missing groups: {}", missing_groups.join(", ")));
    }
    if !missing_users.is_empty() {
        detail.push(format!("missing users: {}", missing_users.join(", ")));
    }
    issues.push(Issue {
        category: "Desired State",
        summary: "Desired users or groups are missing on the host".into(),
        detail: Some(detail.join("\n")),
        fix: Some("Reconcile the host".into()),
        fix_cmd: Some("samba-admin reconcile".into()),
    });
}
