use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "samba-admin")]
#[command(author = "Florian Ibach")]
#[command(version)]
#[command(about = "Keep Linux users, groups and Samba shares in line with a desired state", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ~/.config/samba-admin/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Bring host users, groups and memberships in line with the store
    Reconcile {
        /// Print the actions as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage users and their Samba accounts
    #[command(subcommand)]
    Users(UsersCommand),

    /// Manage desired groups
    #[command(subcommand)]
    Groups(GroupsCommand),

    /// Manage Samba shares
    #[command(subcommand)]
    Shares(SharesCommand),

    /// Show Samba config and service status
    Status,

    /// Check required tools, privileges and Samba setup
    Doctor,

    /// Reload the Samba configuration
    Reload,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Users Commands
// ============================================================================

#[derive(Subcommand)]
pub enum UsersCommand {
    /// List Samba accounts with their desired and Linux state
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add a user to the store and create it on the host
    Add {
        /// User name
        name: String,

        /// Pin the UID (default: chosen by the OS)
        #[arg(long)]
        uid: Option<u32>,

        /// Pin the primary GID (default: chosen by the OS)
        #[arg(long)]
        gid: Option<u32>,

        /// Supplementary groups, comma separated
        #[arg(long, value_delimiter = ',')]
        groups: Vec<String>,

        /// Also create the Samba account (prompts for a password)
        #[arg(long)]
        password: bool,

        /// Read the password from the first line of stdin
        #[arg(long, requires = "password")]
        stdin: bool,

        /// Only record the user, don't reconcile
        #[arg(long)]
        no_apply: bool,
    },

    /// Set a user's Samba password
    Passwd {
        /// User name
        name: String,

        /// Read the password from the first line of stdin
        #[arg(long)]
        stdin: bool,
    },

    /// Enable a Samba account
    Enable {
        /// User name
        name: String,
    },

    /// Disable a Samba account
    Disable {
        /// User name
        name: String,
    },

    /// Delete a Samba account (the Linux user is kept)
    Delete {
        /// User name
        name: String,

        /// Also remove the user from the store
        #[arg(long)]
        forget: bool,

        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Replace a user's supplementary groups
    Groups {
        /// User name
        name: String,

        /// Groups the user should belong to
        groups: Vec<String>,

        /// Only record the groups, don't reconcile
        #[arg(long)]
        no_apply: bool,
    },
}

// ============================================================================
// Groups Commands
// ============================================================================

#[derive(Subcommand)]
pub enum GroupsCommand {
    /// List desired groups
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add a group to the store and create it on the host
    Add {
        /// Group name
        name: String,

        /// Pin the GID (default: chosen by the OS)
        #[arg(long)]
        gid: Option<u32>,

        /// Only record the group, don't reconcile
        #[arg(long)]
        no_apply: bool,
    },

    /// Remove a group from the store (the Linux group is kept)
    Rm {
        /// Group name
        name: String,
    },
}

// ============================================================================
// Shares Commands
// ============================================================================

#[derive(Subcommand)]
pub enum SharesCommand {
    /// List shares from the effective Samba configuration
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective settings of one share
    Show {
        /// Share name
        name: String,
    },

    /// Create a managed share
    Create {
        /// Share name
        name: String,

        /// Absolute directory to export
        #[arg(long)]
        path: String,

        /// Export read-only
        #[arg(long)]
        read_only: bool,

        /// Hide from share browsing
        #[arg(long)]
        hidden: bool,

        /// Allowed users and @groups, comma separated
        #[arg(long, default_value = "")]
        valid_users: String,

        /// Don't reload Samba afterwards
        #[arg(long)]
        no_reload: bool,
    },

    /// Enable a managed share
    Enable {
        /// Share name
        name: String,

        /// Don't reload Samba afterwards
        #[arg(long)]
        no_reload: bool,
    },

    /// Disable a managed share without deleting it
    Disable {
        /// Share name
        name: String,

        /// Don't reload Samba afterwards
        #[arg(long)]
        no_reload: bool,
    },

    /// Remove a managed share and its snippet
    Rm {
        /// Share name
        name: String,

        /// Don't reload Samba afterwards
        #[arg(long)]
        no_reload: bool,

        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_groups_are_comma_separated() {
        let cli = Cli::parse_from([
            "samba-admin",
            "users",
            "add",
            "vater",
            "--uid",
            "1000",
            "--groups",
            "eltern,familie",
        ]);
        match cli.command {
            Command::Users(UsersCommand::Add {
                name, uid, groups, ..
            }) => {
                assert_eq!(name, "vater");
                assert_eq!(uid, Some(1000));
                assert_eq!(groups, vec!["eltern", "familie"]);
            }
            _ => panic!("expected users add"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "samba-admin",
            "shares",
            "list",
            "-vv",
            "--config",
            "/tmp/c.toml",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
    }

    #[test]
    fn test_stdin_requires_password() {
        let result = Cli::try_parse_from(["samba-admin", "users", "add", "vater", "--stdin"]);
        assert!(result.is_err());
    }
}
