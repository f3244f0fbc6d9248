//! Linux identity inspection and mutation.
//!
//! Thin, stateless wrappers around `getent`, `id`, `groupadd`, `useradd`
//! and `usermod`. Nothing here caches: every call asks the system again.

use crate::Host;
use crate::error::{Error, Result};
use crate::runner::{self, MUTATE_TIMEOUT, PROBE_TIMEOUT, READ_TIMEOUT};
use crate::types::{LinuxGroup, LinuxUser, UserIds};

/// `getent` exit code for "key not found in database".
const GETENT_NOT_FOUND: i32 = 2;

/// Login shell for service accounts that only authenticate through Samba.
const NOLOGIN_SHELL: &str = "/usr/sbin/nologin";

/// Lowest UID considered a regular (human) account.
const FIRST_REGULAR_UID: u32 = 1000;

impl Host {
    /// Check whether a group with this name (or numeric GID) exists.
    pub fn group_exists(&self, name: &str) -> Result<bool> {
        let output = self
            .runner
            .run(PROBE_TIMEOUT, "getent", &["group", name])?;
        Ok(output.success())
    }

    /// Check whether a user with this name exists.
    pub fn user_exists(&self, name: &str) -> Result<bool> {
        let output = self
            .runner
            .run(PROBE_TIMEOUT, "getent", &["passwd", name])?;
        Ok(output.success())
    }

    /// Look up the GID of a group; `None` if the group does not exist.
    pub fn group_gid(&self, name: &str) -> Result<Option<u32>> {
        let output = self.runner.run(READ_TIMEOUT, "getent", &["group", name])?;
        if output.exit_code == GETENT_NOT_FOUND {
            return Ok(None);
        }
        let stdout = runner::check("getent group", READ_TIMEOUT, output)?;
        let group = parse_group_row(first_line(&stdout))?;
        Ok(Some(group.gid))
    }

    /// Look up the UID and primary GID of a user.
    pub fn user_ids(&self, name: &str) -> Result<UserIds> {
        let output = self.runner.run(READ_TIMEOUT, "getent", &["passwd", name])?;
        let stdout = runner::check("getent passwd", READ_TIMEOUT, output)?;
        parse_passwd_row(first_line(&stdout))
    }

    /// Names of all groups the user belongs to (`id -nG`).
    pub fn user_groups(&self, user: &str) -> Result<Vec<String>> {
        let output = self.runner.run(READ_TIMEOUT, "id", &["-nG", user])?;
        let stdout = runner::check("id -nG", READ_TIMEOUT, output)?;
        Ok(stdout.split_whitespace().map(str::to_string).collect())
    }

    /// Check whether `user` is a member of `group`, by group name.
    pub fn is_user_in_group(&self, user: &str, group: &str) -> Result<bool> {
        Ok(self.user_groups(user)?.iter().any(|g| g == group))
    }

    /// Create a group, letting the system pick the GID when `gid` is `None`.
    pub fn create_group(&self, name: &str, gid: Option<u32>) -> Result<()> {
        let gid_arg = gid.map(|g| g.to_string());
        let mut args = Vec::new();
        if let Some(gid) = gid_arg.as_deref() {
            args.extend(["-g", gid]);
        }
        args.push(name);

        self.runner.run_checked(MUTATE_TIMEOUT, "groupadd", &args)?;
        log::info!("created group {name}");
        Ok(())
    }

    /// Create a service user without home directory or login shell.
    ///
    /// When a primary GID is requested, a group with that numeric ID is
    /// created first if none exists (named after the number).
    pub fn create_user(&self, name: &str, uid: Option<u32>, gid: Option<u32>) -> Result<()> {
        if let Some(gid) = gid {
            self.ensure_gid_exists(gid)?;
        }

        let uid_arg = uid.map(|u| u.to_string());
        let gid_arg = gid.map(|g| g.to_string());

        let mut args = vec!["-M", "-s", NOLOGIN_SHELL];
        if let Some(uid) = uid_arg.as_deref() {
            args.extend(["-u", uid]);
        }
        if let Some(gid) = gid_arg.as_deref() {
            args.extend(["-g", gid]);
        }
        args.push(name);

        self.runner.run_checked(MUTATE_TIMEOUT, "useradd", &args)?;
        log::info!("created user {name}");
        Ok(())
    }

    /// Add a user to a group's supplementary members.
    pub fn add_user_to_group(&self, user: &str, group: &str) -> Result<()> {
        self.runner
            .run_checked(MUTATE_TIMEOUT, "usermod", &["-a", "-G", group, user])?;
        log::info!("added {user} to {group}");
        Ok(())
    }

    /// Make sure some group carries this numeric GID.
    fn ensure_gid_exists(&self, gid: u32) -> Result<()> {
        let gid = gid.to_string();
        if self.group_exists(&gid)? {
            return Ok(());
        }
        self.runner
            .run_checked(MUTATE_TIMEOUT, "groupadd", &["-g", &gid, &gid])?;
        log::info!("created placeholder group {gid}");
        Ok(())
    }

    /// List all groups, sorted by name (case-insensitive).
    ///
    /// Rows that do not parse are skipped.
    pub fn list_groups(&self) -> Result<Vec<LinuxGroup>> {
        let stdout = self.runner.run_checked(READ_TIMEOUT, "getent", &["group"])?;

        let mut groups: Vec<LinuxGroup> = stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .filter_map(|l| parse_group_row(l).ok())
            .collect();

        groups.sort_by_key(|g| g.name.to_lowercase());
        Ok(groups)
    }

    /// List regular users (UID >= 1000, excluding `nobody`), sorted by name.
    pub fn list_users(&self) -> Result<Vec<LinuxUser>> {
        let stdout = self
            .runner
            .run_checked(READ_TIMEOUT, "getent", &["passwd"])?;

        let mut users = Vec::new();
        for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() < 4 || fields[0] == "nobody" {
                continue;
            }
            let Ok(uid) = fields[2].parse::<u32>() else {
                continue;
            };
            if uid < FIRST_REGULAR_UID {
                continue;
            }

            let gids = self.user_gids(fields[0]).unwrap_or_default();
            users.push(LinuxUser {
                name: fields[0].to_string(),
                uid,
                gids,
            });
        }

        users.sort_by_key(|u| u.name.to_lowercase());
        Ok(users)
    }

    /// Numeric group IDs of a user (`id -G`), sorted ascending.
    fn user_gids(&self, user: &str) -> Result<Vec<u32>> {
        let stdout = self.runner.run_checked(READ_TIMEOUT, "id", &["-G", user])?;
        let mut gids: Vec<u32> = stdout
            .split_whitespace()
            .filter_map(|g| g.parse().ok())
            .collect();
        gids.sort_unstable();
        Ok(gids)
    }
}

fn first_line(output: &str) -> &str {
    output.lines().next().unwrap_or_default().trim()
}

/// Parse a `name:x:gid:member1,member2` row.
fn parse_group_row(row: &str) -> Result<LinuxGroup> {
    let fields: Vec<&str> = row.split(':').collect();
    if fields.len() < 3 {
        return Err(Error::parse("getent group", format!("too few fields in {row:?}")));
    }

    let gid = fields[2]
        .parse()
        .map_err(|_| Error::parse("getent group", format!("invalid gid {:?}", fields[2])))?;

    let members = fields
        .get(3)
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .map(|m| m.split(',').map(str::to_string).collect())
        .unwrap_or_default();

    Ok(LinuxGroup {
        name: fields[0].to_string(),
        gid,
        members,
    })
}

/// Parse a `name:x:uid:gid:gecos:home:shell` row.
fn parse_passwd_row(row: &str) -> Result<UserIds> {
    let fields: Vec<&str> = row.split(':').collect();
    if fields.len() < 4 {
        return Err(Error::parse("getent passwd", "unexpected getent passwd format"));
    }

    let uid = fields[2]
        .parse()
        .map_err(|_| Error::parse("getent passwd", format!("invalid uid {:?}", fields[2])))?;
    let gid = fields[3]
        .parse()
        .map_err(|_| Error::parse("getent passwd", format!("invalid gid {:?}", fields[3])))?;

    Ok(UserIds { uid, gid })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::CommandOutput;
    use crate::testing::{FakeSystem, ScriptedRunner};

    #[test]
    fn test_parse_group_row() {
        let group = parse_group_row("eltern:x:1001:vater,mutter").unwrap();
        assert_eq!(group.name, "eltern");
        assert_eq!(group.gid, 1001);
        assert_eq!(group.members, vec!["vater", "mutter"]);

        let group = parse_group_row("kinder:x:1002:").unwrap();
        assert!(group.members.is_empty());
    }

    #[test]
    fn test_parse_group_row_rejects_garbage() {
        assert!(matches!(
            parse_group_row("broken"),
            Err(Error::Parse { .. })
        ));
        assert!(matches!(
            parse_group_row("eltern:x:abc:"),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_parse_passwd_row() {
        let ids = parse_passwd_row("vater:x:1000:1000:Vater:/home/vater:/bin/bash").unwrap();
        assert_eq!(ids, UserIds { uid: 1000, gid: 1000 });
    }

    #[test]
    fn test_parse_passwd_row_too_short() {
        let err = parse_passwd_row("vater:x:1000").unwrap_err();
        assert_eq!(err.category(), crate::ErrorCategory::Parse);
    }

    #[test]
    fn test_group_gid_missing_group_is_none() {
        let host = Host::with_runner(Box::new(FakeSystem::new()));
        assert_eq!(host.group_gid("nope").unwrap(), None);
    }

    #[test]
    fn test_group_gid_other_failure_is_error() {
        let runner = ScriptedRunner::new().respond(
            "getent group eltern",
            CommandOutput::failed(3, "enumeration not supported"),
        );
        let host = Host::with_runner(Box::new(runner));
        assert!(matches!(
            host.group_gid("eltern"),
            Err(Error::CommandFailed { exit_code: 3, .. })
        ));
    }

    #[test]
    fn test_create_group_with_and_without_gid() {
        let fake = FakeSystem::new();
        let host = Host::with_runner(Box::new(fake.clone()));

        host.create_group("eltern", Some(2000)).unwrap();
        host.create_group("kinder", None).unwrap();

        assert_eq!(host.group_gid("eltern").unwrap(), Some(2000));
        assert!(host.group_exists("kinder").unwrap());
        assert!(fake.calls().iter().any(|c| c == "groupadd -g 2000 eltern"));
        assert!(fake.calls().iter().any(|c| c == "groupadd kinder"));
    }

    #[test]
    fn test_create_existing_group_fails() {
        let fake = FakeSystem::new().with_group("eltern", 1001);
        let host = Host::with_runner(Box::new(fake));
        let err = host.create_group("eltern", None).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_create_user_ensures_primary_gid() {
        let fake = FakeSystem::new();
        let host = Host::with_runner(Box::new(fake.clone()));

        host.create_user("vater", Some(5000), Some(5000)).unwrap();

        let calls = fake.calls();
        assert!(calls.iter().any(|c| c == "groupadd -g 5000 5000"));
        assert!(
            calls
                .iter()
                .any(|c| c == "useradd -M -s /usr/sbin/nologin -u 5000 -g 5000 vater")
        );
        assert_eq!(host.user_ids("vater").unwrap(), UserIds { uid: 5000, gid: 5000 });
    }

    #[test]
    fn test_membership_roundtrip() {
        let fake = FakeSystem::new()
            .with_group("eltern", 1001)
            .with_user("vater", 1000, 1000);
        let host = Host::with_runner(Box::new(fake));

        assert!(!host.is_user_in_group("vater", "eltern").unwrap());
        host.add_user_to_group("vater", "eltern").unwrap();
        assert!(host.is_user_in_group("vater", "eltern").unwrap());
    }

    #[test]
    fn test_list_users_filters_system_accounts() {
        let runner = ScriptedRunner::new()
            .respond(
                "getent passwd",
                CommandOutput::ok(
                    "root:x:0:0:root:/root:/bin/bash\n\
                     nobody:x:65534:65534::/nonexistent:/usr/sbin/nologin\n\
                     Zoe:x:1001:1001::/home/zoe:/bin/sh\n\
                     anna:x:1000:1000::/home/anna:/bin/sh\n\
                     broken:x:notanumber:1:::\n",
                ),
            )
            .respond("id -G anna", CommandOutput::ok("1002 1000\n"))
            .respond("id -G Zoe", CommandOutput::ok("1001\n"));
        let host = Host::with_runner(Box::new(runner));

        let users = host.list_users().unwrap();
        let names: Vec<_> = users.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["anna", "Zoe"]);
        assert_eq!(users[0].gids, vec![1000, 1002]);
    }

    #[test]
    fn test_list_groups_sorted_case_insensitive() {
        let runner = ScriptedRunner::new().respond(
            "getent group",
            CommandOutput::ok("users:x:100:\nEltern:x:1001:vater\nadm:x:4:syslog\n"),
        );
        let host = Host::with_runner(Box::new(runner));

        let groups = host.list_groups().unwrap();
        let names: Vec<_> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["adm", "Eltern", "users"]);
    }
}
