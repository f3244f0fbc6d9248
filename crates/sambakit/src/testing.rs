//! In-memory runners for tests.
//!
//! [`FakeSystem`] simulates the passwd/group databases behind `getent`,
//! `groupadd`, `useradd`, `usermod` and `id`, so identity code can be
//! exercised without root. [`ScriptedRunner`] replays canned outputs for
//! everything else.
//!
//! Enabled for this crate's own tests and, for downstream crates, through
//! the `test-support` feature.

use crate::error::Result;
use crate::runner::{CommandOutput, Runner};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// First ID handed out when the caller does not pick one.
const FIRST_ASSIGNED_ID: u32 = 1000;

#[derive(Debug, Default)]
struct Database {
    /// group name -> (gid, supplementary members)
    groups: BTreeMap<String, (u32, Vec<String>)>,
    /// user name -> (uid, primary gid)
    users: BTreeMap<String, (u32, u32)>,
    failures: Vec<(String, CommandOutput)>,
    calls: Vec<String>,
}

/// Fake Linux identity database.
///
/// Cloning shares the underlying state, so a test can keep one handle for
/// assertions while the [`crate::Host`] owns another.
#[derive(Debug, Clone, Default)]
pub struct FakeSystem {
    db: Arc<Mutex<Database>>,
}

impl FakeSystem {
    /// An empty system with no users or groups.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a group.
    pub fn with_group(self, name: &str, gid: u32) -> Self {
        self.lock().groups.insert(name.to_string(), (gid, Vec::new()));
        self
    }

    /// Seed a user with a primary GID; no group is created for it.
    pub fn with_user(self, name: &str, uid: u32, gid: u32) -> Self {
        self.lock().users.insert(name.to_string(), (uid, gid));
        self
    }

    /// Seed a supplementary membership.
    pub fn with_member(self, group: &str, user: &str) -> Self {
        if let Some((_, members)) = self.lock().groups.get_mut(group) {
            members.push(user.to_string());
        }
        self
    }

    /// Answer every command line starting with `prefix` with `output`.
    pub fn fail_on(self, prefix: &str, output: CommandOutput) -> Self {
        self.lock().failures.push((prefix.to_string(), output));
        self
    }

    /// Drop every failure injected with [`FakeSystem::fail_on`].
    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Command lines run so far, e.g. `"groupadd -g 2000 eltern"`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Forget the recorded command lines.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Command lines that would have changed the system.
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| ["groupadd", "useradd", "usermod"].iter().any(|m| c.starts_with(m)))
            .collect()
    }

    /// GID of a group, if it exists.
    pub fn group_gid(&self, name: &str) -> Option<u32> {
        self.lock().groups.get(name).map(|(gid, _)| *gid)
    }

    /// UID and primary GID of a user, if it exists.
    pub fn user_ids(&self, name: &str) -> Option<(u32, u32)> {
        self.lock().users.get(name).copied()
    }

    /// Remove a group behind the tool's back.
    pub fn delete_group(&self, name: &str) {
        self.lock().groups.remove(name);
    }

    fn lock(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Runner for FakeSystem {
    fn run(&self, _timeout: Duration, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let mut db = self.lock();
        let line = command_line(program, args);
        db.calls.push(line.clone());

        if let Some((_, output)) = db.failures.iter().find(|(p, _)| line.starts_with(p.as_str())) {
            return Ok(output.clone());
        }

        Ok(match program {
            "getent" => db.getent(args),
            "groupadd" => db.groupadd(args),
            "useradd" => db.useradd(args),
            "usermod" => db.usermod(args),
            "id" => db.id(args),
            _ => CommandOutput::failed(127, format!("{program}: command not found")),
        })
    }

    fn run_with_stdin(
        &self,
        timeout: Duration,
        _stdin: &str,
        program: &str,
        args: &[&str],
    ) -> Result<CommandOutput> {
        self.run(timeout, program, args)
    }
}

impl Database {
    fn getent(&self, args: &[&str]) -> CommandOutput {
        match args {
            ["group"] => CommandOutput::ok(
                self.groups
                    .keys()
                    .map(|name| self.group_row(name))
                    .collect::<String>(),
            ),
            ["group", key] => match self.find_group(key) {
                Some(name) => CommandOutput::ok(self.group_row(name)),
                None => CommandOutput::failed(2, ""),
            },
            ["passwd"] => CommandOutput::ok(
                self.users
                    .keys()
                    .map(|name| self.passwd_row(name))
                    .collect::<String>(),
            ),
            ["passwd", key] => match self.find_user(key) {
                Some(name) => CommandOutput::ok(self.passwd_row(name)),
                None => CommandOutput::failed(2, ""),
            },
            _ => CommandOutput::failed(1, "Usage: getent database [key ...]"),
        }
    }

    fn groupadd(&mut self, args: &[&str]) -> CommandOutput {
        let (flags, name) = split_flags(args);
        let Some(name) = name else {
            return CommandOutput::failed(2, "Usage: groupadd [options] GROUP");
        };
        if self.groups.contains_key(name) {
            return CommandOutput::failed(9, format!("groupadd: group '{name}' already exists"));
        }

        let gid = match flags.get("-g").map(|g| g.parse::<u32>()) {
            Some(Ok(gid)) if self.gid_taken(gid) => {
                return CommandOutput::failed(4, format!("groupadd: GID '{gid}' already exists"));
            }
            Some(Ok(gid)) => gid,
            Some(Err(_)) => return CommandOutput::failed(3, "groupadd: invalid group ID"),
            None => self.next_gid(),
        };

        self.groups.insert(name.to_string(), (gid, Vec::new()));
        CommandOutput::ok("")
    }

    fn useradd(&mut self, args: &[&str]) -> CommandOutput {
        let (flags, name) = split_flags(args);
        let Some(name) = name else {
            return CommandOutput::failed(2, "Usage: useradd [options] LOGIN");
        };
        if self.users.contains_key(name) {
            return CommandOutput::failed(9, format!("useradd: user '{name}' already exists"));
        }

        let uid = match flags.get("-u").map(|u| u.parse::<u32>()) {
            Some(Ok(uid)) if self.users.values().any(|(u, _)| *u == uid) => {
                return CommandOutput::failed(4, format!("useradd: UID {uid} is not unique"));
            }
            Some(Ok(uid)) => uid,
            Some(Err(_)) => return CommandOutput::failed(3, "useradd: invalid user ID"),
            None => self.next_uid(),
        };

        let gid = match flags.get("-g") {
            Some(group) => match self.find_group(group) {
                Some(found) => self.groups[found].0,
                None => {
                    return CommandOutput::failed(
                        6,
                        format!("useradd: group '{group}' does not exist"),
                    );
                }
            },
            // user private group, same number as the uid when that is free
            None => {
                let gid = if self.gid_taken(uid) { self.next_gid() } else { uid };
                self.groups.insert(name.to_string(), (gid, Vec::new()));
                gid
            }
        };

        self.users.insert(name.to_string(), (uid, gid));
        CommandOutput::ok("")
    }

    fn usermod(&mut self, args: &[&str]) -> CommandOutput {
        let (flags, user) = split_flags(args);
        let (Some(user), Some(group)) = (user, flags.get("-G")) else {
            return CommandOutput::failed(2, "Usage: usermod [options] LOGIN");
        };
        if !self.users.contains_key(user) {
            return CommandOutput::failed(6, format!("usermod: user '{user}' does not exist"));
        }
        let Some((_, members)) = self.groups.get_mut(*group) else {
            return CommandOutput::failed(6, format!("usermod: group '{group}' does not exist"));
        };

        if !members.iter().any(|m| m == user) {
            members.push(user.to_string());
        }
        CommandOutput::ok("")
    }

    fn id(&self, args: &[&str]) -> CommandOutput {
        let (numeric, user) = match args {
            ["-nG", user] => (false, *user),
            ["-G", user] => (true, *user),
            _ => return CommandOutput::failed(1, "id: unsupported arguments"),
        };
        let Some(&(_, primary)) = self.users.get(user) else {
            return CommandOutput::failed(1, format!("id: '{user}': no such user"));
        };

        let mut entries: Vec<(String, u32)> = Vec::new();
        let primary_name = self
            .groups
            .iter()
            .find(|(_, (gid, _))| *gid == primary)
            .map_or_else(|| primary.to_string(), |(name, _)| name.clone());
        entries.push((primary_name, primary));

        for (name, (gid, members)) in &self.groups {
            if *gid != primary && members.iter().any(|m| m == user) {
                entries.push((name.clone(), *gid));
            }
        }

        let out: Vec<String> = entries
            .into_iter()
            .map(|(name, gid)| if numeric { gid.to_string() } else { name })
            .collect();
        CommandOutput::ok(format!("{}\n", out.join(" ")))
    }

    /// Resolve a group by name or numeric GID.
    fn find_group(&self, key: &str) -> Option<&String> {
        self.groups.get_key_value(key).map(|(k, _)| k).or_else(|| {
            let gid: u32 = key.parse().ok()?;
            self.groups
                .iter()
                .find(|(_, (g, _))| *g == gid)
                .map(|(k, _)| k)
        })
    }

    fn find_user(&self, key: &str) -> Option<&String> {
        self.users.get_key_value(key).map(|(k, _)| k).or_else(|| {
            let uid: u32 = key.parse().ok()?;
            self.users
                .iter()
                .find(|(_, (u, _))| *u == uid)
                .map(|(k, _)| k)
        })
    }

    fn group_row(&self, name: &str) -> String {
        let (gid, members) = &self.groups[name];
        format!("{name}:x:{gid}:{}\n", members.join(","))
    }

    fn passwd_row(&self, name: &str) -> String {
        let (uid, gid) = self.users[name];
        format!("{name}:x:{uid}:{gid}::/home/{name}:/usr/sbin/nologin\n")
    }

    fn gid_taken(&self, gid: u32) -> bool {
        self.groups.values().any(|(g, _)| *g == gid)
    }

    fn next_gid(&self) -> u32 {
        (FIRST_ASSIGNED_ID..)
            .find(|gid| !self.gid_taken(*gid))
            .unwrap_or(FIRST_ASSIGNED_ID)
    }

    fn next_uid(&self) -> u32 {
        (FIRST_ASSIGNED_ID..)
            .find(|uid| !self.users.values().any(|(u, _)| u == uid))
            .unwrap_or(FIRST_ASSIGNED_ID)
    }
}

/// Split `-x value` pairs from the trailing positional argument.
///
/// Flags without a value (`-M`, `-a`) map to an empty string.
fn split_flags<'a>(args: &[&'a str]) -> (HashMap<&'a str, &'a str>, Option<&'a str>) {
    const VALUELESS: [&str; 2] = ["-M", "-a"];

    let mut flags = HashMap::new();
    let mut positional = None;
    let mut iter = args.iter().copied();
    while let Some(arg) = iter.next() {
        if VALUELESS.contains(&arg) {
            flags.insert(arg, "");
        } else if arg.starts_with('-') {
            flags.insert(arg, iter.next().unwrap_or_default());
        } else {
            positional = Some(arg);
        }
    }
    (flags, positional)
}

fn command_line(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Default)]
struct Script {
    responses: HashMap<String, CommandOutput>,
    stdin: HashMap<String, String>,
    calls: Vec<String>,
}

/// Runner answering exact command lines with canned outputs.
///
/// Unknown commands fail with exit code 127.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRunner {
    script: Arc<Mutex<Script>>,
}

impl ScriptedRunner {
    /// A runner with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `command_line` (program and args joined by spaces) with `output`.
    pub fn respond(self, command_line: &str, output: CommandOutput) -> Self {
        self.lock().responses.insert(command_line.to_string(), output);
        self
    }

    /// Stdin that was fed to the last run of `command_line`.
    pub fn stdin_for(&self, command_line: &str) -> Option<String> {
        self.lock().stdin.get(command_line).cloned()
    }

    /// Command lines run so far.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Runner for ScriptedRunner {
    fn run(&self, _timeout: Duration, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let mut script = self.lock();
        let line = command_line(program, args);
        script.calls.push(line.clone());

        Ok(script
            .responses
            .get(&line)
            .cloned()
            .unwrap_or_else(|| CommandOutput::failed(127, format!("{program}: command not found"))))
    }

    fn run_with_stdin(
        &self,
        timeout: Duration,
        stdin: &str,
        program: &str,
        args: &[&str],
    ) -> Result<CommandOutput> {
        self.lock()
            .stdin
            .insert(command_line(program, args), stdin.to_string());
        self.run(timeout, program, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(fake: &FakeSystem, program: &str, args: &[&str]) -> CommandOutput {
        fake.run(Duration::from_secs(1), program, args).unwrap()
    }

    #[test]
    fn test_useradd_creates_private_group() {
        let fake = FakeSystem::new();
        assert!(run(&fake, "useradd", &["-M", "-s", "/usr/sbin/nologin", "kind"]).success());

        assert_eq!(fake.user_ids("kind"), Some((1000, 1000)));
        assert_eq!(fake.group_gid("kind"), Some(1000));
        assert_eq!(run(&fake, "id", &["-nG", "kind"]).stdout, "kind\n");
    }

    #[test]
    fn test_useradd_unknown_group() {
        let fake = FakeSystem::new();
        let out = run(&fake, "useradd", &["-g", "4242", "kind"]);
        assert_eq!(out.exit_code, 6);
        assert!(fake.user_ids("kind").is_none());
    }

    #[test]
    fn test_id_lists_supplementary_groups() {
        let fake = FakeSystem::new()
            .with_group("vater", 1000)
            .with_group("eltern", 1001)
            .with_user("vater", 1000, 1000)
            .with_member("eltern", "vater");

        assert_eq!(run(&fake, "id", &["-nG", "vater"]).stdout, "vater eltern\n");
        assert_eq!(run(&fake, "id", &["-G", "vater"]).stdout, "1000 1001\n");
        assert_eq!(run(&fake, "id", &["-G", "nobody"]).exit_code, 1);
    }

    #[test]
    fn test_getent_by_gid() {
        let fake = FakeSystem::new().with_group("eltern", 1001);
        assert_eq!(run(&fake, "getent", &["group", "1001"]).stdout, "eltern:x:1001:\n");
        assert_eq!(run(&fake, "getent", &["group", "1002"]).exit_code, 2);
    }

    #[test]
    fn test_failure_injection_and_call_log() {
        let fake = FakeSystem::new().fail_on("groupadd", CommandOutput::failed(10, "locked"));
        let out = run(&fake, "groupadd", &["eltern"]);

        assert_eq!(out.exit_code, 10);
        assert_eq!(fake.group_gid("eltern"), None);
        assert_eq!(fake.mutations(), vec!["groupadd eltern"]);

        fake.clear_failures();
        assert!(run(&fake, "groupadd", &["eltern"]).success());
        assert!(fake.group_gid("eltern").is_some());
    }

    #[test]
    fn test_scripted_runner_unknown_command() {
        let runner = ScriptedRunner::new().respond("pidof smbd", CommandOutput::ok("42\n"));
        let ok = runner.run(Duration::from_secs(1), "pidof", &["smbd"]).unwrap();
        let missing = runner.run(Duration::from_secs(1), "pidof", &["nmbd"]).unwrap();

        assert_eq!(ok.stdout, "42\n");
        assert_eq!(missing.exit_code, 127);
        assert_eq!(runner.calls(), vec!["pidof smbd", "pidof nmbd"]);
    }
}
