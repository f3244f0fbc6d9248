//! Command execution abstraction.
//!
//! The [`Runner`] trait is the only place where sambakit touches the
//! operating system's process table. Everything else (identity queries,
//! Samba account changes, service checks) is expressed as calls through it,
//! which keeps the higher layers testable against an in-memory fake.

pub mod system;

use crate::error::{Error, Result};
use std::time::Duration;

/// Exit code reported when a command exceeded its timeout.
///
/// Matches the convention of coreutils `timeout(1)`.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Timeout for cheap existence probes (`getent group <name>`).
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Timeout for read-only queries (`getent`, `id`).
pub const READ_TIMEOUT: Duration = Duration::from_secs(3);

/// Timeout for mutating calls (`groupadd`, `useradd`, `usermod`, ...).
pub const MUTATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for password changes and full config dumps.
pub const SLOW_TIMEOUT: Duration = Duration::from_secs(8);

/// Captured result of a finished (or timed out) command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
    /// Exit code; signals map to `128 + signal`
    pub exit_code: i32,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    /// Failed output with the given exit code and stderr.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// Whether the command exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Whether the command was killed after its timeout.
    pub fn timed_out(&self) -> bool {
        self.exit_code == TIMEOUT_EXIT_CODE
    }
}

/// Executes system commands.
///
/// Implementations must never block longer than the given timeout. A
/// timeout is reported through [`TIMEOUT_EXIT_CODE`], not as an `Err`;
/// `Err` is reserved for commands that could not be started.
pub trait Runner: Send + Sync {
    /// Run `program` with `args` and capture its output.
    fn run(&self, timeout: Duration, program: &str, args: &[&str]) -> Result<CommandOutput>;

    /// Run `program` with `args`, feeding `stdin` to it.
    fn run_with_stdin(
        &self,
        timeout: Duration,
        stdin: &str,
        program: &str,
        args: &[&str],
    ) -> Result<CommandOutput>;

    /// Run a command and turn a non-zero exit or a timeout into an error.
    fn run_checked(&self, timeout: Duration, program: &str, args: &[&str]) -> Result<String> {
        let output = self.run(timeout, program, args)?;
        check(program, timeout, output)
    }
}

/// Convert a finished command into its stdout or a categorized error.
pub fn check(program: &str, timeout: Duration, output: CommandOutput) -> Result<String> {
    if output.timed_out() {
        return Err(Error::Timeout {
            command: program.to_string(),
            timeout,
        });
    }
    if !output.success() {
        return Err(Error::CommandFailed {
            command: program.to_string(),
            exit_code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        });
    }
    Ok(output.stdout)
}
