//! Runner that spawns real processes.

use crate::error::{Error, Result};
use crate::runner::{CommandOutput, Runner, TIMEOUT_EXIT_CODE};
use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How often a running child is polled for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runner backed by `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    /// Create a runner for the local machine.
    pub fn new() -> Self {
        Self
    }

    fn execute(
        &self,
        timeout: Duration,
        stdin: Option<&str>,
        program: &str,
        args: &[&str],
    ) -> Result<CommandOutput> {
        log::debug!("exec: {} {}", program, args.join(" "));

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Own process group; a timeout kills the whole group.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command.spawn().map_err(|source| Error::Spawn {
            command: program.to_string(),
            source,
        })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        if let Some(input) = stdin
            && let Some(mut pipe) = child.stdin.take()
        {
            // A child that exits without reading stdin closes the pipe early;
            // its exit status tells the real story.
            if let Err(e) = pipe.write_all(input.as_bytes()) {
                log::debug!("{program}: writing stdin failed: {e}");
            }
        }

        let status = wait_with_deadline(&mut child, timeout).map_err(|source| Error::Spawn {
            command: program.to_string(),
            source,
        })?;

        let Some(status) = status else {
            // A descendant that left the group may still hold the pipes open;
            // the reader threads are detached instead of joined.
            log::warn!("{program} timed out after {timeout:?}");
            return Ok(CommandOutput::failed(TIMEOUT_EXIT_CODE, ""));
        };

        Ok(CommandOutput {
            stdout: join(stdout),
            stderr: join(stderr),
            exit_code: exit_code(status),
        })
    }
}

impl Runner for SystemRunner {
    fn run(&self, timeout: Duration, program: &str, args: &[&str]) -> Result<CommandOutput> {
        self.execute(timeout, None, program, args)
    }

    fn run_with_stdin(
        &self,
        timeout: Duration,
        stdin: &str,
        program: &str,
        args: &[&str],
    ) -> Result<CommandOutput> {
        self.execute(timeout, Some(stdin), program, args)
    }
}

/// Poll the child until it exits or the deadline passes.
///
/// Returns `None` when the child had to be killed.
fn wait_with_deadline(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }

        if started.elapsed() >= timeout {
            kill_group(child);
            let _ = child.wait();
            return Ok(None);
        }

        thread::sleep(POLL_INTERVAL);
    }
}

/// Kill the child's whole process group, falling back to the child alone.
#[cfg(unix)]
fn kill_group(child: &mut Child) {
    if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
        // SAFETY: killpg only sends a signal; the group id is the child's pid,
        // which stays reserved until the caller reaps the child.
        if unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0 {
            return;
        }
    }
    let _ = child.kill();
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) {
    let _ = child.kill();
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn join(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_captures_stdout_and_exit_code() {
        let out = SystemRunner
            .run(Duration::from_secs(5), "sh", &["-c", "echo hello; exit 3"])
            .unwrap();
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.exit_code, 3);
    }

    #[test]
    fn test_captures_stderr() {
        let out = SystemRunner
            .run(Duration::from_secs(5), "sh", &["-c", "echo oops >&2; exit 1"])
            .unwrap();
        assert_eq!(out.stderr.trim(), "oops");
        assert!(!out.success());
    }

    #[test]
    fn test_feeds_stdin() {
        let out = SystemRunner
            .run_with_stdin(Duration::from_secs(5), "pw\npw\n", "cat", &[])
            .unwrap();
        assert_eq!(out.stdout, "pw\npw\n");
        assert!(out.success());
    }

    #[test]
    fn test_timeout_reports_distinguished_exit_code() {
        let started = Instant::now();
        let out = SystemRunner
            .run(Duration::from_millis(200), "sleep", &["5"])
            .unwrap();
        assert!(out.timed_out());
        assert_eq!(out.exit_code, TIMEOUT_EXIT_CODE);
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_timeout_kills_forked_children() {
        let started = Instant::now();
        let out = SystemRunner
            .run(Duration::from_millis(200), "sh", &["-c", "sleep 4; true"])
            .unwrap();
        assert_eq!(out.exit_code, TIMEOUT_EXIT_CODE);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_timeout_with_stdin_pipe() {
        let started = Instant::now();
        let out = SystemRunner
            .run_with_stdin(Duration::from_millis(200), "pw\n", "sh", &["-c", "sleep 4 & wait"])
            .unwrap();
        assert!(out.timed_out());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let err = SystemRunner
            .run(Duration::from_secs(1), "definitely-not-a-real-program-xyz", &[])
            .unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
    }
}
