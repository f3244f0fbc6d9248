//! Error types for identity, Samba and share index operations.
//!
//! Errors are categorized so callers can tell a failing system tool apart
//! from unexpected tool output, an I/O problem on a config file, or the
//! safety guard that refuses to touch content this tool did not write.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Categories of errors for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A system command exited non-zero or could not be started
    Command,
    /// A system command exceeded its timeout
    Timeout,
    /// A system command produced output of an unexpected shape
    Parse,
    /// The share block is not managed by this tool
    NotManaged,
    /// Rejected input (share name, path, ...)
    InvalidInput,
    /// Reading or writing a file failed
    Io,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Command => "System command failed",
            Self::Timeout => "System command timed out",
            Self::Parse => "Unexpected command output",
            Self::NotManaged => "Not managed by samba-admin",
            Self::InvalidInput => "Invalid input",
            Self::Io => "File access failed",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Command => "Check the command's error output; most operations need root",
            Self::Timeout => "The system may be overloaded or a name service is hanging",
            Self::Parse => "Check the name service configuration (nsswitch.conf)",
            Self::NotManaged => "Edit or remove the section manually in the shares index",
            Self::InvalidInput => "Fix the value and try again",
            Self::Io => "Check that the file exists and is writable",
        }
    }
}

/// Errors that can occur while administering identities and shares.
#[derive(Debug, Error)]
pub enum Error {
    /// The command could not be spawned at all
    #[error("failed to execute {command}: {source}")]
    Spawn {
        /// Program that failed to start
        command: String,
        /// Underlying spawn error
        #[source]
        source: std::io::Error,
    },

    /// The command ran but exited non-zero
    #[error("{command} failed: {stderr}")]
    CommandFailed {
        /// Program that failed, with its leading arguments
        command: String,
        /// Exit code reported by the command
        exit_code: i32,
        /// Trimmed standard error output
        stderr: String,
    },

    /// The command was killed after exceeding its timeout
    #[error("timeout running {command} (after {timeout:?})")]
    Timeout {
        /// Program that timed out
        command: String,
        /// Timeout that was exceeded
        timeout: Duration,
    },

    /// Command output did not have the expected shape
    #[error("unexpected {command} output: {message}")]
    Parse {
        /// Program whose output could not be parsed
        command: String,
        /// What was wrong with the output
        message: String,
    },

    /// The share has no marker block in the index
    #[error("share block for {name} not managed by samba-admin (no markers found)")]
    NotManaged {
        /// Share name that was looked up
        name: String,
    },

    /// smb.conf does not include the shares index
    #[error("missing required include in {}: include = {}", .smb_conf.display(), .index.display())]
    IncludeMissing {
        /// Path of the main Samba configuration
        smb_conf: PathBuf,
        /// Index path that should be included
        index: PathBuf,
    },

    /// Rejected share name, path or similar input
    #[error("{0}")]
    InvalidInput(String),

    /// IO error on a configuration file
    #[error("{}: {source}", .path.display())]
    File {
        /// File that could not be read or written
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Spawn { .. } | Error::CommandFailed { .. } => ErrorCategory::Command,
            Error::Timeout { .. } => ErrorCategory::Timeout,
            Error::Parse { .. } => ErrorCategory::Parse,
            Error::NotManaged { .. } => ErrorCategory::NotManaged,
            Error::IncludeMissing { .. } | Error::InvalidInput(_) => ErrorCategory::InvalidInput,
            Error::File { .. } => ErrorCategory::Io,
        }
    }

    /// Whether this is the "not managed by this tool" safety guard.
    pub fn is_not_managed(&self) -> bool {
        self.category() == ErrorCategory::NotManaged
    }

    pub(crate) fn parse(command: &str, message: impl Into<String>) -> Self {
        Error::Parse {
            command: command.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::File {
            path: path.into(),
            source,
        }
    }
}

/// Result type for sambakit operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_mapping() {
        let err = Error::CommandFailed {
            command: "groupadd".into(),
            exit_code: 9,
            stderr: "group 'eltern' already exists".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Command);

        let err = Error::Timeout {
            command: "getent".into(),
            timeout: Duration::from_secs(2),
        };
        assert_eq!(err.category(), ErrorCategory::Timeout);

        let err = Error::NotManaged { name: "docs".into() };
        assert!(err.is_not_managed());
    }

    #[test]
    fn test_command_failed_message() {
        let err = Error::CommandFailed {
            command: "usermod".into(),
            exit_code: 6,
            stderr: "group 'kinder' does not exist".into(),
        };
        assert_eq!(
            err.to_string(),
            "usermod failed: group 'kinder' does not exist"
        );
    }

    #[test]
    fn test_not_managed_message() {
        let err = Error::NotManaged { name: "docs".into() };
        assert!(err.to_string().contains("docs"));
        assert!(err.to_string().contains("not managed"));
    }
}
