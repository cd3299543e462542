use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("Executable not found: \"{name}\"")]
    NotFound { name: String },

    #[error("Failed to change working directory: \"{}\" does not exist", .path.display())]
    DirectoryNotFound { path: PathBuf },

    #[error("Error starting `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Error running `{command}`: {source}")]
    CommandExecution {
        command: String,
        #[source]
        source: ExitFailure,
    },

    #[error("Error starting PTY for `{command}`: {message}")]
    Pty { command: String, message: String },

    #[error("Timed out acquiring lock on \"{}\" after {timeout:?}", .path.display())]
    LockTimeout { path: PathBuf, timeout: Duration },

    #[error("Cancelled while waiting for lock on \"{}\"", .path.display())]
    Cancelled { path: PathBuf },

    #[error("Failed to create lock \"{}\": {source}", .path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ShellError {
    /// The exit failure behind a `CommandExecution` error, if that is what this is.
    pub fn exit_failure(&self) -> Option<&ExitFailure> {
        match self {
            ShellError::CommandExecution { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ShellError>;

/// How a process that ran to completion failed.
///
/// `code` is the native exit status when the process exited on its own;
/// `signal` is set instead when it was terminated by a signal (unix only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitFailure {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitFailure {
    pub fn from_code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    /// Build from a std exit status. Returns `None` when the status is a success.
    pub fn from_status(status: std::process::ExitStatus) -> Option<Self> {
        if status.success() {
            return None;
        }

        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Some(Self {
            code: status.code(),
            signal,
        })
    }
}

impl fmt::Display for ExitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit status {}", code),
            (None, Some(signal)) => write!(f, "terminated by signal {}", signal),
            (None, None) => write!(f, "exited abnormally"),
        }
    }
}

impl std::error::Error for ExitFailure {}
