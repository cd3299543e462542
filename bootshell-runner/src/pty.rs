//! Pseudo-terminal allocation for interactive runs.

use crate::process::ProcessDescriptor;
use bootshell_core::{ExitFailure, Result, ShellError};
use portable_pty::{native_pty_system, Child, CommandBuilder, ExitStatus, MasterPty, PtySize};
use std::io::{self, Read};
use tokio::sync::mpsc;

/// A child attached to a pseudo-terminal. `reader` yields the terminal's
/// combined stdout/stderr stream.
pub struct PtyProcess {
    pub reader: Box<dyn Read + Send>,
    pub child: Box<dyn Child + Send + Sync>,
    // Kept alive until the child has been waited on.
    pub(crate) master: Box<dyn MasterPty + Send>,
}

impl PtyProcess {
    pub fn pid(&self) -> Option<u32> {
        self.child.process_id()
    }
}

pub fn start(descriptor: &ProcessDescriptor) -> Result<PtyProcess> {
    let pty_error = |err: anyhow::Error| ShellError::Pty {
        command: descriptor.display().to_string(),
        message: format!("{:#}", err),
    };

    let pair = native_pty_system()
        .openpty(PtySize {
            rows: 24,
            cols: 80,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(pty_error)?;

    let mut builder = CommandBuilder::new(descriptor.program());
    builder.args(descriptor.args());
    builder.cwd(descriptor.dir());
    builder.env_clear();
    for (key, value) in descriptor.env_pairs() {
        builder.env(key, value);
    }

    let child = pair.slave.spawn_command(builder).map_err(pty_error)?;
    // The reader only sees end-of-stream once every handle to the slave side
    // is closed, including ours.
    drop(pair.slave);

    let reader = pair.master.try_clone_reader().map_err(pty_error)?;

    Ok(PtyProcess {
        reader,
        child,
        master: pair.master,
    })
}

/// Whether a read error from the terminal just means the child side closed.
///
/// Linux reports `EIO` once the last slave handle is gone; macOS does the
/// same when the read races the close. Windows ConPTY reports a broken pipe.
pub fn is_benign_close(err: &io::Error) -> bool {
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(nix::errno::Errno::EIO as i32)
    }
    #[cfg(not(unix))]
    {
        err.kind() == io::ErrorKind::BrokenPipe
    }
}

/// How a terminal child failed, or `None` if it succeeded.
///
/// portable-pty reports a signal death as exit code 1 plus the signal's
/// `strsignal` description, so the description is mapped back to a number.
pub fn exit_failure(status: &ExitStatus) -> Option<ExitFailure> {
    if status.success() {
        return None;
    }

    match status.signal() {
        Some(description) => Some(ExitFailure {
            code: None,
            signal: signal_number(description),
        }),
        None => Some(ExitFailure::from_code(status.exit_code() as i32)),
    }
}

#[cfg(unix)]
fn signal_number(description: &str) -> Option<i32> {
    use nix::sys::signal::Signal;

    for prefix in ["Signal ", "Unknown signal "] {
        if let Some(number) = description.strip_prefix(prefix) {
            return number.trim().parse().ok();
        }
    }

    let sig = match description {
        "Hangup" => Signal::SIGHUP,
        "Interrupt" => Signal::SIGINT,
        "Quit" => Signal::SIGQUIT,
        "Killed" => Signal::SIGKILL,
        "Terminated" => Signal::SIGTERM,
        "Aborted" | "Abort trap" => Signal::SIGABRT,
        "Broken pipe" => Signal::SIGPIPE,
        "Segmentation fault" => Signal::SIGSEGV,
        "Alarm clock" => Signal::SIGALRM,
        _ => return None,
    };
    Some(sig as i32)
}

#[cfg(not(unix))]
fn signal_number(_description: &str) -> Option<i32> {
    None
}

/// Read the terminal until it closes, handing chunks to `tx`. Blocking; run
/// it on a blocking thread.
pub(crate) fn pump(mut reader: Box<dyn Read + Send>, tx: mpsc::Sender<Vec<u8>>) -> io::Result<()> {
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => {
                if tx.blocking_send(buf[..n].to_vec()).is_err() {
                    return Ok(());
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) if is_benign_close(&err) => return Ok(()),
            Err(err) => return Err(err),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use nix::errno::Errno;
    use nix::sys::signal::Signal;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_eio_is_benign() {
        assert!(is_benign_close(&io::Error::from_raw_os_error(Errno::EIO as i32)));
        assert!(!is_benign_close(&io::Error::from_raw_os_error(Errno::EBADF as i32)));
        assert!(!is_benign_close(&io::Error::new(io::ErrorKind::Other, "boom")));
    }

    #[test]
    fn test_pump_treats_eio_as_end_of_stream() {
        struct Closing {
            sent: bool,
        }
        impl Read for Closing {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if self.sent {
                    return Err(io::Error::from_raw_os_error(Errno::EIO as i32));
                }
                self.sent = true;
                buf[..5].copy_from_slice(b"hello");
                Ok(5)
            }
        }

        let (tx, mut rx) = mpsc::channel(4);
        pump(Box::new(Closing { sent: false }), tx).unwrap();
        assert_eq!(rx.try_recv().unwrap(), b"hello".to_vec());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_signal_death_has_no_exit_code() {
        let failure = exit_failure(&ExitStatus::with_signal("Terminated")).unwrap();
        assert_eq!(
            failure,
            ExitFailure {
                code: None,
                signal: Some(Signal::SIGTERM as i32),
            }
        );
        assert_eq!(failure.to_string(), "terminated by signal 15");

        let unknown = exit_failure(&ExitStatus::with_signal("Signal 42")).unwrap();
        assert_eq!(unknown.signal, Some(42));
        assert_eq!(unknown.code, None);
    }

    #[test]
    fn test_exit_code_is_kept() {
        assert_eq!(exit_failure(&ExitStatus::with_exit_code(0)), None);
        assert_eq!(
            exit_failure(&ExitStatus::with_exit_code(3)),
            Some(ExitFailure::from_code(3))
        );
    }
}
