//! PID-file locks shared between independent agent processes.
//!
//! A lock is a file on disk holding the pid of its owner. On unix the file is
//! additionally held with an exclusive `flock`, so a crashed owner never
//! leaves a stale lock behind: the kernel drops the lock with the process.

use bootshell_core::{Logger, Result, ShellError};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct PidLock {
    path: PathBuf,
    file: Option<File>,
}

impl PidLock {
    /// Acquire the lock at `path`, retrying every `retry_interval` until
    /// `timeout` has elapsed or `cancel` fires.
    ///
    /// There is no queueing between waiters: whoever tries first after the
    /// holder releases gets the lock.
    pub async fn acquire(
        path: &Path,
        timeout: Duration,
        retry_interval: Duration,
        cancel: &CancellationToken,
        logger: &dyn Logger,
    ) -> Result<PidLock> {
        let path = absolute(path)?;
        let deadline = Instant::now() + timeout;

        loop {
            let attempt = Self::try_acquire(&path).map_err(|source| ShellError::Lock {
                path: path.clone(),
                source,
            })?;
            if let Some(lock) = attempt {
                debug!(path = %path.display(), "Acquired lock");
                return Ok(lock);
            }

            let holder = match Self::owner(&path) {
                Some(pid) => format!("held by pid {}", pid),
                None => "held by another process".to_string(),
            };
            logger.comment(&format!(
                "Could not acquire lock on \"{}\" ({})",
                path.display(),
                holder
            ));
            logger.comment(&format!("Trying again in {:?}...", retry_interval));

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(ShellError::Cancelled { path });
                }
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(ShellError::LockTimeout { path, timeout });
                }
                _ = tokio::time::sleep(retry_interval) => {}
            }
        }
    }

    /// A single non-blocking attempt. `Ok(None)` means somebody else holds it.
    pub fn try_acquire(path: &Path) -> io::Result<Option<PidLock>> {
        let Some(mut file) = open_locked(path)? else {
            return Ok(None);
        };

        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        file.sync_all()?;

        Ok(Some(PidLock {
            path: path.to_path_buf(),
            file: Some(file),
        }))
    }

    /// The pid recorded in the lock file at `path`, if any.
    pub fn owner(path: &Path) -> Option<u32> {
        fs::read_to_string(path).ok()?.trim().parse().ok()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Release the lock and remove the PID file. Releasing twice is a no-op.
    pub fn release(&mut self) -> Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };

        unlock_and_remove(&self.path, file);

        debug!(path = %self.path.display(), "Released lock");
        Ok(())
    }
}

impl Drop for PidLock {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[cfg(unix)]
fn open_locked(path: &Path) -> io::Result<Option<File>> {
    use nix::errno::Errno;
    use nix::fcntl::{flock, FlockArg};
    use std::os::unix::fs::MetadataExt;
    use std::os::unix::io::AsRawFd;

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;

    match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
        Ok(()) => {}
        Err(Errno::EWOULDBLOCK) => return Ok(None),
        Err(errno) => return Err(errno.into()),
    }

    // The previous owner unlinks the file on release; if that happened between
    // our open and our flock we hold a lock on an orphaned inode.
    let locked = file.metadata()?;
    match fs::metadata(path) {
        Ok(on_disk) if on_disk.dev() == locked.dev() && on_disk.ino() == locked.ino() => Ok(Some(file)),
        Ok(_) => Ok(None),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

#[cfg(not(unix))]
fn open_locked(path: &Path) -> io::Result<Option<File>> {
    match OpenOptions::new().read(true).write(true).create_new(true).open(path) {
        Ok(file) => Ok(Some(file)),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(None),
        Err(err) if err.kind() == io::ErrorKind::PermissionDenied => Ok(None),
        Err(err) => Err(err),
    }
}

// Unix unlinks while still holding the lock so a waiter can never lock a
// file that is about to disappear.
#[cfg(unix)]
fn unlock_and_remove(path: &Path, file: File) {
    use nix::fcntl::{flock, FlockArg};
    use std::os::unix::io::AsRawFd;

    remove_lock_file(path);
    // Closing the file would drop the lock too.
    if let Err(errno) = flock(file.as_raw_fd(), FlockArg::Unlock) {
        warn!(path = %path.display(), error = %errno, "Failed to unlock lock file");
    }
    drop(file);
}

// Windows refuses to delete a file that is still open.
#[cfg(not(unix))]
fn unlock_and_remove(path: &Path, file: File) {
    drop(file);
    remove_lock_file(path);
}

fn remove_lock_file(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "Failed to remove lock file"),
    }
}
