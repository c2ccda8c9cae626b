//! Single-instance guard: an exclusive advisory lock on a PID file.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum InstanceError {
    Io(PathBuf, io::Error),
    /// Another process holds the lock.
    AlreadyRunning(PathBuf),
}

impl fmt::Display for InstanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(path, e) => write!(f, "cannot use PID file {}: {}", path.display(), e),
            Self::AlreadyRunning(path) => {
                write!(f, "another portsd is running (lock held on {})", path.display())
            }
        }
    }
}

impl std::error::Error for InstanceError {}

/// Held for the life of the daemon. Dropping it closes the file, which
/// releases the lock.
pub struct InstanceLock {
    _file: File,
    path: PathBuf,
}

impl InstanceLock {
    /// Lock `path` and write our PID into it. Fails fast if another process
    /// already holds it.
    pub fn acquire(path: &Path) -> Result<Self, InstanceError> {
        let io_err = |e| InstanceError::Io(path.to_path_buf(), e);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(io_err)?;

        try_lock_exclusive(&file).map_err(|e| {
            if e.kind() == io::ErrorKind::WouldBlock {
                InstanceError::AlreadyRunning(path.to_path_buf())
            } else {
                io_err(e)
            }
        })?;

        // Truncate only after the lock is held.
        file.set_len(0).map_err(io_err)?;
        writeln!(file, "{}", std::process::id()).map_err(io_err)?;

        log::info!(target: "instance", "holding {}", path.display());
        Ok(Self {
            _file: file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    // flock locks belong to the open file description, so a second open of
    // the same path conflicts even inside one process.
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn try_lock_exclusive(_file: &File) -> io::Result<()> {
    Ok(())
}
