//! Exclusive advisory lock beside an output archive.
//!
//! A builder holds `<archive>.lock` from the staleness check until the new
//! archive is in place. The lock is released when [`OutputLock`] is dropped;
//! the lock file itself is left behind and reused by the next run.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const LOCK_SUFFIX: &str = ".lock";

/// Written into the lock file by the holder, read back on contention.
#[derive(Debug, Serialize, Deserialize)]
pub struct LockMetadata {
    pub pid: u32,
    pub started_at_unix: u64,
    pub command: String,
    pub archive: PathBuf,
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error(
        "{archive} is being built by another process: {command} (PID {pid}, started at unix time {started_at_unix})\n\
         If no other build is running, remove the lock file:\n  {lock_path}"
    )]
    Contention {
        archive: PathBuf,
        command: String,
        pid: u32,
        started_at_unix: u64,
        lock_path: PathBuf,
    },

    #[error(
        "output archive is locked (could not read lock metadata)\n\
         If no other build is running, remove the lock file:\n  {lock_path}"
    )]
    ContentionUnknown { lock_path: PathBuf },

    #[error("failed to open lock file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write lock metadata to {path}: {source}")]
    WriteMetadata {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to lock {path}: {source}")]
    LockFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Held for as long as the output archive is being checked or rebuilt.
#[derive(Debug)]
pub struct OutputLock {
    _file: File,
    lock_path: PathBuf,
}

impl OutputLock {
    /// Take the lock for `archive` without blocking.
    ///
    /// Fails with [`LockError::Contention`] if another process holds it.
    pub fn acquire(archive: &Path, command: &str) -> Result<Self, LockError> {
        let lock_path = lock_path_for(archive);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|source| LockError::Open {
                path: lock_path.clone(),
                source,
            })?;

        if let Err(err) = try_lock(&file) {
            if err.kind() == io::ErrorKind::WouldBlock {
                return Err(read_contention_error(&lock_path));
            }
            return Err(LockError::LockFailed {
                path: lock_path,
                source: err,
            });
        }

        write_metadata(&file, &lock_path, command, archive)?;
        Ok(OutputLock {
            _file: file,
            lock_path,
        })
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

/// `<archive>.lock`
pub fn lock_path_for(archive: &Path) -> PathBuf {
    let mut name = archive.as_os_str().to_owned();
    name.push(LOCK_SUFFIX);
    PathBuf::from(name)
}

fn write_metadata(file: &File, lock_path: &Path, command: &str, archive: &Path) -> Result<(), LockError> {
    let metadata = LockMetadata {
        pid: std::process::id(),
        started_at_unix: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs(),
        command: command.to_string(),
        archive: archive.to_path_buf(),
    };
    let write_err = |source| LockError::WriteMetadata {
        path: lock_path.to_path_buf(),
        source,
    };

    file.set_len(0).map_err(write_err)?;
    let mut writer = io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &metadata).map_err(|e| write_err(io::Error::other(e)))?;
    writer.flush().map_err(write_err)?;
    Ok(())
}

fn read_contention_error(lock_path: &Path) -> LockError {
    let mut contents = String::new();
    let metadata = File::open(lock_path)
        .and_then(|mut f| f.read_to_string(&mut contents))
        .ok()
        .and_then(|_| serde_json::from_str::<LockMetadata>(&contents).ok());

    match metadata {
        Some(m) => LockError::Contention {
            archive: m.archive,
            command: m.command,
            pid: m.pid,
            started_at_unix: m.started_at_unix,
            lock_path: lock_path.to_path_buf(),
        },
        None => LockError::ContentionUnknown {
            lock_path: lock_path.to_path_buf(),
        },
    }
}

#[cfg(unix)]
fn try_lock(file: &File) -> io::Result<()> {
    use rustix::fs::{flock, FlockOperation};
    use std::os::unix::io::AsFd;

    flock(file.as_fd(), FlockOperation::NonBlockingLockExclusive)
        .map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(windows)]
fn try_lock(file: &File) -> io::Result<()> {
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::HANDLE;
    use windows_sys::Win32::Storage::FileSystem::{
        LockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY,
    };

    let handle = file.as_raw_handle() as HANDLE;
    // SAFETY: OVERLAPPED is plain data and valid when zeroed; the handle is
    // owned by `file` for the duration of the call.
    let result = unsafe {
        let mut overlapped = std::mem::zeroed();
        LockFileEx(
            handle,
            LOCKFILE_FAIL_IMMEDIATELY | LOCKFILE_EXCLUSIVE_LOCK,
            0,
            1,
            0,
            &mut overlapped,
        )
    };

    if result == 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}
