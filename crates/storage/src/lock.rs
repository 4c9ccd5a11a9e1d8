// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Advisory file locks.
//!
//! A single [`LockedFile`] abstraction wraps the platform flock; the
//! merge-queue critical sections and the daemon singleton pid files both
//! build on it. Locks release when the handle drops, so a crashed holder
//! never wedges the system.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An open file holding an exclusive advisory lock.
#[derive(Debug)]
pub struct LockedFile {
    file: File,
    path: PathBuf,
}

impl LockedFile {
    /// Try to take the lock without blocking. `Ok(None)` means another
    /// process holds it.
    ///
    /// Opens without truncating; the file may carry the current holder's
    /// pid, which must survive a failed acquisition attempt.
    pub fn try_exclusive(path: &Path) -> Result<Option<Self>, LockError> {
        let file = open_for_lock(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { file, path: path.to_path_buf() })),
            Err(_) => Ok(None),
        }
    }

    /// Take the lock, blocking until the current holder releases it.
    pub fn exclusive(path: &Path) -> Result<Self, LockError> {
        let file = open_for_lock(path)?;
        file.lock_exclusive().map_err(|source| io_err(path, source))?;
        Ok(Self { file, path: path.to_path_buf() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Truncate and write the current pid; done only after the lock is
    /// held so a losing contender never wipes the winner's pid.
    pub fn write_pid(&mut self) -> Result<(), LockError> {
        self.file.set_len(0).map_err(|source| io_err(&self.path, source))?;
        writeln!(self.file, "{}", std::process::id())
            .map_err(|source| io_err(&self.path, source))
    }
}

impl Drop for LockedFile {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

/// Singleton enforcement for daemons: an exclusive lock on a pid file.
///
/// The pid written inside is informational (for `status` and external
/// tooling); liveness is the lock itself.
#[derive(Debug)]
pub struct PidFile {
    lock: LockedFile,
}

impl PidFile {
    /// Acquire the singleton. `Ok(None)` means a live daemon already
    /// holds it; the caller should exit 0, per the singleton discipline.
    pub fn acquire(path: &Path) -> Result<Option<Self>, LockError> {
        match LockedFile::try_exclusive(path)? {
            Some(mut lock) => {
                lock.write_pid()?;
                Ok(Some(Self { lock }))
            }
            None => Ok(None),
        }
    }

    pub fn path(&self) -> &Path {
        self.lock.path()
    }

    /// Read the pid recorded in a pid file, locked or not.
    pub fn read_pid(path: &Path) -> Option<u32> {
        let mut contents = String::new();
        File::open(path).ok()?.read_to_string(&mut contents).ok()?;
        contents.trim().parse().ok()
    }

    /// Whether some process currently holds the lock.
    pub fn is_held(path: &Path) -> bool {
        match LockedFile::try_exclusive(path) {
            Ok(Some(_probe)) => false,
            Ok(None) => true,
            Err(_) => false,
        }
    }

    /// Release the lock and remove the pid file (orderly shutdown).
    pub fn release(self) -> Result<(), LockError> {
        let path = self.lock.path().to_path_buf();
        drop(self.lock);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(io_err(&path, source)),
        }
    }
}

fn open_for_lock(path: &Path) -> Result<File, LockError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| io_err(parent, source))?;
    }
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|source| io_err(path, source))
}

fn io_err(path: &Path, source: std::io::Error) -> LockError {
    LockError::Io { path: path.to_path_buf(), source }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
