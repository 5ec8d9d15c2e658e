//! File-based store locking for mutual exclusion between engine processes.
//!
//! The build loop is serial by design; the lock keeps two *processes* from
//! interleaving store mutations (builds, GC, vase changes).

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const LOCK_FILENAME: &str = ".lock";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
  Shared,
  Exclusive,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LockMetadata {
  pub version: u32,
  pub pid: u32,
  pub started_at_unix: u64,
  pub command: String,
  pub root: PathBuf,
}

#[derive(Debug, Error)]
pub enum StoreLockError {
  #[error(
    "store is locked by another process: {command} (PID {pid}, started {started_at_unix})\n\
     If you're sure no kintsugi process is running, remove the lock file:\n  {lock_path}"
  )]
  Contention {
    command: String,
    pid: u32,
    started_at_unix: u64,
    lock_path: PathBuf,
  },

  #[error(
    "store is locked (could not read lock metadata)\n\
     If you're sure no kintsugi process is running, remove the lock file:\n  {lock_path}"
  )]
  ContentionUnknown { lock_path: PathBuf },

  #[error("failed to create store root: {0}")]
  CreateDir(#[source] io::Error),

  #[error("failed to open lock file: {0}")]
  OpenFile(#[source] io::Error),

  #[error("failed to write lock metadata: {0}")]
  WriteMetadata(#[source] io::Error),

  #[error("failed to acquire lock: {0}")]
  LockFailed(#[source] io::Error),
}

pub struct StoreLock {
  _file: File,
  lock_path: PathBuf,
}

impl StoreLock {
  pub fn acquire(root: &Path, mode: LockMode, command: &str) -> Result<Self, StoreLockError> {
    let lock_path = root.join(LOCK_FILENAME);

    if !root.exists() {
      std::fs::create_dir_all(root).map_err(StoreLockError::CreateDir)?;
    }

    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&lock_path)
      .map_err(StoreLockError::OpenFile)?;

    if let Err(err) = try_lock(&file, mode) {
      if err.kind() == io::ErrorKind::WouldBlock {
        return Err(Self::read_contention_error(&lock_path));
      }
      return Err(StoreLockError::LockFailed(err));
    }

    if mode == LockMode::Exclusive {
      Self::write_metadata(&file, command, root)?;
    }

    Ok(StoreLock { _file: file, lock_path })
  }

  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }

  fn write_metadata(file: &File, command: &str, root: &Path) -> Result<(), StoreLockError> {
    let metadata = LockMetadata {
      version: 1,
      pid: std::process::id(),
      started_at_unix: SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs(),
      command: command.to_string(),
      root: root.to_path_buf(),
    };

    file.set_len(0).map_err(StoreLockError::WriteMetadata)?;
    let mut writer = io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &metadata)
      .map_err(|e| StoreLockError::WriteMetadata(io::Error::other(e)))?;
    writer.flush().map_err(StoreLockError::WriteMetadata)?;

    Ok(())
  }

  fn read_contention_error(lock_path: &Path) -> StoreLockError {
    if let Ok(mut file) = File::open(lock_path) {
      let mut contents = String::new();
      if file.read_to_string(&mut contents).is_ok()
        && let Ok(metadata) = serde_json::from_str::<LockMetadata>(&contents)
      {
        return StoreLockError::Contention {
          command: metadata.command,
          pid: metadata.pid,
          started_at_unix: metadata.started_at_unix,
          lock_path: lock_path.to_path_buf(),
        };
      }
    }

    StoreLockError::ContentionUnknown {
      lock_path: lock_path.to_path_buf(),
    }
  }
}

fn try_lock(file: &File, mode: LockMode) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};
  use std::os::fd::AsFd;

  let operation = match mode {
    LockMode::Shared => FlockOperation::NonBlockingLockShared,
    LockMode::Exclusive => FlockOperation::NonBlockingLockExclusive,
  };

  flock(file.as_fd(), operation).map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}
