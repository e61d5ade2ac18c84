
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by positional and search operations on a [`RingQueue`].
///
/// [`RingQueue`]: crate::queue::RingQueue
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
  /// The operation needs at least one live item.
  #[error("queue is empty")]
  Empty,

  /// A scan finished without any item matching.
  #[error("item not found")]
  ItemNotFound,

  /// A raw slot index does not point at a live item.
  #[error("index out of range")]
  IndexOutOfRange,
}

/// Failures while writing or reading a snapshot file.
///
/// Every variant carries the path it was working on so a log line alone is
/// enough to diagnose the problem.
#[derive(Debug, Error)]
pub enum SnapshotError {
  #[error("mkdir snapshot dir [{}] failed: {source}", .path.display())]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("encode snapshot data [{}] failed: {source}", .path.display())]
  Encode {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("write snapshot file [{}] failed: {source}", .path.display())]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("rename snapshot file [{}] failed: {source}", .path.display())]
  Rename {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("read snapshot file [{}] failed: {source}", .path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("decode snapshot file [{}] failed: {source}", .path.display())]
  Decode {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

impl SnapshotError {
  /// The snapshot path the failing step was operating on.
  pub fn path(&self) -> &PathBuf {
    match self {
      SnapshotError::CreateDir { path, .. }
      | SnapshotError::Encode { path, .. }
      | SnapshotError::Write { path, .. }
      | SnapshotError::Rename { path, .. }
      | SnapshotError::Read { path, .. }
      | SnapshotError::Decode { path, .. } => path,
    }
  }
}

/// Errors raised by the persistence driver while bringing snapshots up.
#[derive(Debug, Error)]
pub enum PersistError {
  #[error("load snapshot [{name}] failed: {source}")]
  Load {
    name: String,
    #[source]
    source: SnapshotError,
  },

  #[error("spawn save worker failed: {0}")]
  Spawn(#[from] io::Error),
}

/// Errors raised while reading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("read config file [{}] failed: {source}", .path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("parse config file [{}] failed: {source}", .path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}
