//! Configuration for queues and the process around them.
//!
//! Every field has a default, so a partial (or missing) config file is
//! always usable. Files are JSON, matching the snapshot format.

mod __test__;

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::queue::{DEFAULT_NAME, DEFAULT_STEP};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
  /// Maximum log level: `trace`, `debug`, `info`, `warn` or `error`.
  #[serde(default = "default_log_level")]
  pub log_level: String,

  /// Recent log events kept in memory. Zero disables capture.
  #[serde(default = "default_log_capture")]
  pub log_capture: usize,

  /// Queues managed by the persistence driver.
  #[serde(default)]
  pub queues: Vec<QueueConfig>,
}

/// Settings of a single [`RingQueue`](crate::queue::RingQueue).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct QueueConfig {
  /// Name used in persistence log lines.
  #[serde(default = "default_name")]
  pub name: String,

  /// Slots added per growth; zero selects the default.
  #[serde(default = "default_step")]
  pub step: usize,

  /// Emit a debug trace line for every push, pop and resize.
  #[serde(default)]
  pub trace: bool,

  /// Snapshot file. Without one the queue is memory-only.
  #[serde(default)]
  pub snapshot_path: Option<PathBuf>,

  /// Seconds between periodic saves. Zero only saves at shutdown.
  #[serde(default)]
  pub save_interval_secs: u64,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      log_level: default_log_level(),
      log_capture: default_log_capture(),
      queues: Vec::new(),
    }
  }
}

impl Default for QueueConfig {
  fn default() -> Self {
    Self {
      name: default_name(),
      step: default_step(),
      trace: false,
      snapshot_path: None,
      save_interval_secs: 0,
    }
  }
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_log_capture() -> usize {
  200
}

fn default_name() -> String {
  DEFAULT_NAME.to_string()
}

fn default_step() -> usize {
  DEFAULT_STEP
}

impl Config {
  /// Loads configuration from a JSON file.
  ///
  /// A missing file yields [`Config::default`].
  /// # Errors
  /// Returns an error if the file exists but cannot be read or parsed.
  pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let raw = match fs::read_to_string(path) {
      Ok(raw) => raw,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
      Err(source) => {
        return Err(ConfigError::Read {
          path: path.to_path_buf(),
          source,
        })
      },
    };

    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }
}
