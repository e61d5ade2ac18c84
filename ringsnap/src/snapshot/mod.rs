
use serde::{de::DeserializeOwned, Serialize};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::SnapshotError;

/// Suffix of the scratch file a snapshot is written to before it is renamed
/// over the real path.
pub const TEMP_EXT: &str = ".temp";

/// A single JSON snapshot file on local disk.
///
/// # Atomicity
///
/// `save` never writes the target path directly. The encoded bytes go to
/// `<path>.temp`, are synced to disk, and the temp file is then renamed over
/// `<path>`. A crash mid-write leaves the previous snapshot intact.
///
/// # Missing files
///
/// `load` treats a missing snapshot as "nothing saved yet" and returns
/// `Ok(None)` instead of an error.
///
/// # Example
/// ```rust,no_run
/// use ringsnap::snapshot::SnapshotStore;
///
/// let store = SnapshotStore::new("/var/lib/app/orders.json");
/// store.save(&vec![1, 2, 3]).unwrap();
/// let back: Option<Vec<i32>> = store.load().unwrap();
/// assert_eq!(back, Some(vec![1, 2, 3]));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotStore {
  path: PathBuf,
}

impl SnapshotStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Path of the scratch file used while saving.
  pub fn temp_path(&self) -> PathBuf {
    let mut raw: OsString = self.path.clone().into_os_string();
    raw.push(TEMP_EXT);
    PathBuf::from(raw)
  }

  /// Encodes `data` as JSON and atomically replaces the snapshot file.
  ///
  /// The parent directory is created when missing.
  pub fn save<T: Serialize + ?Sized>(&self, data: &T) -> Result<(), SnapshotError> {
    if let Some(dir) = self.path.parent() {
      if !dir.as_os_str().is_empty() {
        fs::create_dir_all(dir).map_err(|source| SnapshotError::CreateDir {
          path: dir.to_path_buf(),
          source,
        })?;
      }
    }

    let bytes = serde_json::to_vec(data).map_err(|source| SnapshotError::Encode {
      path: self.path.clone(),
      source,
    })?;

    let tmp = self.temp_path();
    Self::write_synced(&tmp, &bytes).map_err(|source| SnapshotError::Write {
      path: tmp.clone(),
      source,
    })?;

    fs::rename(&tmp, &self.path).map_err(|source| SnapshotError::Rename {
      path: self.path.clone(),
      source,
    })?;

    Ok(())
  }

  /// Reads and decodes the snapshot file.
  ///
  /// Returns `Ok(None)` when the file does not exist.
  pub fn load<T: DeserializeOwned>(&self) -> Result<Option<T>, SnapshotError> {
    let bytes = match fs::read(&self.path) {
      Ok(bytes) => bytes,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(source) => {
        return Err(SnapshotError::Read {
          path: self.path.clone(),
          source,
        })
      },
    };

    serde_json::from_slice(&bytes)
      .map(Some)
      .map_err(|source| SnapshotError::Decode {
        path: self.path.clone(),
        source,
      })
  }

  fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut f = File::create(path)?;
    f.write_all(bytes)?;
    f.sync_all()
  }
}
