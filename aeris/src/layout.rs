//! Station data directory lifecycle.
//!
//! All persistent output lives under one root on the removable storage
//! device:
//!
//! ```text
//! data_root/
//! ├── meta.json          <- Layout version marker
//! ├── logs/
//! │   ├── CURRENT.CSV    <- Plain delimited log (rotating)
//! │   ├── CURRENT.JSO    <- Bracketed structured log (rotating)
//! │   ├── DDMMYY.CSV     <- Dated archives
//! │   └── avg/
//! │       └── CURRENT.CSV  <- Averaged log (rotating, same scheme)
//! └── dcim/
//!     └── YYYY/MM/DD/NNN.jpg  <- Date-partitioned image archive
//! ```
//!
//! Opening is create-or-validate: missing directories are created, existing
//! ones are tolerated everywhere, and an existing `meta.json` must carry a
//! version this build understands.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{LayoutError, Result};

/// Layout format version.
const METADATA_VERSION: u32 = 1;

/// Name of the metadata file in the data root.
const METADATA_FILE: &str = "meta.json";

/// Log directory, relative to the data root.
const LOGS_DIR: &str = "logs";

/// Averaged-log directory, relative to the data root.
const AVG_LOGS_DIR: &str = "logs/avg";

/// Image archive directory, relative to the data root.
const IMAGES_DIR: &str = "dcim";

/// Name of the temporary file used by the storage-health probe.
const PROBE_FILE: &str = ".probe";

/// Metadata stored in the data root's meta.json file.
#[derive(Debug, Serialize, Deserialize)]
struct LayoutMetadata {
    /// Layout format version.
    version: u32,
}

/// Opened station data directory.
///
/// The directory (and the storage device beneath it) is shared by every
/// logger task and the capture task. There is deliberately no cross-task
/// lock around [`StationLayout::ensure_writable`]: the probe may race a
/// concurrent writer, which at worst produces one extra failed-and-retried
/// write cycle.
#[derive(Debug, Clone)]
pub struct StationLayout {
    root: PathBuf,
    logs_dir: PathBuf,
    avg_logs_dir: PathBuf,
    images_dir: PathBuf,
}

impl StationLayout {
    /// Creates or opens the station data directory at `root`.
    ///
    /// A fresh root gets the full directory tree and a version-stamped
    /// `meta.json`. An existing root is validated: the version must match
    /// and missing subdirectories are recreated.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::DirectoryAccess`] when a directory cannot be
    /// created, [`LayoutError::CorruptedMetadata`] /
    /// [`LayoutError::VersionMismatch`] for a bad `meta.json`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let layout = Self {
            logs_dir: root.join(LOGS_DIR),
            avg_logs_dir: root.join(AVG_LOGS_DIR),
            images_dir: root.join(IMAGES_DIR),
            root,
        };

        layout.create_tree()?;

        let metadata_path = layout.root.join(METADATA_FILE);
        if metadata_path.exists() {
            layout.validate_metadata(&metadata_path)?;
        } else {
            layout.write_metadata(&metadata_path)?;
            info!("initialized station data directory at '{}'", layout.root.display());
        }

        Ok(layout)
    }

    /// The data root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the plain and structured rotating logs.
    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    /// Directory holding the averaged rotating log.
    pub fn avg_logs_dir(&self) -> &Path {
        &self.avg_logs_dir
    }

    /// Root of the date-partitioned image archive.
    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Reactive storage-health check: recreate the tree and probe a write.
    ///
    /// Called by writer tasks after a failed open. Storage trouble is
    /// detected reactively (a failed open), never proactively; recovery is
    /// recreating the directory tree and verifying one small write.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::ProbeFailed`] when the probe write fails —
    /// the caller logs it and keeps sampling; the next cycle retries.
    pub fn ensure_writable(&self) -> Result<()> {
        self.create_tree()?;

        let probe = self.root.join(PROBE_FILE);
        fs::write(&probe, b"probe")
            .map_err(|source| LayoutError::ProbeFailed { path: probe.clone(), source })?;
        if let Err(e) = fs::remove_file(&probe) {
            // Leftover probe files are harmless; the next probe overwrites.
            warn!("could not remove probe file '{}': {e}", probe.display());
        }
        info!("storage probe succeeded at '{}'", self.root.display());
        Ok(())
    }

    fn create_tree(&self) -> Result<()> {
        for dir in [&self.root, &self.logs_dir, &self.avg_logs_dir, &self.images_dir] {
            fs::create_dir_all(dir)
                .map_err(|source| LayoutError::DirectoryAccess { path: dir.clone(), source })?;
        }
        Ok(())
    }

    fn write_metadata(&self, path: &Path) -> Result<()> {
        let metadata = LayoutMetadata { version: METADATA_VERSION };
        let json = serde_json::to_string_pretty(&metadata)
            .map_err(LayoutError::MetadataSerialize)?;
        fs::write(path, json).map_err(|source| LayoutError::DirectoryAccess {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    fn validate_metadata(&self, path: &Path) -> Result<()> {
        let json = fs::read_to_string(path).map_err(|source| LayoutError::DirectoryAccess {
            path: path.to_path_buf(),
            source,
        })?;
        let metadata: LayoutMetadata = serde_json::from_str(&json).map_err(|e| {
            LayoutError::CorruptedMetadata { reason: format!("invalid meta.json: {e}") }
        })?;

        if metadata.version != METADATA_VERSION {
            return Err(LayoutError::VersionMismatch {
                expected: METADATA_VERSION,
                found: metadata.version,
            }
            .into());
        }
        Ok(())
    }
}
