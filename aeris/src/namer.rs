//! Sequence-numbered artifact paths inside a date-partitioned archive.
//!
//! Captured images live in a `root/YYYY/MM/DD/` tree with locally
//! increasing three-digit sequence numbers per day. The namer shares the
//! day-rollover concept with the rotating logs but operates on discrete
//! files rather than one append target: each call finds the highest
//! sequence number already on disk for the day and returns the next one.
//!
//! The namer never creates files — the capture task writes the returned
//! path, and that file is what makes the next call advance. Sequence state
//! is recomputed from the directory on every call, so it survives restarts
//! without any persisted counter.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};

use crate::error::{NamerError, Result};

/// Highest sequence number available within one day directory.
const MAX_SEQUENCE: u32 = 999;

/// Artifact file extension.
const SEQUENCE_EXT: &str = "jpg";

/// Builds year/month/day directory paths with increasing sequence numbers.
#[derive(Debug, Clone)]
pub struct DatedSequenceNamer {
    root: PathBuf,
}

impl DatedSequenceNamer {
    /// Creates a namer rooted at the archive directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The archive root this namer builds paths under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the next unused `root/YYYY/MM/DD/NNN.jpg` path for `date`.
    ///
    /// The year, month, and day directories are created as needed
    /// (already-existing directories are fine). An empty day directory
    /// yields `001.jpg`: the missing listing counts as `000` already
    /// taken.
    ///
    /// # Errors
    ///
    /// Returns [`NamerError::NoDirectory`] when the directory chain cannot
    /// be created, [`NamerError::Scan`] when the day directory cannot be
    /// listed, and [`NamerError::SequenceExhausted`] when all 999 slots for
    /// the day are used.
    pub fn next_path(&self, date: NaiveDate) -> Result<PathBuf> {
        let day_dir = self
            .root
            .join(format!("{:04}", date.year()))
            .join(format!("{:02}", date.month()))
            .join(format!("{:02}", date.day()));

        fs::create_dir_all(&day_dir)
            .map_err(|source| NamerError::NoDirectory { path: day_dir.clone(), source })?;

        let next = self.newest_sequence(&day_dir)? + 1;
        if next > MAX_SEQUENCE {
            return Err(NamerError::SequenceExhausted { path: day_dir }.into());
        }

        Ok(day_dir.join(format!("{next:03}.{SEQUENCE_EXT}")))
    }

    /// Highest sequence number present in the day directory, or 0.
    fn newest_sequence(&self, day_dir: &Path) -> Result<u32> {
        let entries = fs::read_dir(day_dir)
            .map_err(|source| NamerError::Scan { path: day_dir.to_path_buf(), source })?;

        let mut newest = 0;
        for entry in entries {
            let entry = entry
                .map_err(|source| NamerError::Scan { path: day_dir.to_path_buf(), source })?;
            if let Some(seq) = parse_sequence(&entry.path()) {
                newest = newest.max(seq);
            }
        }
        Ok(newest)
    }
}

/// Parses `NNN.jpg` file names; anything else is ignored.
fn parse_sequence(path: &Path) -> Option<u32> {
    if !path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(SEQUENCE_EXT))
    {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.len() != 3 || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[test]
    fn test_empty_day_directory_starts_at_001() {
        let root = tempdir().unwrap();
        let namer = DatedSequenceNamer::new(root.path());

        let first = namer.next_path(date()).unwrap();
        assert_eq!(first, root.path().join("2024/06/15/001.jpg"));

        // The capture task writes the file; the next call advances.
        fs::write(&first, b"frame").unwrap();
        let second = namer.next_path(date()).unwrap();
        assert_eq!(second, root.path().join("2024/06/15/002.jpg"));
    }

    #[test]
    fn test_sequence_resumes_from_newest_existing_file() {
        let root = tempdir().unwrap();
        let day_dir = root.path().join("2024/06/15");
        fs::create_dir_all(&day_dir).unwrap();
        fs::write(day_dir.join("001.jpg"), b"a").unwrap();
        fs::write(day_dir.join("017.jpg"), b"b").unwrap();
        fs::write(day_dir.join("004.jpg"), b"c").unwrap();

        let namer = DatedSequenceNamer::new(root.path());
        let next = namer.next_path(date()).unwrap();
        assert_eq!(next, day_dir.join("018.jpg"));
    }

    #[test]
    fn test_non_sequence_files_are_ignored() {
        let root = tempdir().unwrap();
        let day_dir = root.path().join("2024/06/15");
        fs::create_dir_all(&day_dir).unwrap();
        fs::write(day_dir.join("current.jpg"), b"x").unwrap();
        fs::write(day_dir.join("12.jpg"), b"x").unwrap();
        fs::write(day_dir.join("1234.jpg"), b"x").unwrap();
        fs::write(day_dir.join("042.txt"), b"x").unwrap();

        let namer = DatedSequenceNamer::new(root.path());
        let next = namer.next_path(date()).unwrap();
        assert_eq!(next, day_dir.join("001.jpg"));
    }

    #[test]
    fn test_days_are_numbered_independently() {
        let root = tempdir().unwrap();
        let namer = DatedSequenceNamer::new(root.path());

        let first = namer.next_path(date()).unwrap();
        fs::write(&first, b"frame").unwrap();

        let other_day = NaiveDate::from_ymd_opt(2024, 6, 16).unwrap();
        let other = namer.next_path(other_day).unwrap();
        assert_eq!(other, root.path().join("2024/06/16/001.jpg"));
    }

    #[test]
    fn test_sequence_space_is_bounded() {
        let root = tempdir().unwrap();
        let day_dir = root.path().join("2024/06/15");
        fs::create_dir_all(&day_dir).unwrap();
        fs::write(day_dir.join("999.jpg"), b"x").unwrap();

        let namer = DatedSequenceNamer::new(root.path());
        assert!(namer.next_path(date()).is_err());
    }
}
