//! Rotating append-only log files with exact local-day boundaries.
//!
//! One [`RotatingLog`] manages a single `CURRENT.<ext>` file: it is begun
//! with a format-specific begin marker, appended to one record at a time,
//! and — exactly once per calendar-day transition — finished with the
//! format's end marker and renamed to a `DDMMYY.<ext>` archive before a
//! fresh current file is begun.
//!
//! Crash consistency comes from the file lifecycle, not from buffering:
//! every append is an independent open/write/close cycle, so a power loss
//! mid-cycle costs at most the in-flight record. A restart that happens
//! after midnight is recovered by [`RotatingLog::resume_or_begin`], which
//! compares the current file's modification day against today and archives
//! it under its own date when it is stale.
//!
//! The engine is instantiated once per log format ([`CsvFormat`],
//! [`JsonFormat`], [`AvgCsvFormat`]); each instance has exactly one writer
//! task, which is what makes the non-atomic rotate-then-append sequence
//! safe.

use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Local};
use tracing::{info, warn};

use crate::error::{LogError, Result};
use crate::measurement::Measurement;

/// Highest disambiguating suffix tried when an archive name collides.
const MAX_ARCHIVE_SUFFIX: u32 = 99;

/// A record format for one rotating log instance.
///
/// Implementations define the begin marker written to a fresh file, the
/// shape of one appended record, and (optionally) how a file is finished at
/// rotation. Record strings carry their own trailing separators.
pub trait RecordFormat {
    /// Archive/current file extension, without the dot (e.g. `"CSV"`).
    fn extension(&self) -> &'static str;

    /// Marker a fresh current file starts with.
    fn begin_marker(&self) -> &'static str;

    /// Formats one record for the given wall-clock epoch and measurement.
    fn format_record(&self, epoch: i64, m: &Measurement) -> String;

    /// Writes the format's end marker before the file is archived.
    ///
    /// The default is a no-op (most formats need no terminator).
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Finish`] when the end marker cannot be written.
    fn finish(&self, path: &Path) -> Result<()> {
        let _ = path;
        Ok(())
    }
}

/// Plain comma-delimited records with a header row.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvFormat;

impl RecordFormat for CsvFormat {
    fn extension(&self) -> &'static str {
        "CSV"
    }

    fn begin_marker(&self) -> &'static str {
        "time,int_t,ext_t,humi,sun,press\n"
    }

    #[allow(clippy::cast_possible_truncation)] // humidity is logged as a whole percent
    fn format_record(&self, epoch: i64, m: &Measurement) -> String {
        format!(
            "{},{:.2},{:.2},{},{:.2},{:.2}\n",
            epoch,
            m.temp_internal_c,
            m.temp_external_c,
            m.humidity_pct as i64,
            m.light_lux,
            m.pressure_hpa,
        )
    }
}

/// Bracket-wrapped structured records: a JSON array built incrementally.
///
/// A live file looks like `[<obj>,\n<obj>,\n` — each record is followed by
/// a comma separator so appends stay independent. Finishing replaces the
/// trailing separator with the closing bracket, leaving valid JSON. A
/// zero-record file finishes as `[]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat;

impl RecordFormat for JsonFormat {
    fn extension(&self) -> &'static str {
        "JSO"
    }

    fn begin_marker(&self) -> &'static str {
        "["
    }

    #[allow(clippy::cast_possible_truncation)] // humidity is logged as a whole percent
    fn format_record(&self, epoch: i64, m: &Measurement) -> String {
        format!(
            "{{\"time\":\"{}\",\"int_t\":{:.2},\"ext_t\":{:.2},\"humi\":{},\"sun\":{:.2},\"press\":{:.2},\"wind\":{:.3}}},\n",
            epoch,
            m.temp_internal_c,
            m.temp_external_c,
            m.humidity_pct as i64,
            m.light_lux,
            m.pressure_hpa,
            m.wind_ms,
        )
    }

    fn finish(&self, path: &Path) -> Result<()> {
        let finish_err = |source| LogError::Finish { path: path.to_path_buf(), source };

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(finish_err)?;
        let len = file.metadata().map_err(finish_err)?.len();

        if len >= 2 {
            file.seek(SeekFrom::End(-2)).map_err(finish_err)?;
            let mut tail = [0u8; 2];
            file.read_exact(&mut tail).map_err(finish_err)?;
            if &tail == b",\n" {
                // Drop the separator left by the last append.
                file.set_len(len - 2).map_err(finish_err)?;
            } else {
                warn!(
                    "log file '{}' does not end with a record separator; closing it anyway",
                    path.display()
                );
            }
        }

        file.seek(SeekFrom::End(0)).map_err(finish_err)?;
        file.write_all(b"]").map_err(finish_err)?;
        Ok(())
    }
}

/// Comma-delimited records for the time-windowed averaging log.
///
/// Same scheme as [`CsvFormat`] plus the wind column, which only exists in
/// averaged form.
#[derive(Debug, Clone, Copy, Default)]
pub struct AvgCsvFormat;

impl RecordFormat for AvgCsvFormat {
    fn extension(&self) -> &'static str {
        "CSV"
    }

    fn begin_marker(&self) -> &'static str {
        "time,int_t,ext_t,humi,sun,press,wind\n"
    }

    #[allow(clippy::cast_possible_truncation)] // humidity is logged as a whole percent
    fn format_record(&self, epoch: i64, m: &Measurement) -> String {
        format!(
            "{},{:.2},{:.2},{},{:.2},{:.2},{:.3}\n",
            epoch,
            m.temp_internal_c,
            m.temp_external_c,
            m.humidity_pct as i64,
            m.light_lux,
            m.pressure_hpa,
            m.wind_ms,
        )
    }
}

/// A calendar day identified by year and day-of-year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayStamp {
    /// Calendar year.
    pub year: i32,
    /// Day of year, 1..=366.
    pub ordinal: u32,
}

impl DayStamp {
    /// The day a local instant falls on.
    pub fn of(dt: &DateTime<Local>) -> Self {
        Self { year: dt.year(), ordinal: dt.ordinal() }
    }

    /// Whether this day is strictly earlier than `other`.
    pub fn is_before(&self, other: &DayStamp) -> bool {
        self.year < other.year || (self.year == other.year && self.ordinal < other.ordinal)
    }
}

/// Shared day-rollover detector.
///
/// Each rotating log owns one tracker; the first observation latches the
/// current day, and every subsequent calendar-day change reports exactly
/// once. The three log writers previously each carried their own copy of
/// this comparison; it lives here once.
#[derive(Debug, Clone, Copy, Default)]
pub struct DayTracker {
    last: Option<DayStamp>,
}

impl DayTracker {
    /// Creates an unlatched tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports whether `now` falls on a different day than the previous
    /// call. The first call latches the day and reports `false`.
    pub fn day_changed(&mut self, now: &DateTime<Local>) -> bool {
        let today = DayStamp::of(now);
        match self.last {
            None => {
                self.last = Some(today);
                false
            }
            Some(last) if last != today => {
                self.last = Some(today);
                true
            }
            Some(_) => false,
        }
    }
}

/// Lifecycle manager for one rotating append-only log file.
///
/// Holds no open file descriptor: every operation opens, acts, and closes.
pub struct RotatingLog<F> {
    format: F,
    dir: PathBuf,
    current_path: PathBuf,
    tracker: DayTracker,
}

impl<F: RecordFormat> RotatingLog<F> {
    /// Creates a rotating log writing `CURRENT.<ext>` inside `dir`.
    ///
    /// The directory must already exist (see `StationLayout`); nothing is
    /// touched on disk until the first lifecycle call.
    pub fn new(dir: impl Into<PathBuf>, format: F) -> Self {
        let dir = dir.into();
        let current_path = dir.join(format!("CURRENT.{}", format.extension()));
        Self { format, dir, current_path, tracker: DayTracker::new() }
    }

    /// Path of the actively appended current file.
    pub fn current_path(&self) -> &Path {
        &self.current_path
    }

    /// Ensures a current file for today exists, archiving a stale one.
    ///
    /// Runs once at task start. A missing current file is begun fresh. An
    /// existing one is kept when its last modification falls on today;
    /// otherwise it is finished, archived under its modification date, and
    /// replaced — which recovers correctly from a restart that happened
    /// after midnight while the file was never rotated.
    ///
    /// # Errors
    ///
    /// Returns a [`LogError`] when the file cannot be stat'ed, finished,
    /// renamed, or recreated.
    pub fn resume_or_begin(&mut self, now: DateTime<Local>) -> Result<()> {
        let meta = match fs::metadata(&self.current_path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return self.begin();
            }
            Err(source) => {
                return Err(LogError::Stat {
                    path: self.current_path.clone(),
                    source,
                }
                .into());
            }
        };

        let modified: DateTime<Local> = meta
            .modified()
            .map_err(|source| LogError::Stat { path: self.current_path.clone(), source })?
            .into();
        info!(
            "current log file '{}' last modified {}",
            self.current_path.display(),
            modified.format("%Y-%m-%d"),
        );

        if DayStamp::of(&modified).is_before(&DayStamp::of(&now)) {
            info!("stale current log found at start; archiving under its modification date");
            self.format.finish(&self.current_path)?;
            self.archive(&modified)?;
            self.begin()?;
        }
        Ok(())
    }

    /// Rotates the log when a calendar-day transition is observed.
    ///
    /// Called every log cycle before writing. On the first call per day
    /// change the current file is finished, archived under *yesterday's*
    /// date (now − 24 h — the day the records belong to, not the newly
    /// observed one), and begun fresh. Returns whether rotation happened.
    ///
    /// # Errors
    ///
    /// Returns a [`LogError`] when finishing, renaming, or recreating the
    /// current file fails.
    pub fn rotate_if_day_changed(&mut self, now: DateTime<Local>) -> Result<bool> {
        if !self.tracker.day_changed(&now) {
            return Ok(false);
        }

        info!("new day, new log file; renaming current log to yesterday's date");
        self.format.finish(&self.current_path)?;
        let yesterday = now - chrono::Duration::hours(24);
        self.archive(&yesterday)?;
        self.begin()?;
        Ok(true)
    }

    /// Appends one record as an independent open/write/close cycle.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Append`] on failure; the caller logs it, skips
    /// the cycle, and retries next time.
    pub fn append(&self, epoch: i64, m: &Measurement) -> Result<()> {
        let record = self.format.format_record(epoch, m);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.current_path)
            .map_err(|source| LogError::Append { path: self.current_path.clone(), source })?;
        file.write_all(record.as_bytes())
            .map_err(|source| LogError::Append { path: self.current_path.clone(), source })?;
        Ok(())
    }

    /// Creates (or recreates) the current file holding only the begin marker.
    fn begin(&self) -> Result<()> {
        fs::write(&self.current_path, self.format.begin_marker())
            .map_err(|source| LogError::Create { path: self.current_path.clone(), source })?;
        Ok(())
    }

    /// Renames the current file to its dated archive name.
    ///
    /// When the base `DDMMYY.<ext>` name is taken, disambiguating suffixes
    /// `DDMMYY.1.<ext>` … are tried in order.
    fn archive(&self, date: &DateTime<Local>) -> Result<PathBuf> {
        let mut target = self.dir.join(self.archive_file_name(date, None));

        if target.exists() {
            warn!("archive '{}' already exists; picking a suffixed name", target.display());
            target = self.suffixed_archive_path(date)?;
        }

        info!("renaming '{}' to '{}'", self.current_path.display(), target.display());
        fs::rename(&self.current_path, &target).map_err(|source| LogError::Rename {
            from: self.current_path.clone(),
            to: target.clone(),
            source,
        })?;
        Ok(target)
    }

    fn suffixed_archive_path(&self, date: &DateTime<Local>) -> Result<PathBuf> {
        for suffix in 1..=MAX_ARCHIVE_SUFFIX {
            let candidate = self.dir.join(self.archive_file_name(date, Some(suffix)));
            if !candidate.exists() {
                return Ok(candidate);
            }
        }
        Err(LogError::ArchiveNamesExhausted {
            path: self.dir.join(self.archive_file_name(date, None)),
        }
        .into())
    }

    /// Archive name for a date: `DDMMYY.<ext>`, e.g. `091222.CSV`.
    fn archive_file_name(&self, date: &DateTime<Local>, suffix: Option<u32>) -> String {
        let short_year = date.year().rem_euclid(100);
        match suffix {
            None => format!(
                "{:02}{:02}{:02}.{}",
                date.day(),
                date.month(),
                short_year,
                self.format.extension(),
            ),
            Some(n) => format!(
                "{:02}{:02}{:02}.{}.{}",
                date.day(),
                date.month(),
                short_year,
                n,
                self.format.extension(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tempfile::tempdir;

    use super::*;

    fn local(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
    }

    // Values chosen exactly representable in binary so `{:.2}` rounding
    // is unambiguous.
    fn sample() -> Measurement {
        Measurement {
            light_lux: 812.5,
            temp_internal_c: 21.25,
            temp_external_c: -4.5,
            humidity_pct: 71.6,
            pressure_hpa: 1013.25,
            altitude_m: 115.0,
            wind_ms: 3.125,
            probe_status: 0,
            timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn test_day_tracker_latches_then_fires_once() {
        let mut tracker = DayTracker::new();

        assert!(!tracker.day_changed(&local(2024, 6, 15, 8)), "first call latches");
        assert!(!tracker.day_changed(&local(2024, 6, 15, 23)));
        assert!(tracker.day_changed(&local(2024, 6, 16, 0)), "fires on the transition");
        assert!(!tracker.day_changed(&local(2024, 6, 16, 12)), "fires only once");
        assert!(tracker.day_changed(&local(2025, 6, 16, 0)), "year change alone fires");
    }

    #[test]
    fn test_day_stamp_ordering() {
        let dec = DayStamp::of(&local(2023, 12, 31, 23));
        let jan = DayStamp::of(&local(2024, 1, 1, 0));

        assert!(dec.is_before(&jan), "earlier year wins despite larger ordinal");
        assert!(!jan.is_before(&dec));
        assert!(!jan.is_before(&jan));
    }

    #[test]
    fn test_csv_record_layout() {
        let record = CsvFormat.format_record(1_700_000_000, &sample());
        assert_eq!(record, "1700000000,21.25,-4.50,71,812.50,1013.25\n");
    }

    #[test]
    fn test_avg_csv_record_has_wind_column() {
        let record = AvgCsvFormat.format_record(1_700_000_000, &sample());
        assert_eq!(record, "1700000000,21.25,-4.50,71,812.50,1013.25,3.125\n");
    }

    #[test]
    fn test_json_record_is_an_object_with_separator() {
        let record = JsonFormat.format_record(1_700_000_000, &sample());
        assert!(record.ends_with(",\n"));

        let object: serde_json::Value =
            serde_json::from_str(record.trim_end_matches(",\n")).unwrap();
        assert_eq!(object["time"], "1700000000");
        assert_eq!(object["humi"], 71);
        assert_eq!(object["wind"], 3.125);
    }

    #[test]
    fn test_json_finish_replaces_trailing_separator() {
        let dir = tempdir().unwrap();
        let mut log = RotatingLog::new(dir.path(), JsonFormat);

        log.resume_or_begin(local(2024, 6, 15, 8)).unwrap();
        assert_eq!(fs::read_to_string(log.current_path()).unwrap(), "[");

        log.append(1_700_000_000, &sample()).unwrap();
        let live = fs::read_to_string(log.current_path()).unwrap();
        assert!(live.starts_with('['));
        assert!(live.ends_with(",\n"));

        JsonFormat.finish(log.current_path()).unwrap();
        let finished = fs::read_to_string(log.current_path()).unwrap();
        assert!(finished.ends_with(']'));
        serde_json::from_str::<serde_json::Value>(&finished).expect("finished log is valid JSON");
    }

    #[test]
    fn test_json_finish_on_zero_record_file_yields_empty_array() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("CURRENT.JSO");
        fs::write(&path, "[").unwrap();

        JsonFormat.finish(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
    }

    #[test]
    fn test_json_finish_tolerates_missing_separator() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("CURRENT.JSO");
        fs::write(&path, "[{\"time\":\"1\"}").unwrap();

        JsonFormat.finish(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[{\"time\":\"1\"}]");
    }

    #[test]
    fn test_begin_then_append_csv() {
        let dir = tempdir().unwrap();
        let mut log = RotatingLog::new(dir.path(), CsvFormat);

        log.resume_or_begin(local(2024, 6, 15, 8)).unwrap();
        log.append(1_700_000_000, &sample()).unwrap();
        log.append(1_700_000_001, &sample()).unwrap();

        let contents = fs::read_to_string(log.current_path()).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("time,int_t,ext_t,humi,sun,press"));
        assert_eq!(lines.clone().count(), 2);
        assert!(lines.all(|l| l.starts_with("17000000")));
    }

    #[test]
    fn test_rotation_archives_under_yesterdays_date() {
        let dir = tempdir().unwrap();
        let mut log = RotatingLog::new(dir.path(), CsvFormat);

        log.resume_or_begin(local(2024, 6, 15, 8)).unwrap();
        log.append(1, &sample()).unwrap();

        // Same day: no rotation.
        assert!(!log.rotate_if_day_changed(local(2024, 6, 15, 23)).unwrap());

        // Day change: archive named for June 15, not June 16.
        assert!(log.rotate_if_day_changed(local(2024, 6, 16, 0)).unwrap());
        assert!(dir.path().join("150624.CSV").exists());

        let fresh = fs::read_to_string(log.current_path()).unwrap();
        assert_eq!(fresh, CsvFormat.begin_marker());
    }

    #[test]
    fn test_archive_collision_picks_suffixed_name() {
        let dir = tempdir().unwrap();
        let mut log = RotatingLog::new(dir.path(), CsvFormat);

        // Occupy the base archive name for June 15.
        fs::write(dir.path().join("150624.CSV"), "older archive\n").unwrap();

        log.resume_or_begin(local(2024, 6, 15, 8)).unwrap();
        assert!(!log.rotate_if_day_changed(local(2024, 6, 15, 9)).unwrap());
        log.append(1, &sample()).unwrap();
        assert!(log.rotate_if_day_changed(local(2024, 6, 16, 0)).unwrap());

        assert!(dir.path().join("150624.1.CSV").exists());
        // The occupant was not clobbered.
        assert_eq!(
            fs::read_to_string(dir.path().join("150624.CSV")).unwrap(),
            "older archive\n"
        );
    }
}
