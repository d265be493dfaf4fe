//! Integration tests for the rotating log lifecycle.
//!
//! These exercise the full flow from a fresh data directory through
//! appends, day rollovers, and restart recovery, for all three record
//! formats sharing one layout.

use aeris::{AvgCsvFormat, CsvFormat, JsonFormat, Measurement, RotatingLog, StationLayout};
use chrono::{DateTime, Datelike, Local, TimeZone};
use tempfile::tempdir;

fn local(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
}

fn sample() -> Measurement {
    Measurement {
        light_lux: 500.0,
        temp_internal_c: 20.0,
        temp_external_c: 5.0,
        humidity_pct: 60.0,
        pressure_hpa: 1010.0,
        altitude_m: 120.0,
        wind_ms: 2.0,
        probe_status: 0,
        timestamp: 1_700_000_000,
    }
}

#[test]
fn test_d_days_produce_d_minus_one_archives() {
    let dir = tempdir().unwrap();
    let mut log = RotatingLog::new(dir.path(), CsvFormat);

    const DAYS: u32 = 7;

    // Day 1 starts the log; each later day is observed exactly once.
    log.resume_or_begin(local(2024, 6, 10, 0)).unwrap();
    for day in 0..DAYS {
        let now = local(2024, 6, 10 + day, 6);
        log.rotate_if_day_changed(now).unwrap();
        log.append(now.timestamp(), &sample()).unwrap();
    }

    let archives: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name != "CURRENT.CSV")
        .collect();

    assert_eq!(archives.len(), (DAYS - 1) as usize);

    // Each archive is named with the day *before* the one that detected
    // the change: rotation on June 11 archives June 10, and so on.
    for day in 10..10 + DAYS - 1 {
        let expected = format!("{day:02}0624.CSV");
        assert!(
            archives.contains(&expected),
            "missing archive {expected}, have {archives:?}"
        );
    }

    assert!(dir.path().join("CURRENT.CSV").exists());
}

#[test]
fn test_resume_archives_stale_current_file() {
    let dir = tempdir().unwrap();

    // Yesterday's session: begin and append, never rotated.
    {
        let mut log = RotatingLog::new(dir.path(), CsvFormat);
        log.resume_or_begin(Local::now()).unwrap();
        log.append(1_700_000_000, &sample()).unwrap();
    }

    // Restart "tomorrow": the file's (real) mtime is a day older than now.
    let tomorrow = Local::now() + chrono::Duration::days(1);
    let mut log = RotatingLog::new(dir.path(), CsvFormat);
    log.resume_or_begin(tomorrow).unwrap();

    // Exactly one archive, named with the file's modification date.
    let today = Local::now();
    let expected = format!(
        "{:02}{:02}{:02}.CSV",
        today.day(),
        today.month(),
        today.year().rem_euclid(100)
    );
    assert!(dir.path().join(&expected).exists(), "expected archive {expected}");

    let archive = std::fs::read_to_string(dir.path().join(&expected)).unwrap();
    assert!(archive.starts_with("time,"), "archive keeps its begin marker");
    assert_eq!(archive.lines().count(), 2, "header plus the one record");

    // The fresh current file holds only the begin marker.
    let current = std::fs::read_to_string(log.current_path()).unwrap();
    assert_eq!(current, "time,int_t,ext_t,humi,sun,press\n");
}

#[test]
fn test_resume_keeps_todays_current_file() {
    let dir = tempdir().unwrap();

    {
        let mut log = RotatingLog::new(dir.path(), CsvFormat);
        log.resume_or_begin(Local::now()).unwrap();
        log.append(1_700_000_000, &sample()).unwrap();
    }

    // Restart the same day: nothing is archived, the record survives.
    let mut log = RotatingLog::new(dir.path(), CsvFormat);
    log.resume_or_begin(Local::now()).unwrap();

    let contents = std::fs::read_to_string(log.current_path()).unwrap();
    assert_eq!(contents.lines().count(), 2);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1, "only CURRENT.CSV");
}

#[test]
fn test_json_log_is_valid_after_rotation() {
    let dir = tempdir().unwrap();
    let mut log = RotatingLog::new(dir.path(), JsonFormat);

    log.resume_or_begin(local(2024, 6, 15, 0)).unwrap();
    for i in 0..5 {
        log.append(1_700_000_000 + i, &sample()).unwrap();
    }
    assert!(log.rotate_if_day_changed(local(2024, 6, 15, 12)).is_ok_and(|r| !r));
    assert!(log.rotate_if_day_changed(local(2024, 6, 16, 0)).unwrap());

    // The archived file parses as a JSON array of five records.
    let archived = std::fs::read_to_string(dir.path().join("150624.JSO")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&archived).unwrap();
    assert_eq!(value.as_array().unwrap().len(), 5);

    // The fresh current file is an opened, empty array.
    assert_eq!(std::fs::read_to_string(log.current_path()).unwrap(), "[");
}

#[test]
fn test_three_formats_share_one_layout() {
    let dir = tempdir().unwrap();
    let layout = StationLayout::open(dir.path().join("station")).unwrap();

    let mut plain = RotatingLog::new(layout.logs_dir(), CsvFormat);
    let mut structured = RotatingLog::new(layout.logs_dir(), JsonFormat);
    let mut averaged = RotatingLog::new(layout.avg_logs_dir(), AvgCsvFormat);

    let start = local(2024, 6, 15, 0);
    plain.resume_or_begin(start).unwrap();
    structured.resume_or_begin(start).unwrap();
    averaged.resume_or_begin(start).unwrap();

    plain.append(1, &sample()).unwrap();
    structured.append(1, &sample()).unwrap();
    averaged.append(1, &sample()).unwrap();

    // The plain and structured logs share a directory but write to
    // disjoint files; the averaged log lives in its own directory under
    // the same naming scheme.
    let next_day = local(2024, 6, 16, 0);
    assert!(plain.rotate_if_day_changed(next_day).unwrap());
    assert!(structured.rotate_if_day_changed(next_day).unwrap());
    assert!(averaged.rotate_if_day_changed(next_day).unwrap());

    assert!(layout.logs_dir().join("150624.CSV").exists());
    assert!(layout.logs_dir().join("150624.JSO").exists());
    assert!(layout.avg_logs_dir().join("150624.CSV").exists());
}

#[test]
fn test_append_failure_is_transient() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("gone");
    let log = RotatingLog::new(&missing, CsvFormat);

    // The directory does not exist: the cycle's append fails...
    assert!(log.append(1, &sample()).is_err());

    // ...the storage probe recreates the tree (as the logger task would
    // after a failed open), and the next cycle succeeds.
    std::fs::create_dir_all(&missing).unwrap();
    log.append(2, &sample()).unwrap();
}
