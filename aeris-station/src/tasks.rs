//! Consumer task loops.
//!
//! Each loop body runs in its own thread, never returns, and is built from
//! a per-cycle function that takes everything it needs as arguments — the
//! loops are thin, the cycles are testable. All log writers wait on the
//! reconciler's start gate so no timestamp is written before the clock has
//! had a reconciliation pass.

use std::num::NonZeroUsize;
use std::time::Duration;

use aeris::rotate::RecordFormat;
use aeris::{
    DatedSequenceNamer, RotatingLog, SampleAggregator, SharedMeasurementStore, StartGate,
    StationLayout, SystemClock,
};
use tracing::{info, info_span, warn};

/// Camera boundary: hand over one captured frame.
pub trait FrameSource {
    /// Produces the next frame's bytes.
    fn next_frame(&mut self) -> Vec<u8>;
}

/// Log writer task: one rotating log, one format, one thread.
pub fn logger_loop<F: RecordFormat>(
    name: &'static str,
    gate: &StartGate,
    store: &SharedMeasurementStore,
    clock: &SystemClock,
    mut log: RotatingLog<F>,
    layout: &StationLayout,
    interval: Duration,
) {
    let _span = info_span!("logger", name).entered();
    gate.wait();

    if let Err(e) = log.resume_or_begin(clock.now_local()) {
        warn!("could not resume current log file: {e}");
    }
    info!("start logging measurements to '{}'", log.current_path().display());

    loop {
        log_cycle(&mut log, store, clock, layout);
        std::thread::sleep(interval);
    }
}

/// One log writer cycle: rotate on day change, then append a snapshot.
pub fn log_cycle<F: RecordFormat>(
    log: &mut RotatingLog<F>,
    store: &SharedMeasurementStore,
    clock: &SystemClock,
    layout: &StationLayout,
) {
    let now = clock.now_local();
    if let Err(e) = log.rotate_if_day_changed(now) {
        warn!("log rotation failed: {e}");
    }

    let measurements = store.latest();
    if let Err(e) = log.append(now.timestamp(), &measurements) {
        warn!("failed to append log record: {e}");
        if let Err(probe) = layout.ensure_writable() {
            warn!("storage probe failed: {probe}");
        }
    }
}

/// Averaging log writer task: collect a window, append one mean record.
pub fn avg_logger_loop<F: RecordFormat>(
    gate: &StartGate,
    store: &SharedMeasurementStore,
    clock: &SystemClock,
    mut log: RotatingLog<F>,
    layout: &StationLayout,
    window: NonZeroUsize,
    interval: Duration,
) {
    let _span = info_span!("logger", name = "avg").entered();
    gate.wait();

    if let Err(e) = log.resume_or_begin(clock.now_local()) {
        warn!("could not resume current log file: {e}");
    }
    info!(
        "start logging averaged measurements (window {}) to '{}'",
        window,
        log.current_path().display()
    );

    let mut aggregator = SampleAggregator::new(window);
    loop {
        avg_log_cycle(&mut log, &mut aggregator, store, clock, layout);
        std::thread::sleep(interval);
    }
}

/// One averaging cycle: rotate, buffer a snapshot, append on window fill.
pub fn avg_log_cycle<F: RecordFormat>(
    log: &mut RotatingLog<F>,
    aggregator: &mut SampleAggregator,
    store: &SharedMeasurementStore,
    clock: &SystemClock,
    layout: &StationLayout,
) {
    if let Err(e) = log.rotate_if_day_changed(clock.now_local()) {
        warn!("log rotation failed: {e}");
    }

    if let Some(averaged) = aggregator.push(store.latest()) {
        if let Err(e) = log.append(averaged.timestamp, &averaged) {
            warn!("failed to append averaged record: {e}");
            if let Err(probe) = layout.ensure_writable() {
                warn!("storage probe failed: {probe}");
            }
        }
    }
}

/// Capture task: write one frame per interval into the dated archive.
pub fn capture_loop(
    gate: &StartGate,
    namer: &DatedSequenceNamer,
    frames: &mut dyn FrameSource,
    clock: &SystemClock,
    layout: &StationLayout,
    interval: Duration,
) {
    let _span = info_span!("capture").entered();
    gate.wait();

    loop {
        capture_cycle(namer, frames, clock, layout);
        std::thread::sleep(interval);
    }
}

/// One capture cycle: name the next artifact, take a frame, store it.
pub fn capture_cycle(
    namer: &DatedSequenceNamer,
    frames: &mut dyn FrameSource,
    clock: &SystemClock,
    layout: &StationLayout,
) {
    let date = clock.now_local().date_naive();
    let path = match namer.next_path(date) {
        Ok(path) => path,
        Err(e) => {
            warn!("cannot name the next picture: {e}");
            if let Err(probe) = layout.ensure_writable() {
                warn!("storage probe failed: {probe}");
            }
            return;
        }
    };

    info!("taking picture");
    match std::fs::write(&path, frames.next_frame()) {
        Ok(()) => info!("picture stored at '{}'", path.display()),
        Err(e) => warn!("cannot store picture at '{}': {e}", path.display()),
    }
}

/// Stats task: periodically report the current snapshot.
pub fn stats_loop(store: &SharedMeasurementStore, interval: Duration) {
    let _span = info_span!("stats").entered();
    loop {
        let m = store.latest();
        info!(
            light_lux = m.light_lux,
            temp_internal_c = m.temp_internal_c,
            temp_external_c = m.temp_external_c,
            humidity_pct = m.humidity_pct,
            pressure_hpa = m.pressure_hpa,
            altitude_m = m.altitude_m,
            wind_ms = m.wind_ms,
            probe_status = m.probe_status,
            "current measurements"
        );
        std::thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use aeris::{CsvFormat, MeasurementUpdate};
    use tempfile::tempdir;

    use super::*;
    use crate::sim::SimFrameSource;

    #[test]
    fn test_log_cycle_appends_a_record() {
        let dir = tempdir().unwrap();
        let layout = StationLayout::open(dir.path().join("station")).unwrap();
        let store = SharedMeasurementStore::new();
        let clock = SystemClock::new();

        store.store(MeasurementUpdate::new().with_temp_internal_c(20.0));

        let mut log = RotatingLog::new(layout.logs_dir(), CsvFormat);
        log.resume_or_begin(clock.now_local()).unwrap();

        log_cycle(&mut log, &store, &clock, &layout);
        log_cycle(&mut log, &store, &clock, &layout);

        let contents = std::fs::read_to_string(log.current_path()).unwrap();
        assert_eq!(contents.lines().count(), 3, "header plus two records");
    }

    #[test]
    fn test_avg_log_cycle_appends_once_per_window() {
        let dir = tempdir().unwrap();
        let layout = StationLayout::open(dir.path().join("station")).unwrap();
        let store = SharedMeasurementStore::new();
        let clock = SystemClock::new();

        let mut log = RotatingLog::new(layout.avg_logs_dir(), aeris::AvgCsvFormat);
        log.resume_or_begin(clock.now_local()).unwrap();

        let mut aggregator = SampleAggregator::new(NonZeroUsize::new(3).unwrap());
        for _ in 0..6 {
            avg_log_cycle(&mut log, &mut aggregator, &store, &clock, &layout);
        }

        let contents = std::fs::read_to_string(log.current_path()).unwrap();
        assert_eq!(contents.lines().count(), 3, "header plus two averaged records");
    }

    #[test]
    fn test_capture_cycle_stores_sequenced_frames() {
        let dir = tempdir().unwrap();
        let layout = StationLayout::open(dir.path().join("station")).unwrap();
        let clock = SystemClock::new();
        let namer = DatedSequenceNamer::new(layout.images_dir());
        let mut frames = SimFrameSource::new();

        capture_cycle(&namer, &mut frames, &clock, &layout);
        capture_cycle(&namer, &mut frames, &clock, &layout);

        let today = clock.now_local().date_naive();
        let day_dir = layout
            .images_dir()
            .join(format!("{}", today.format("%Y/%m/%d")));
        assert!(day_dir.join("001.jpg").exists());
        assert!(day_dir.join("002.jpg").exists());
    }
}
