//! Station wiring: build the core, spawn the task threads.
//!
//! Mirrors the firmware's task table: two sensor producers, the time
//! reconciler, three log writers (plain CSV, bracketed JSON, averaging
//! CSV), the image capture task, and a stats reporter — all sharing the
//! measurement store, the corrected system clock, and one data directory.

use std::num::NonZeroUsize;
use std::thread;
use std::time::Duration;

use aeris::{
    AvgCsvFormat, CsvFormat, DatedSequenceNamer, HardwareClock, JsonFormat, RotatingLog,
    SharedMeasurementStore, StationConfig, StationLayout, SystemClock, TimeReconciler,
};
use tracing::info;

use crate::sim::{SimFrameSource, SimNetworkTime, SimRtcChip, fast_sensor_loop, probe_loop};
use crate::tasks;

/// How long the simulated network client takes to acquire time.
const NETWORK_SYNC_DELAY: Duration = Duration::from_secs(3);

/// Cadence of the slow external probe producer.
const PROBE_INTERVAL: Duration = Duration::from_secs(2);

/// Builds the station and runs it for `run_for` seconds (forever if `None`).
///
/// # Errors
///
/// Returns an error when the configuration is invalid or the data
/// directory cannot be opened; everything after that degrades and retries
/// instead of failing.
pub fn run(config: &StationConfig, dead_rtc: bool, run_for: Option<u64>) -> aeris::Result<()> {
    config.validate()?;
    let layout = StationLayout::open(&config.data_root)?;
    info!("station data directory ready at '{}'", layout.root().display());

    let store = SharedMeasurementStore::new();
    let system = SystemClock::new();

    let chip = if dead_rtc { SimRtcChip::with_dead_battery() } else { SimRtcChip::new() };
    let hardware = HardwareClock::new(chip);
    let network = SimNetworkTime::new(NETWORK_SYNC_DELAY);

    let mut reconciler =
        TimeReconciler::new(system.clone(), hardware, network, config.reconciler.clone());
    let gate = reconciler.gate();

    // Producers.
    {
        let store = store.clone();
        let clock = system.clone();
        let interval = config.logging_interval;
        thread::spawn(move || fast_sensor_loop(store, clock, interval));
    }
    {
        let store = store.clone();
        let clock = system.clone();
        thread::spawn(move || probe_loop(store, clock, PROBE_INTERVAL));
    }

    // The reconciler opens the gate after its bootstrap pass.
    thread::spawn(move || reconciler.run());

    // One writer task per log format, on disjoint current files.
    {
        let gate = gate.clone();
        let store = store.clone();
        let clock = system.clone();
        let log = RotatingLog::new(layout.logs_dir(), CsvFormat);
        let layout = layout.clone();
        let interval = config.logging_interval;
        thread::spawn(move || {
            tasks::logger_loop("csv", &gate, &store, &clock, log, &layout, interval);
        });
    }
    {
        let gate = gate.clone();
        let store = store.clone();
        let clock = system.clone();
        let log = RotatingLog::new(layout.logs_dir(), JsonFormat);
        let layout = layout.clone();
        let interval = config.logging_interval;
        thread::spawn(move || {
            tasks::logger_loop("json", &gate, &store, &clock, log, &layout, interval);
        });
    }
    {
        let gate = gate.clone();
        let store = store.clone();
        let clock = system.clone();
        let log = RotatingLog::new(layout.avg_logs_dir(), AvgCsvFormat);
        let layout = layout.clone();
        let interval = config.logging_interval;
        // validate() guarantees the window is at least 1.
        let window = NonZeroUsize::new(config.averaging_window).unwrap_or(NonZeroUsize::MIN);
        thread::spawn(move || {
            tasks::avg_logger_loop(&gate, &store, &clock, log, &layout, window, interval);
        });
    }

    // Image capture into the date-partitioned archive.
    {
        let gate = gate.clone();
        let clock = system.clone();
        let namer = DatedSequenceNamer::new(layout.images_dir());
        let layout = layout.clone();
        let interval = config.picture_interval;
        thread::spawn(move || {
            let mut frames = SimFrameSource::new();
            tasks::capture_loop(&gate, &namer, &mut frames, &clock, &layout, interval);
        });
    }

    // Stats reporter.
    {
        let store = store.clone();
        let interval = config.stats_interval;
        thread::spawn(move || tasks::stats_loop(&store, interval));
    }

    match run_for {
        Some(secs) => {
            info!("running for {secs}s");
            thread::sleep(Duration::from_secs(secs));
            info!("demo window elapsed");
            Ok(())
        }
        None => loop {
            thread::park();
        },
    }
}
