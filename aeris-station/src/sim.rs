//! Simulated external collaborators.
//!
//! Stand-ins for the hardware the core treats as boundaries: the
//! battery-backed RTC chip on the two-wire bus, the background network
//! time client, the camera, and the sensor complement. Each one honors the
//! narrow contract the core defines and nothing more — the point is to
//! exercise the core, not to model physics.

use std::io;
use std::time::{Duration, Instant};

use aeris::clock::{ClockReading, NetworkTime, RtcChip};
use aeris::measurement::MeasurementUpdate;
use aeris::{SharedMeasurementStore, SystemClock};
use chrono::Local;
use tracing::info_span;

use crate::tasks::FrameSource;

/// 2000-01-01T00:00:00Z — what a DS3231-style chip reports after its
/// backup battery dies.
const DEAD_BATTERY_EPOCH: i64 = 946_684_800;

/// Simulated battery-backed RTC chip.
///
/// Keeps its time as an offset from the host clock, the way a real chip
/// keeps counting from whatever was last written to its registers.
#[derive(Debug, Default)]
pub struct SimRtcChip {
    offset_secs: i64,
}

impl SimRtcChip {
    /// A chip whose time agrees with the host.
    pub fn new() -> Self {
        Self::default()
    }

    /// A chip that lost its backup battery and reset to year 2000.
    pub fn with_dead_battery() -> Self {
        Self { offset_secs: DEAD_BATTERY_EPOCH - Local::now().timestamp() }
    }
}

impl RtcChip for SimRtcChip {
    fn read_datetime(&mut self) -> io::Result<ClockReading> {
        ClockReading::from_epoch(self.read_epoch()?)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "epoch out of range"))
    }

    fn write_datetime(&mut self, reading: &ClockReading) -> io::Result<()> {
        let target = reading
            .epoch_seconds()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid reading"))?;
        self.offset_secs = target - Local::now().timestamp();
        Ok(())
    }

    fn read_epoch(&mut self) -> io::Result<i64> {
        Ok(Local::now().timestamp() + self.offset_secs)
    }
}

/// Simulated network time client.
///
/// Reports synced after a fixed delay from `start`/`restart` and then
/// delivers the host's actual wall clock once per (re)start — which is
/// exactly what the real client hands over on a sync notification.
#[derive(Debug)]
pub struct SimNetworkTime {
    sync_delay: Duration,
    started_at: Option<Instant>,
    delivered: bool,
}

impl SimNetworkTime {
    /// A client that syncs `sync_delay` after being started.
    pub fn new(sync_delay: Duration) -> Self {
        Self { sync_delay, started_at: None, delivered: false }
    }
}

impl NetworkTime for SimNetworkTime {
    fn start(&mut self) {
        self.started_at = Some(Instant::now());
        self.delivered = false;
    }

    fn restart(&mut self) {
        self.start();
    }

    fn is_synced(&self) -> bool {
        self.started_at
            .is_some_and(|started| started.elapsed() >= self.sync_delay)
    }

    fn try_take_sync(&mut self) -> Option<ClockReading> {
        if !self.is_synced() || self.delivered {
            return None;
        }
        self.delivered = true;
        Some(ClockReading::from_local(&Local::now()))
    }
}

/// Simulated camera producing tiny JPEG-shaped frames.
#[derive(Debug, Default)]
pub struct SimFrameSource {
    counter: u32,
}

impl SimFrameSource {
    /// Creates the frame source.
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameSource for SimFrameSource {
    fn next_frame(&mut self) -> Vec<u8> {
        self.counter = self.counter.wrapping_add(1);
        let mut frame = vec![0xFF, 0xD8, 0xFF, 0xE0];
        frame.extend_from_slice(&self.counter.to_be_bytes());
        frame.extend_from_slice(&[0xFF, 0xD9]);
        frame
    }
}

/// Producer loop for the fast sensors (light, pressure, internal temp).
///
/// Values follow a slow diurnal curve off the corrected clock; the real
/// numbers do not matter, only that every field keeps moving.
pub fn fast_sensor_loop(store: SharedMeasurementStore, clock: SystemClock, interval: Duration) {
    let _span = info_span!("sensors").entered();
    loop {
        let epoch = clock.now_epoch();
        let phase = day_phase(epoch);

        store.store(
            MeasurementUpdate::new()
                .with_light_lux((phase.sin().max(0.0)) * 10_000.0)
                .with_temp_internal_c(21.0 + 2.0 * phase.sin())
                .with_pressure_hpa(1013.0 + 5.0 * (2.0 * phase).cos())
                .with_altitude_m(115.0 + (2.0 * phase).sin())
                .with_wind_ms(2.0 + (3.0 * phase).sin().abs())
                .with_timestamp(epoch),
        );

        std::thread::sleep(interval);
    }
}

/// Producer loop for the slow external probe (temp, humidity, status).
pub fn probe_loop(store: SharedMeasurementStore, clock: SystemClock, interval: Duration) {
    let _span = info_span!("probe").entered();
    let mut cycle: u32 = 0;
    loop {
        let phase = day_phase(clock.now_epoch());
        cycle = cycle.wrapping_add(1);
        // The real probe fails a read now and then; surface that through
        // the status code without touching the stale values.
        let status = i32::from(cycle % 50 == 0);

        let mut update = MeasurementUpdate::new().with_probe_status(status);
        if status == 0 {
            update = update
                .with_temp_external_c(8.0 - 6.0 * phase.cos())
                .with_humidity_pct(60.0 + 15.0 * phase.sin());
        }
        store.store(update);

        std::thread::sleep(interval);
    }
}

#[allow(clippy::cast_precision_loss)] // seconds-of-day fits f64 exactly
fn day_phase(epoch: i64) -> f64 {
    (epoch.rem_euclid(86_400)) as f64 / 86_400.0 * std::f64::consts::TAU
}
