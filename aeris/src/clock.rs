//! Clock sources and the network-time boundary.
//!
//! The station reconciles three independent, imprecise time sources:
//!
//! - [`SystemClock`] — the process-local wall clock, instantly available but
//!   reset on every power loss
//! - [`HardwareClock`] — a battery-backed RTC chip behind the two-wire
//!   [`RtcChip`] boundary, more durable but needs correction when its
//!   battery dies
//! - a network time service behind the [`NetworkTime`] boundary, the
//!   highest-trust source whenever it delivers
//!
//! All calendar clocks share the [`ClockSource`] read/write contract so the
//! reconciler can copy time between them without knowing which is which.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone, Timelike};

use crate::error::ClockError;

/// One broken-down calendar reading taken from a clock source.
///
/// Never mutated after creation; discarded after one reconciliation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockReading {
    /// Hour of day, 0..=23.
    pub hour: u8,
    /// Minute, 0..=59.
    pub minute: u8,
    /// Second, 0..=59.
    pub second: u8,
    /// Day of month, 1..=31.
    pub day: u8,
    /// Month, 1..=12.
    pub month: u8,
    /// Full year (e.g. 2024).
    pub year: u16,
    /// Day of week, 1 = Monday ..= 7 = Sunday.
    pub weekday: u8,
    /// Whether the source considered this reading valid.
    pub valid: bool,
}

impl ClockReading {
    /// Builds a reading from a local wall-clock instant.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // components are range-bound
    pub fn from_local(dt: &DateTime<Local>) -> Self {
        Self {
            hour: dt.hour() as u8,
            minute: dt.minute() as u8,
            second: dt.second() as u8,
            day: dt.day() as u8,
            month: dt.month() as u8,
            year: u16::try_from(dt.year()).unwrap_or(0),
            weekday: dt.weekday().number_from_monday() as u8,
            valid: dt.year() > 0,
        }
    }

    /// Builds a reading from seconds since the Unix epoch, in local time.
    pub fn from_epoch(epoch: i64) -> Option<Self> {
        Local
            .timestamp_opt(epoch, 0)
            .single()
            .map(|dt| Self::from_local(&dt))
    }

    /// Converts the reading back to a local wall-clock instant.
    ///
    /// Returns `None` for readings flagged invalid or whose components do
    /// not form a real calendar date.
    pub fn to_local(&self) -> Option<DateTime<Local>> {
        if !self.valid {
            return None;
        }
        let naive = NaiveDate::from_ymd_opt(
            i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )?
        .and_hms_opt(
            u32::from(self.hour),
            u32::from(self.minute),
            u32::from(self.second),
        )?;
        Local.from_local_datetime(&naive).earliest()
    }

    /// Converts the reading to seconds since the Unix epoch.
    pub fn epoch_seconds(&self) -> Option<i64> {
        self.to_local().map(|dt| dt.timestamp())
    }
}

impl std::fmt::Display for ClockReading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02}-{:02}-{:04}  {:02}:{:02}:{:02}",
            self.day, self.month, self.year, self.hour, self.minute, self.second
        )
    }
}

/// Uniform read/write contract over a wall-clock time source.
pub trait ClockSource {
    /// A short, stable name used in log lines and error context.
    fn name(&self) -> &'static str;

    /// Reads the source's current notion of local time.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Unavailable`] when the source cannot produce a
    /// reading this cycle.
    fn read(&mut self) -> Result<ClockReading, ClockError>;

    /// Overwrites the source's time with the given reading.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::WriteFailed`] when the source rejects the
    /// write, or [`ClockError::InvalidReading`] when the reading does not
    /// form a real calendar date.
    fn write(&mut self, reading: &ClockReading) -> Result<(), ClockError>;
}

/// The process-local wall clock, with a correction offset.
///
/// A user-space process cannot set the host clock, so corrections are
/// modeled the way firmware treats its internal RTC register: the real host
/// time plus an atomically stored signed offset. Clones share the offset,
/// so a correction applied by the reconciler is visible to every task that
/// asks this clock for "now".
#[derive(Debug, Clone, Default)]
pub struct SystemClock {
    offset_secs: Arc<AtomicI64>,
}

impl SystemClock {
    /// Creates a system clock with zero correction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current local time with the correction offset applied.
    pub fn now_local(&self) -> DateTime<Local> {
        Local::now() + chrono::Duration::seconds(self.offset_secs.load(Ordering::Relaxed))
    }

    /// Current corrected time as seconds since the Unix epoch.
    pub fn now_epoch(&self) -> i64 {
        self.now_local().timestamp()
    }
}

impl ClockSource for SystemClock {
    fn name(&self) -> &'static str {
        "system"
    }

    fn read(&mut self) -> Result<ClockReading, ClockError> {
        Ok(ClockReading::from_local(&self.now_local()))
    }

    fn write(&mut self, reading: &ClockReading) -> Result<(), ClockError> {
        let target = reading
            .epoch_seconds()
            .ok_or(ClockError::InvalidReading { source_name: self.name() })?;
        self.offset_secs
            .store(target - Local::now().timestamp(), Ordering::Relaxed);
        Ok(())
    }
}

/// Register-level boundary of the battery-backed RTC chip on the two-wire bus.
///
/// Implementations are external collaborators (or simulators); the core only
/// requires get/set of the broken-down calendar fields and an epoch read.
pub trait RtcChip {
    /// Reads the chip's calendar registers.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the bus transaction fails.
    fn read_datetime(&mut self) -> io::Result<ClockReading>;

    /// Writes the chip's calendar registers.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the bus transaction fails.
    fn write_datetime(&mut self, reading: &ClockReading) -> io::Result<()>;

    /// Reads the chip's time as seconds since the Unix epoch.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the bus transaction fails.
    fn read_epoch(&mut self) -> io::Result<i64>;
}

/// [`ClockSource`] adapter over an [`RtcChip`].
#[derive(Debug)]
pub struct HardwareClock<C> {
    chip: C,
}

impl<C: RtcChip> HardwareClock<C> {
    /// Wraps an RTC chip.
    pub fn new(chip: C) -> Self {
        Self { chip }
    }
}

impl<C: RtcChip> ClockSource for HardwareClock<C> {
    fn name(&self) -> &'static str {
        "hardware"
    }

    fn read(&mut self) -> Result<ClockReading, ClockError> {
        let reading = self
            .chip
            .read_datetime()
            .map_err(|source| ClockError::Unavailable { source_name: self.name(), source })?;

        if reading.valid {
            return Ok(reading);
        }

        // Some chips report valid epoch seconds while their calendar
        // registers read back garbage after a brown-out.
        let epoch = self
            .chip
            .read_epoch()
            .map_err(|source| ClockError::Unavailable { source_name: self.name(), source })?;
        ClockReading::from_epoch(epoch)
            .ok_or(ClockError::InvalidReading { source_name: self.name() })
    }

    fn write(&mut self, reading: &ClockReading) -> Result<(), ClockError> {
        self.chip
            .write_datetime(reading)
            .map_err(|source| ClockError::WriteFailed { source_name: self.name(), source })
    }
}

/// A hand-driven clock source for tests and simulation.
///
/// Reads return whatever was last set (or fail when unset); writes are
/// recorded and become the new reading, so corrections are observable.
#[derive(Debug)]
pub struct ManualClock {
    name: &'static str,
    reading: Option<ClockReading>,
    fail_writes: bool,
    /// Every reading written to this clock, in order.
    pub writes: Vec<ClockReading>,
}

impl ManualClock {
    /// Creates a clock with no reading (reads fail until [`Self::set`]).
    pub fn new(name: &'static str) -> Self {
        Self { name, reading: None, fail_writes: false, writes: Vec::new() }
    }

    /// Sets the reading returned by subsequent reads.
    pub fn set(&mut self, reading: ClockReading) {
        self.reading = Some(reading);
    }

    /// Makes subsequent reads fail with `Unavailable`.
    pub fn set_unavailable(&mut self) {
        self.reading = None;
    }

    /// Makes subsequent writes fail with `WriteFailed`.
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }
}

impl ClockSource for ManualClock {
    fn name(&self) -> &'static str {
        self.name
    }

    fn read(&mut self) -> Result<ClockReading, ClockError> {
        self.reading.ok_or_else(|| ClockError::Unavailable {
            source_name: self.name,
            source: io::Error::new(io::ErrorKind::NotConnected, "no reading set"),
        })
    }

    fn write(&mut self, reading: &ClockReading) -> Result<(), ClockError> {
        if self.fail_writes {
            return Err(ClockError::WriteFailed {
                source_name: self.name,
                source: io::Error::other("writes disabled"),
            });
        }
        self.writes.push(*reading);
        self.reading = Some(*reading);
        Ok(())
    }
}

/// Boundary of the background network time client.
///
/// Acquiring time from the network is an asynchronous, retried background
/// process, not a blocking call: the client runs on its own, reports sync
/// progress through [`Self::is_synced`], and hands completed sync readings
/// over via polled delivery in [`Self::try_take_sync`].
pub trait NetworkTime {
    /// Starts (or re-initializes) the background client.
    fn start(&mut self);

    /// Stops and re-initializes the client, forcing an out-of-schedule sync.
    fn restart(&mut self);

    /// Whether the bootstrap handshake has completed at least once.
    fn is_synced(&self) -> bool;

    /// Takes the next delivered sync reading, if one arrived since the last
    /// call.
    fn try_take_sync(&mut self) -> Option<ClockReading>;
}
