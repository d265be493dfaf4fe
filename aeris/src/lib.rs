//! # aeris
//!
//! Time-base reconciliation and rotating measurement logs for single-board
//! environmental monitoring stations.
//!
//! aeris is the core of a station that samples sensors, keeps a
//! synchronized notion of wall-clock time, persists time-stamped
//! measurements to removable storage in rotating files, and captures
//! images into a date-partitioned archive. Sensor drivers, display
//! rendering, and network bring-up are external collaborators behind
//! narrow traits; this crate owns the parts where correctness takes more
//! than calling a library function once.
//!
//! ## Key Properties
//!
//! - One shared "latest measurement" value, safe across concurrent
//!   producers and consumers
//! - Three independent time sources reconciled into one trusted wall clock
//! - Append-only logs that roll over exactly at local-day boundaries,
//!   survive power loss, and recover stale files on boot
//! - Every append is an independent open/write/close cycle — no buffered
//!   state to lose
//! - No background threads of its own: callers own the task loops
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use aeris::{CsvFormat, MeasurementUpdate, RotatingLog, SharedMeasurementStore, StationLayout};
//! use chrono::Local;
//!
//! # fn main() -> aeris::Result<()> {
//! // Open (or create) the data directory on the storage device.
//! let layout = StationLayout::open("./station_data")?;
//!
//! // Producers push partial updates; consumers take snapshots.
//! let store = SharedMeasurementStore::new();
//! store.store(
//!     MeasurementUpdate::new()
//!         .with_temp_internal_c(21.5)
//!         .with_pressure_hpa(1013.2),
//! );
//!
//! // One rotating log per format, one writer task per log.
//! let mut log = RotatingLog::new(layout.logs_dir(), CsvFormat);
//! log.resume_or_begin(Local::now())?;
//!
//! // Per cycle: rotate on day change, then append a snapshot.
//! log.rotate_if_day_changed(Local::now())?;
//! log.append(Local::now().timestamp(), &store.latest())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`SharedMeasurementStore`] — mutex-guarded cell holding the latest
//!   composite reading
//! - [`TimeReconciler`] — compares the [`ClockSource`]s each cycle,
//!   corrects the implausible one, and applies network time when delivered
//! - [`RotatingLog`] — append-only log lifecycle, instantiated per
//!   [`RecordFormat`]
//! - [`SampleAggregator`] — reduces N raw samples to one averaged record
//! - [`DatedSequenceNamer`] — `YYYY/MM/DD/NNN.jpg` paths for captures
//! - [`StationLayout`] — data-directory lifecycle and storage probe
//!
//! ## Modules
//!
//! For lower-level access, the individual modules are also public:
//!
//! - [`measurement`] — measurement value object and shared store
//! - [`clock`] — clock sources and the network-time boundary
//! - [`reconcile`] — reconciliation state machine and start gate
//! - [`rotate`] — rotating log engine and record formats
//! - [`aggregate`] — fixed-window averaging
//! - [`namer`] — date-partitioned sequence naming
//! - [`layout`] — data-directory layout
//! - [`config`] — station configuration
//! - [`error`] — error types

pub mod aggregate;
pub mod clock;
pub mod config;
pub mod error;
pub mod layout;
pub mod measurement;
pub mod namer;
pub mod reconcile;
pub mod rotate;

// Re-export primary API types at crate root for convenience.
pub use aggregate::SampleAggregator;
pub use clock::{
    ClockReading, ClockSource, HardwareClock, ManualClock, NetworkTime, RtcChip, SystemClock,
};
pub use config::StationConfig;
pub use error::{AerisError, Result};
pub use layout::StationLayout;
pub use measurement::{Measurement, MeasurementUpdate, SharedMeasurementStore};
pub use namer::DatedSequenceNamer;
pub use reconcile::{ReconcileOutcome, ReconcilerConfig, StartGate, TimeReconciler};
pub use rotate::{AvgCsvFormat, CsvFormat, DayStamp, DayTracker, JsonFormat, RecordFormat, RotatingLog};
