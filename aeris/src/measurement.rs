//! The composite sensor reading and its shared, mutex-guarded store.
//!
//! Every producer task (sensor pollers) and consumer task (log writers, the
//! stats reporter, display or HTTP handlers) exchanges data through one
//! long-lived [`Measurement`] instance owned by a [`SharedMeasurementStore`].
//! Producers overwrite individual fields; consumers take full snapshot
//! copies. The store is the only piece of state in the core with concurrent
//! multi-writer, multi-reader access.
//!
//! # Consistency
//!
//! A single [`SharedMeasurementStore::store`] call is atomic: readers never
//! observe a half-applied update. Two *successive* `store` calls are not
//! atomic as a set — a snapshot taken between them mixes fields from both.
//! This weak-consistency trade-off is acceptable because every field is an
//! independent physical quantity sampled on its own cadence.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One composite environmental reading.
///
/// Fields map one-to-one onto the station's sensor complement. Values are
/// raw engineering units; conversion formulas live in the (out-of-scope)
/// sensor drivers.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Measurement {
    /// Light exposure in lux.
    pub light_lux: f64,
    /// Internal (enclosure) temperature in degrees Celsius.
    pub temp_internal_c: f64,
    /// External (probe) temperature in degrees Celsius.
    pub temp_external_c: f64,
    /// Relative humidity in percent.
    pub humidity_pct: f64,
    /// Barometric pressure in hPa.
    pub pressure_hpa: f64,
    /// Computed altitude in meters.
    pub altitude_m: f64,
    /// Wind speed in m/s.
    pub wind_ms: f64,
    /// Status code of the last read of the slow external probe.
    pub probe_status: i32,
    /// Capture time as seconds since the Unix epoch.
    pub timestamp: i64,
}

/// A partial update to a [`Measurement`].
///
/// Producers fill in only the fields their sensor provides; unset fields
/// leave the stored value untouched. Built with `with_*` setters:
///
/// ```
/// use aeris::measurement::{Measurement, MeasurementUpdate};
///
/// let update = MeasurementUpdate::new()
///     .with_light_lux(812.5)
///     .with_pressure_hpa(1013.2)
///     .with_timestamp(1_700_000_000);
///
/// let mut m = Measurement::default();
/// update.apply(&mut m);
/// assert_eq!(m.pressure_hpa, 1013.2);
/// assert_eq!(m.humidity_pct, 0.0); // untouched
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeasurementUpdate {
    light_lux: Option<f64>,
    temp_internal_c: Option<f64>,
    temp_external_c: Option<f64>,
    humidity_pct: Option<f64>,
    pressure_hpa: Option<f64>,
    altitude_m: Option<f64>,
    wind_ms: Option<f64>,
    probe_status: Option<i32>,
    timestamp: Option<i64>,
}

impl MeasurementUpdate {
    /// Creates an empty update that changes nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the light exposure in lux.
    #[must_use]
    pub fn with_light_lux(mut self, value: f64) -> Self {
        self.light_lux = Some(value);
        self
    }

    /// Sets the internal temperature in degrees Celsius.
    #[must_use]
    pub fn with_temp_internal_c(mut self, value: f64) -> Self {
        self.temp_internal_c = Some(value);
        self
    }

    /// Sets the external temperature in degrees Celsius.
    #[must_use]
    pub fn with_temp_external_c(mut self, value: f64) -> Self {
        self.temp_external_c = Some(value);
        self
    }

    /// Sets the relative humidity in percent.
    #[must_use]
    pub fn with_humidity_pct(mut self, value: f64) -> Self {
        self.humidity_pct = Some(value);
        self
    }

    /// Sets the barometric pressure in hPa.
    #[must_use]
    pub fn with_pressure_hpa(mut self, value: f64) -> Self {
        self.pressure_hpa = Some(value);
        self
    }

    /// Sets the computed altitude in meters.
    #[must_use]
    pub fn with_altitude_m(mut self, value: f64) -> Self {
        self.altitude_m = Some(value);
        self
    }

    /// Sets the wind speed in m/s.
    #[must_use]
    pub fn with_wind_ms(mut self, value: f64) -> Self {
        self.wind_ms = Some(value);
        self
    }

    /// Sets the slow probe's last-read status code.
    #[must_use]
    pub fn with_probe_status(mut self, value: i32) -> Self {
        self.probe_status = Some(value);
        self
    }

    /// Sets the capture time in seconds since the Unix epoch.
    #[must_use]
    pub fn with_timestamp(mut self, value: i64) -> Self {
        self.timestamp = Some(value);
        self
    }

    /// Applies this update to a measurement, overwriting only the set fields.
    pub fn apply(&self, target: &mut Measurement) {
        if let Some(v) = self.light_lux {
            target.light_lux = v;
        }
        if let Some(v) = self.temp_internal_c {
            target.temp_internal_c = v;
        }
        if let Some(v) = self.temp_external_c {
            target.temp_external_c = v;
        }
        if let Some(v) = self.humidity_pct {
            target.humidity_pct = v;
        }
        if let Some(v) = self.pressure_hpa {
            target.pressure_hpa = v;
        }
        if let Some(v) = self.altitude_m {
            target.altitude_m = v;
        }
        if let Some(v) = self.wind_ms {
            target.wind_ms = v;
        }
        if let Some(v) = self.probe_status {
            target.probe_status = v;
        }
        if let Some(v) = self.timestamp {
            target.timestamp = v;
        }
    }
}

/// Cheaply clonable handle to the one shared "latest measurement" value.
///
/// Critical sections are O(1) field copies, never I/O, so worst-case lock
/// hold time is negligible and blocking waits are acceptable on every call
/// site. A poisoned mutex is recovered rather than propagated: a panicking
/// producer must not take the log writers down with it.
#[derive(Debug, Clone, Default)]
pub struct SharedMeasurementStore {
    inner: Arc<Mutex<Measurement>>,
}

impl SharedMeasurementStore {
    /// Creates a store holding a zeroed measurement.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a consistent full snapshot of the latest measurement.
    pub fn latest(&self) -> Measurement {
        *self.lock()
    }

    /// Merges a partial update into the shared measurement.
    ///
    /// Fields not set in `update` keep their current values.
    pub fn store(&self, update: MeasurementUpdate) {
        update.apply(&mut self.lock());
    }

    fn lock(&self) -> MutexGuard<'_, Measurement> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
