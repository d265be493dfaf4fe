//! Time-base reconciliation across the three clock sources.
//!
//! The reconciler is the sole authority the rest of the station trusts for
//! "now" and "has the day changed". It runs as its own task:
//!
//! ```text
//! BOOTSTRAPPING ──► RECONCILING (re-entered every cycle_interval, forever)
//! ```
//!
//! On entry it seeds the system clock from the hardware clock (the best
//! value available at power-up), starts the network time client, and waits
//! a bounded number of polls for the first network sync. In steady state it
//! compares the system and hardware clocks once per cycle and corrects
//! whichever one fails the plausibility check, falling back to an immediate
//! network-sync restart when both are out. A delivered network reading
//! always wins and is written to both clocks.
//!
//! Logger tasks wait on the reconciler's [`StartGate`] so no log timestamp
//! is ever written before the clock has had at least one reconciliation
//! pass.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::{ClockReading, ClockSource, NetworkTime};
use crate::error::{ConfigError, Result};

/// Tuning knobs for the reconciler.
///
/// The plausibility year is deliberately configuration, not a literal: it
/// encodes "no station should ever show a date before its firmware's build
/// era", and that era moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Years strictly below this value mark a clock source as implausible.
    pub min_plausible_year: u16,
    /// How many times to poll the network client during bootstrap before
    /// giving up and proceeding on local clocks.
    pub bootstrap_max_polls: u32,
    /// Sleep between bootstrap polls.
    pub bootstrap_poll_interval: Duration,
    /// Period of the steady-state reconciliation cycle.
    pub cycle_interval: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            min_plausible_year: 2022,
            bootstrap_max_polls: 30,
            bootstrap_poll_interval: Duration::from_secs(1),
            cycle_interval: Duration::from_secs(10),
        }
    }
}

impl ReconcilerConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for zero intervals.
    pub fn validate(&self) -> Result<()> {
        if self.cycle_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "cycle_interval",
                reason: "must be non-zero".to_string(),
            }
            .into());
        }
        if self.bootstrap_poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "bootstrap_poll_interval",
                reason: "must be non-zero".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Sets the plausibility year floor.
    #[must_use]
    pub fn with_min_plausible_year(mut self, year: u16) -> Self {
        self.min_plausible_year = year;
        self
    }

    /// Sets the bootstrap poll bound.
    #[must_use]
    pub fn with_bootstrap_max_polls(mut self, polls: u32) -> Self {
        self.bootstrap_max_polls = polls;
        self
    }

    /// Sets the steady-state cycle period.
    #[must_use]
    pub fn with_cycle_interval(mut self, interval: Duration) -> Self {
        self.cycle_interval = interval;
        self
    }
}

/// What a single reconciliation cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// A delivered network reading was written to both clocks.
    NetworkApplied,
    /// The hardware clock was implausible and was overwritten from the
    /// system clock.
    HardwareCorrected,
    /// The system clock was implausible and was overwritten from the
    /// hardware clock.
    SystemCorrected,
    /// Both clocks were implausible; the network client was restarted.
    NetworkRestarted,
    /// Both clocks looked plausible; nothing was corrected.
    InSync,
}

/// One-shot latch the reconciler opens after its bootstrap pass.
///
/// Logger tasks call [`StartGate::wait`] before their first rotation check.
/// The gate never closes again once opened.
#[derive(Debug, Clone, Default)]
pub struct StartGate {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StartGate {
    /// Creates a closed gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the gate and wakes every waiter.
    pub fn open(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    /// Blocks until the gate is open. Returns immediately if it already is.
    pub fn wait(&self) {
        let (lock, cvar) = &*self.inner;
        let mut opened = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while !*opened {
            opened = cvar.wait(opened).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Whether the gate has been opened.
    pub fn is_open(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Sleep dependency, injectable so bootstrap is testable without real delays.
type SleepFn = Box<dyn FnMut(Duration) + Send>;

/// Periodic task that keeps the three time sources in agreement.
pub struct TimeReconciler<S, H, N> {
    system: S,
    hardware: H,
    network: N,
    config: ReconcilerConfig,
    gate: StartGate,
    sleep: SleepFn,
}

impl<S, H, N> TimeReconciler<S, H, N>
where
    S: ClockSource,
    H: ClockSource,
    N: NetworkTime,
{
    /// Creates a reconciler over the three time sources.
    pub fn new(system: S, hardware: H, network: N, config: ReconcilerConfig) -> Self {
        Self {
            system,
            hardware,
            network,
            config,
            gate: StartGate::new(),
            sleep: Box::new(std::thread::sleep),
        }
    }

    /// Replaces the sleep dependency (tests substitute a counter).
    #[must_use]
    pub fn with_sleep(mut self, sleep: impl FnMut(Duration) + Send + 'static) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    /// Returns a handle to the start gate logger tasks wait on.
    pub fn gate(&self) -> StartGate {
        self.gate.clone()
    }

    /// Shared access to the system clock source.
    pub fn system(&mut self) -> &mut S {
        &mut self.system
    }

    /// Mutable access to the hardware clock source.
    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    /// Mutable access to the network time client.
    pub fn network_mut(&mut self) -> &mut N {
        &mut self.network
    }

    /// Runs the one-time bootstrap phase and opens the start gate.
    ///
    /// Seeds the system clock from the hardware clock, starts the network
    /// client, and polls its sync status up to the configured bound. Sync
    /// not arriving in time is logged but not fatal: the local and hardware
    /// clocks remain usable and the periodic cycle takes over.
    ///
    /// Returns the number of polls spent waiting.
    pub fn bootstrap(&mut self) -> u32 {
        match self.hardware.read() {
            Ok(reading) => match self.system.write(&reading) {
                Ok(()) => info!(%reading, "system clock seeded from hardware clock"),
                Err(e) => warn!("seeding system clock failed: {e}"),
            },
            Err(e) => warn!("hardware clock unavailable at bootstrap: {e}"),
        }

        self.network.start();

        let max = self.config.bootstrap_max_polls;
        let mut polls = 0;
        while !self.network.is_synced() && polls < max {
            polls += 1;
            info!("waiting for network time... ({polls}/{max})");
            (self.sleep)(self.config.bootstrap_poll_interval);
        }

        if self.network.is_synced() {
            info!("clocks updated with network time");
            self.apply_network_sync();
        } else {
            warn!("network time not acquired after {max} polls; continuing on local clocks");
        }

        self.gate.open();
        polls
    }

    /// Runs one steady-state reconciliation cycle.
    ///
    /// A delivered network sync reading short-circuits the cycle and is
    /// written to both clocks unconditionally. Otherwise both local sources
    /// are read and the plausibility matrix decides which one, if either,
    /// gets overwritten. A source that fails to read counts as implausible
    /// for this cycle; correction is deferred to the next cycle or to
    /// network time.
    pub fn reconcile_once(&mut self) -> ReconcileOutcome {
        if self.apply_network_sync() {
            return ReconcileOutcome::NetworkApplied;
        }

        let system_reading = self.system.read();
        let hardware_reading = self.hardware.read();
        let system_plausible = self.is_plausible(&system_reading);
        let hardware_plausible = self.is_plausible(&hardware_reading);

        match (system_plausible, hardware_plausible) {
            (true, false) => {
                warn!("hardware clock out! updating from system clock");
                if let Ok(reading) = &system_reading
                    && let Err(e) = self.hardware.write(reading)
                {
                    warn!("hardware clock correction failed: {e}");
                }
                ReconcileOutcome::HardwareCorrected
            }
            (false, true) => {
                warn!("system clock out! updating from hardware clock");
                if let Ok(reading) = &hardware_reading
                    && let Err(e) = self.system.write(reading)
                {
                    warn!("system clock correction failed: {e}");
                }
                ReconcileOutcome::SystemCorrected
            }
            (false, false) => {
                warn!("both clocks out! restarting network time sync");
                self.network.restart();
                ReconcileOutcome::NetworkRestarted
            }
            (true, true) => {
                if let (Ok(system), Ok(hardware)) = (&system_reading, &hardware_reading) {
                    info!(system = %system, hardware = %hardware, "clocks in agreement");
                }
                ReconcileOutcome::InSync
            }
        }
    }

    /// Runs bootstrap and then reconciles forever at the configured period.
    pub fn run(&mut self) -> ! {
        self.bootstrap();
        loop {
            let outcome = self.reconcile_once();
            debug!(?outcome, "reconciliation cycle complete");
            (self.sleep)(self.config.cycle_interval);
        }
    }

    /// Drains a pending network sync delivery into both clocks.
    ///
    /// Network time is the highest-trust source: when it arrives it is
    /// written unconditionally, and per-clock write failures are logged
    /// individually so one bad clock does not block the other.
    fn apply_network_sync(&mut self) -> bool {
        let Some(reading) = self.network.try_take_sync() else {
            return false;
        };

        match self.system.write(&reading) {
            Ok(()) => info!(%reading, "system clock set from network time"),
            Err(e) => warn!("network sync done, system clock reported error: {e}"),
        }
        match self.hardware.write(&reading) {
            Ok(()) => info!(%reading, "hardware clock set from network time"),
            Err(e) => warn!("network sync done, hardware clock reported error: {e}"),
        }
        true
    }

    fn is_plausible(
        &self,
        reading: &std::result::Result<ClockReading, crate::error::ClockError>,
    ) -> bool {
        match reading {
            Ok(r) => r.valid && r.year >= self.config.min_plausible_year,
            Err(_) => false,
        }
    }
}
