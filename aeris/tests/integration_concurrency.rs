//! Concurrency tests for the shared measurement store.
//!
//! Many producer threads hammer partial updates while readers take
//! snapshots; readers must never observe a half-applied update.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use aeris::{MeasurementUpdate, SharedMeasurementStore};

#[test]
fn test_snapshots_never_see_torn_updates() {
    let store = SharedMeasurementStore::new();
    let stop = Arc::new(AtomicBool::new(false));

    // Writer A always writes light_lux == pressure_hpa in one call;
    // writer B always writes temp_internal_c == temp_external_c in one
    // call. Store-level atomicity means every snapshot preserves both
    // pair equalities, even though the two writers interleave freely.
    let writer_a = {
        let store = store.clone();
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut value = 0.0_f64;
            while !stop.load(Ordering::Relaxed) {
                value += 1.0;
                store.store(
                    MeasurementUpdate::new()
                        .with_light_lux(value)
                        .with_pressure_hpa(value),
                );
            }
        })
    };

    let writer_b = {
        let store = store.clone();
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut value = 0.0_f64;
            while !stop.load(Ordering::Relaxed) {
                value -= 1.0;
                store.store(
                    MeasurementUpdate::new()
                        .with_temp_internal_c(value)
                        .with_temp_external_c(value),
                );
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut snapshots = 0_u64;
                while !stop.load(Ordering::Relaxed) {
                    let m = store.latest();
                    assert_eq!(
                        m.light_lux, m.pressure_hpa,
                        "torn update from writer A observed"
                    );
                    assert_eq!(
                        m.temp_internal_c, m.temp_external_c,
                        "torn update from writer B observed"
                    );
                    snapshots += 1;
                }
                snapshots
            })
        })
        .collect();

    thread::sleep(std::time::Duration::from_millis(200));
    stop.store(true, Ordering::Relaxed);

    writer_a.join().unwrap();
    writer_b.join().unwrap();
    for reader in readers {
        let snapshots = reader.join().unwrap();
        assert!(snapshots > 0, "reader made no progress");
    }
}

#[test]
fn test_disjoint_writers_compose() {
    // Two producers on disjoint field sets: the final state contains the
    // last value each wrote, independent of interleaving.
    let store = SharedMeasurementStore::new();

    let fast = {
        let store = store.clone();
        thread::spawn(move || {
            for i in 1..=1000_i32 {
                store.store(
                    MeasurementUpdate::new()
                        .with_light_lux(f64::from(i))
                        .with_timestamp(i64::from(i)),
                );
            }
        })
    };

    let slow = {
        let store = store.clone();
        thread::spawn(move || {
            for i in 1..=1000_i32 {
                store.store(
                    MeasurementUpdate::new()
                        .with_humidity_pct(f64::from(i))
                        .with_probe_status(i),
                );
            }
        })
    };

    fast.join().unwrap();
    slow.join().unwrap();

    let m = store.latest();
    assert_eq!(m.light_lux, 1000.0);
    assert_eq!(m.timestamp, 1000);
    assert_eq!(m.humidity_pct, 1000.0);
    assert_eq!(m.probe_status, 1000);
}
