//! Scheduler loop + watering session on simulated time.
//!
//! The loop runs on the test thread against a `ManualClock`; sleeps cost
//! nothing, and the clock's sleep hook stands in for "later, elsewhere"
//! (queries, cancellation).

use std::sync::Arc;
use std::time::Duration;

use bonsai::adapters::time::ManualClock;
use bonsai::app::events::{AppEvent, SessionOutcome};
use bonsai::app::ports::{Clock, StoreError};
use bonsai::cancel::CancellationToken;
use bonsai::config::WateringConfig;
use bonsai::error::Error;
use bonsai::scheduler::{SchedulerPorts, WaterScheduler};
use bonsai::session::{PumpLine, SessionController};
use bonsai::status::{KEY_WATER_TIME_LEFT, Status, StatusProbe, StatusReporter};
use chrono::{DateTime, TimeDelta, TimeZone, Utc};

use crate::mock_hw::{MemoryStore, MockPump, MockSense, RecordingDisplay, RecordingSink};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
}

struct Harness {
    scheduler: WaterScheduler<MockSense, MockPump>,
    clock: Arc<ManualClock>,
    store: Arc<MemoryStore>,
    probe: StatusProbe,
    display: RecordingDisplay,
    sink: RecordingSink,
    pump: MockPump,
}

fn harness(interval: u64, duration: u64, store: MemoryStore, sense: MockSense, pump: MockPump) -> Harness {
    let config = WateringConfig::new("17", "27", interval, duration);
    let clock = Arc::new(ManualClock::new(t0()));
    let store = Arc::new(store);
    let display = RecordingDisplay::default();
    let sink = RecordingSink::default();
    let probe = StatusProbe::new(store.clone(), clock.clone(), config.duration());
    let session = SessionController::new(
        sense,
        Arc::new(PumpLine::new(pump.clone())),
        clock.clone(),
        probe.clone(),
        config.duration(),
        config.timing,
    );
    let scheduler = WaterScheduler::new(
        session,
        SchedulerPorts {
            store: store.clone(),
            clock: clock.clone(),
            probe: probe.clone(),
            reporter: StatusReporter::new(Box::new(display.clone())),
            events: Box::new(sink.clone()),
        },
        &config,
    );
    Harness {
        scheduler,
        clock,
        store,
        probe,
        display,
        sink,
        pump,
    }
}

/// Cancel once `n` advances have been persisted, or at `limit` uptime.
fn cancel_after_writes(h: &Harness, n: usize, limit: Duration) -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let store = h.store.clone();
    h.clock.on_sleep(move |uptime| {
        if store.writes().len() >= n || uptime >= limit {
            trigger.cancel();
        }
    });
    cancel
}

fn sessions_started(sink: &RecordingSink) -> usize {
    sink.count(|e| matches!(e, AppEvent::SessionStarted { .. }))
}

// ── Concrete 5 s / 2 s scenario ───────────────────────────────

#[test]
fn overdue_schedule_waters_once_and_advances_by_interval() {
    let due = t0() - TimeDelta::seconds(1);
    let mut h = harness(5, 2, MemoryStore::holding(due), MockSense::dry(), MockPump::new());
    let cancel = cancel_after_writes(&h, 1, Duration::from_secs(60));

    h.scheduler.run(&cancel).unwrap();

    let writes = h.pump.writes();
    let (last, ons) = writes.split_last().unwrap();
    assert!(ons.len() >= 20, "at least 2 s of 100 ms ticks");
    assert!(ons.iter().all(|&on| on));
    assert!(!last);

    assert_eq!(h.store.writes(), vec![due + TimeDelta::seconds(5)]);
    assert_eq!(sessions_started(&h.sink), 1);
    assert!(!h.probe.is_watering());
}

#[test]
fn first_session_starts_on_the_first_wake() {
    let mut h = harness(5, 2, MemoryStore::holding(t0() - TimeDelta::seconds(1)), MockSense::dry(), MockPump::new());
    let cancel = cancel_after_writes(&h, 1, Duration::from_secs(60));

    h.scheduler.run(&cancel).unwrap();

    // Woke at 5 s, watered 2 s, cancelled while waiting for the 10 s wake.
    assert_eq!(h.clock.uptime(), Duration::from_secs(10));
    let finished = h.sink.events().into_iter().find_map(|e| match e {
        AppEvent::SessionFinished { outcome, ran_for } => Some((outcome, ran_for)),
        _ => None,
    });
    assert_eq!(finished, Some((SessionOutcome::Completed, Duration::from_secs(2))));
}

// ── Restart resilience ────────────────────────────────────────

#[test]
fn long_overdue_schedule_runs_exactly_one_session_before_rescheduling() {
    let due = t0() - TimeDelta::days(1);
    let mut h = harness(3600, 2, MemoryStore::holding(due), MockSense::dry(), MockPump::new());
    let cancel = cancel_after_writes(&h, 1, Duration::from_secs(60));

    h.scheduler.run(&cancel).unwrap();

    assert_eq!(sessions_started(&h.sink), 1);
    assert_eq!(h.store.writes(), vec![due + TimeDelta::hours(1)]);
}

#[test]
fn future_schedule_does_not_water() {
    let mut h = harness(
        3600,
        2,
        MemoryStore::holding(t0() + TimeDelta::minutes(10)),
        MockSense::dry(),
        MockPump::new(),
    );
    let cancel = cancel_after_writes(&h, 1, Duration::from_secs(120));

    h.scheduler.run(&cancel).unwrap();

    assert!(h.pump.writes().is_empty());
    assert!(h.store.writes().is_empty());
}

// ── Drift ─────────────────────────────────────────────────────

#[test]
fn due_times_stay_on_the_interval_grid() {
    let first = t0() + TimeDelta::seconds(3);
    let mut h = harness(10, 2, MemoryStore::holding(first), MockSense::dry(), MockPump::new());
    let cancel = cancel_after_writes(&h, 5, Duration::from_secs(600));

    h.scheduler.run(&cancel).unwrap();

    let expected: Vec<_> = (1..=5).map(|k| first + TimeDelta::seconds(10 * k)).collect();
    assert_eq!(h.store.writes(), expected);
    assert_eq!(sessions_started(&h.sink), 5);
}

// ── Status pushes ─────────────────────────────────────────────

#[test]
fn idle_pushes_every_second_wake() {
    let mut h = harness(
        86_400,
        30,
        MemoryStore::holding(t0() + TimeDelta::hours(1)),
        MockSense::dry(),
        MockPump::new(),
    );
    let cancel = cancel_after_writes(&h, 1, Duration::from_secs(31));

    h.scheduler.run(&cancel).unwrap();

    let shown = h.display.shown();
    assert_eq!(
        shown,
        vec![
            ("Time till water:".to_string(), "59m50s".to_string()),
            ("Time till water:".to_string(), "59m40s".to_string()),
            ("Time till water:".to_string(), "59m30s".to_string()),
        ]
    );
}

#[test]
fn session_pushes_every_twenty_ticks() {
    let mut h = harness(60, 5, MemoryStore::holding(t0() - TimeDelta::seconds(1)), MockSense::dry(), MockPump::new());
    let cancel = cancel_after_writes(&h, 1, Duration::from_secs(60));

    h.scheduler.run(&cancel).unwrap();

    // The 10 s wake is already due when the session ends, so it runs at
    // once and makes the idle push.
    assert_eq!(
        h.display.shown(),
        vec![
            ("Time left:".to_string(), "3s".to_string()),
            ("Time left:".to_string(), "1s".to_string()),
            ("Time till water:".to_string(), "49s".to_string()),
        ]
    );
}

#[test]
fn unplugged_display_does_not_affect_watering() {
    let mut h = harness(5, 2, MemoryStore::holding(t0() - TimeDelta::seconds(1)), MockSense::dry(), MockPump::new());
    h.display.unplug();
    let cancel = cancel_after_writes(&h, 1, Duration::from_secs(60));

    h.scheduler.run(&cancel).unwrap();

    assert_eq!(h.pump.writes().len(), 21);
    assert_eq!(h.store.writes().len(), 1);
}

// ── Sensor and actuator faults ────────────────────────────────

#[test]
fn failing_sense_keeps_pump_off_for_the_whole_session() {
    let sense = MockSense::dry();
    sense.set_level(None);
    let mut h = harness(5, 2, MemoryStore::holding(t0() - TimeDelta::seconds(1)), sense, MockPump::new());
    let cancel = cancel_after_writes(&h, 1, Duration::from_secs(60));

    h.scheduler.run(&cancel).unwrap();

    assert!(h.pump.writes().iter().all(|&on| !on));
    assert_eq!(h.sink.count(|e| matches!(e, AppEvent::SensorFault { pump_on: false, .. })), 20);
    assert_eq!(h.store.writes().len(), 1);
}

#[test]
fn fault_mid_session_holds_the_last_good_decision() {
    let script = [Some(false), Some(false), None, None, Some(true), None];
    let sense = MockSense::scripted(script);
    sense.set_level(Some(true));
    let mut h = harness(5, 1, MemoryStore::holding(t0() - TimeDelta::seconds(1)), sense, MockPump::new());
    let cancel = cancel_after_writes(&h, 1, Duration::from_secs(60));

    h.scheduler.run(&cancel).unwrap();

    assert_eq!(&h.pump.writes()[..6], &[true, true, true, true, false, false]);
    assert_eq!(h.sink.count(|e| matches!(e, AppEvent::SensorFault { pump_on: true, .. })), 2);
}

#[test]
fn pump_that_cannot_be_switched_off_is_fatal() {
    let mut h = harness(
        5,
        2,
        MemoryStore::holding(t0() - TimeDelta::seconds(1)),
        MockSense::dry(),
        MockPump::failing_from(5),
    );
    let cancel = cancel_after_writes(&h, 2, Duration::from_secs(60));

    let err = h.scheduler.run(&cancel).unwrap_err();

    assert!(matches!(err, Error::Actuator(_)));
    assert_eq!(h.pump.writes(), vec![true; 5]);
    // The advance is still persisted before escalating.
    assert_eq!(h.store.writes().len(), 1);
    let outcome = h.sink.events().into_iter().find_map(|e| match e {
        AppEvent::SessionFinished { outcome, .. } => Some(outcome),
        _ => None,
    });
    assert!(matches!(outcome, Some(SessionOutcome::Failed(Error::Actuator(_)))));
}

// ── Store faults ──────────────────────────────────────────────

#[test]
fn unreadable_store_skips_wakes_without_watering() {
    let store = MemoryStore::holding(t0() - TimeDelta::seconds(1));
    store.set_fail_reads(true);
    let mut h = harness(5, 2, store, MockSense::dry(), MockPump::new());
    let cancel = cancel_after_writes(&h, 1, Duration::from_secs(30));

    assert!(h.scheduler.run(&cancel).is_ok());
    assert!(h.pump.writes().is_empty());
}

#[test]
fn store_recovering_later_resumes_watering() {
    let store = MemoryStore::holding(t0() - TimeDelta::seconds(1));
    store.set_fail_reads(true);
    let mut h = harness(5, 2, store, MockSense::dry(), MockPump::new());
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let store = h.store.clone();
    h.clock.on_sleep(move |uptime| {
        if uptime >= Duration::from_secs(12) {
            store.set_fail_reads(false);
        }
        if !store.writes().is_empty() {
            trigger.cancel();
        }
    });

    h.scheduler.run(&cancel).unwrap();

    assert_eq!(sessions_started(&h.sink), 1);
    assert_eq!(h.store.writes(), vec![t0() + TimeDelta::seconds(4)]);
}

#[test]
fn failed_advance_stops_the_loop() {
    let store = MemoryStore::holding(t0() - TimeDelta::seconds(1));
    store.set_fail_writes(true);
    let mut h = harness(5, 2, store, MockSense::dry(), MockPump::new());
    let cancel = cancel_after_writes(&h, 1, Duration::from_secs(60));

    let err = h.scheduler.run(&cancel).unwrap_err();

    assert!(matches!(err, Error::Store(StoreError::Io(_))));
    assert_eq!(h.pump.writes().last(), Some(&false));
    assert_eq!(sessions_started(&h.sink), 1);
}

// ── Cancellation ──────────────────────────────────────────────

#[test]
fn cancel_mid_session_leaves_pump_off_and_still_advances() {
    let due = t0() - TimeDelta::seconds(1);
    let mut h = harness(5, 30, MemoryStore::holding(due), MockSense::dry(), MockPump::new());
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    h.clock.on_sleep(move |uptime| {
        if uptime >= Duration::from_secs(8) {
            trigger.cancel();
        }
    });

    h.scheduler.run(&cancel).unwrap();

    assert_eq!(h.pump.writes().last(), Some(&false));
    assert!(!h.probe.is_watering());
    assert_eq!(h.store.writes(), vec![due + TimeDelta::seconds(5)]);
    let events = h.sink.events();
    assert!(events.iter().any(|e| matches!(
        e,
        AppEvent::SessionFinished {
            outcome: SessionOutcome::Cancelled,
            ..
        }
    )));
    assert_eq!(events.last(), Some(&AppEvent::Stopped));
    assert!(h.clock.uptime() < Duration::from_secs(9));
}

// ── Concurrent queries ────────────────────────────────────────

#[test]
fn remaining_time_strictly_decreases_during_a_session() {
    let mut h = harness(5, 2, MemoryStore::holding(t0() - TimeDelta::seconds(1)), MockSense::dry(), MockPump::new());
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let probe = h.probe.clone();
    let store = h.store.clone();
    let samples = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen = samples.clone();
    h.clock.on_sleep(move |uptime| {
        if let Status::Watering { remaining } = probe.current() {
            let readings = probe.readings();
            seen.lock()
                .unwrap()
                .push((uptime, remaining, readings[KEY_WATER_TIME_LEFT].clone()));
        }
        if !store.writes().is_empty() {
            trigger.cancel();
        }
    });

    h.scheduler.run(&cancel).unwrap();

    let samples = samples.lock().unwrap();
    assert_eq!(samples.len(), 20);
    assert!(samples.windows(2).all(|w| w[1].1 < w[0].1));
    let (_, last, last_reading) = samples.last().unwrap();
    assert_eq!(*last, Duration::ZERO);
    assert_eq!(last_reading, "0s");

    let whole_seconds: Vec<_> = samples
        .iter()
        .filter(|(uptime, _, _)| uptime.subsec_millis() == 0)
        .map(|(_, _, reading)| reading.as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(whole_seconds, vec!["1s", "0s"]);
}
