//! Monitoring session tests

mod common;

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use tokio::sync::{broadcast, Notify};

use common::{eventually, DownStore, GatedStore, RacingStore};
use rockwatch::config::{GeneratorConfig, SessionConfig};
use rockwatch::core::{ControllerEvent, Degradation, Event, LoadingState};
use rockwatch::{Database, SensorDataController, SensorReading, SensorStore, SessionKey};

/// Session config whose timer never fires during a test
fn manual_ticks() -> SessionConfig {
    SessionConfig {
        tick_interval_ms: 3_600_000,
        ..SessionConfig::default()
    }
}

fn seeded() -> GeneratorConfig {
    GeneratorConfig {
        seed: Some(2024),
        ..GeneratorConfig::default()
    }
}

fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<ControllerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event.payload);
    }
    events
}

fn saw_state(events: &[ControllerEvent], state: LoadingState) -> bool {
    events
        .iter()
        .any(|e| matches!(e, ControllerEvent::StateChanged(s) if *s == state))
}

fn dangerous(mine: &str, offset_secs: i64) -> SensorReading {
    SensorReading {
        displacement: 9.0,
        strain: 350.0,
        pore_pressure: 90.0,
        rainfall: 60.0,
        crack_score: 10.0,
        ..SensorReading::zeroed(mine, Utc::now() + ChronoDuration::seconds(offset_secs))
    }
}

#[tokio::test]
async fn test_simulated_start_backfills_a_day() {
    let store: Arc<dyn SensorStore> = Arc::new(Database::open_in_memory().unwrap());
    let controller =
        SensorDataController::new(SessionKey::simulated(Some("m1")), manual_ticks(), &seeded(), store);

    controller.start().await.unwrap();
    let snap = controller.snapshot();

    assert_eq!(snap.state, LoadingState::Ready);
    assert_eq!(snap.readings.len(), 24);
    assert!(snap.risk.is_some());
    assert!(snap.degradation.is_none());
    assert_eq!(snap.current_reading.as_ref(), snap.readings.last());
    assert!(snap.readings.windows(2).all(|p| p[0].timestamp <= p[1].timestamp));
}

#[tokio::test]
async fn test_window_is_bounded_and_ordered() {
    let store: Arc<dyn SensorStore> = Arc::new(Database::open_in_memory().unwrap());
    let controller =
        SensorDataController::new(SessionKey::simulated(Some("m1")), manual_ticks(), &seeded(), store);
    controller.start().await.unwrap();

    for _ in 0..120 {
        let risk = controller.tick().unwrap();
        assert!((0.0..=1.0).contains(&risk.probability));
    }

    let snap = controller.snapshot();
    assert_eq!(snap.readings.len(), 50);
    assert!(snap.readings.windows(2).all(|p| p[0].timestamp <= p[1].timestamp));
    assert!(snap.readings.iter().all(SensorReading::is_valid));
}

#[tokio::test]
async fn test_timer_drives_simulated_session() {
    let store: Arc<dyn SensorStore> = Arc::new(Database::open_in_memory().unwrap());
    let config = SessionConfig {
        tick_interval_ms: 5,
        ..SessionConfig::default()
    };
    let controller =
        SensorDataController::new(SessionKey::simulated(Some("m1")), config, &seeded(), store);
    controller.start().await.unwrap();

    assert!(eventually(|| controller.snapshot().readings.len() >= 27).await);
    controller.stop();
}

#[tokio::test]
async fn test_simulated_ticks_are_persisted_in_background() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let store: Arc<dyn SensorStore> = db.clone();
    let controller =
        SensorDataController::new(SessionKey::simulated(Some("m1")), manual_ticks(), &seeded(), store);
    controller.start().await.unwrap();

    for _ in 0..3 {
        controller.tick();
    }
    assert!(eventually(|| db.reading_count(Some("m1")).unwrap() == 3).await);
}

#[tokio::test]
async fn test_persistence_failure_never_blocks_ticks() {
    let controller = SensorDataController::new(
        SessionKey::simulated(Some("m1")),
        manual_ticks(),
        &seeded(),
        Arc::new(DownStore),
    );
    controller.start().await.unwrap();

    for _ in 0..10 {
        assert!(controller.tick().is_some());
    }
    assert_eq!(controller.snapshot().readings.len(), 34);
    assert_eq!(controller.snapshot().state, LoadingState::Ready);
}

#[tokio::test]
async fn test_live_empty_store_falls_back_without_error() {
    let store: Arc<dyn SensorStore> = Arc::new(Database::open_in_memory().unwrap());
    let controller =
        SensorDataController::new(SessionKey::live(Some("m1")), manual_ticks(), &seeded(), store);
    let mut rx = controller.subscribe();

    controller.start().await.unwrap();
    let snap = controller.snapshot();
    let events = drain(&mut rx);

    assert_eq!(snap.state, LoadingState::Ready);
    assert_eq!(snap.readings.len(), 24);
    assert_eq!(
        snap.degradation,
        Some(Degradation::NoLiveData {
            mine_id: Some("m1".to_string())
        })
    );
    assert!(!saw_state(&events, LoadingState::Error));
    assert!(events.iter().any(|e| matches!(e, ControllerEvent::Degraded(_))));

    // Degraded sessions keep running on generated data
    assert!(controller.tick().is_some());
}

#[tokio::test]
async fn test_live_outage_is_reported_as_error() {
    let controller = SensorDataController::new(
        SessionKey::live(Some("m1")),
        manual_ticks(),
        &seeded(),
        Arc::new(DownStore),
    );
    let mut rx = controller.subscribe();

    controller.start().await.unwrap();
    let events = drain(&mut rx);
    let snap = controller.snapshot();

    assert!(saw_state(&events, LoadingState::Error));
    assert_eq!(snap.state, LoadingState::Ready);
    assert!(matches!(
        snap.degradation,
        Some(Degradation::StoreUnavailable { .. })
    ));
    assert_eq!(snap.readings.len(), 24);
}

#[tokio::test]
async fn test_live_session_follows_inserts() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let base = Utc::now() - ChronoDuration::minutes(10);
    for i in 0..60 {
        let mut r = SensorReading::zeroed("m1", base + ChronoDuration::seconds(i));
        r.strain = i as f64;
        db.insert(&r).await.unwrap();
    }
    db.insert(&SensorReading::zeroed("other", Utc::now())).await.unwrap();

    let store: Arc<dyn SensorStore> = db.clone();
    let controller =
        SensorDataController::new(SessionKey::live(Some("m1")), manual_ticks(), &seeded(), store);
    controller.start().await.unwrap();

    let snap = controller.snapshot();
    assert_eq!(snap.readings.len(), 50);
    assert!(snap.degradation.is_none());
    assert_eq!(snap.readings.first().unwrap().strain, 10.0);
    assert_eq!(snap.readings.last().unwrap().strain, 59.0);

    // Live sessions are not timer driven
    assert!(controller.tick().is_none());

    let mut fresh = SensorReading::zeroed("m1", Utc::now());
    fresh.strain = 500.0;
    db.insert(&fresh).await.unwrap();
    db.insert(&SensorReading::zeroed("other", Utc::now())).await.unwrap();

    assert!(eventually(|| controller.snapshot().readings.last().map(|r| r.strain) == Some(500.0)).await);
    let snap = controller.snapshot();
    assert_eq!(snap.readings.len(), 50);
    assert!(snap.readings.iter().all(|r| r.mine_id == "m1"));
}

#[tokio::test]
async fn test_critical_risk_raises_event() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    db.insert(&dangerous("m1", -60)).await.unwrap();

    let store: Arc<dyn SensorStore> = db.clone();
    let controller =
        SensorDataController::new(SessionKey::live(Some("m1")), manual_ticks(), &seeded(), store);
    let mut rx = controller.subscribe();
    controller.start().await.unwrap();

    db.insert(&dangerous("m1", 0)).await.unwrap();

    let critical = tokio::time::timeout(std::time::Duration::from_secs(2), async {
        loop {
            if let Ok(event) = rx.recv().await {
                if let ControllerEvent::Critical { mine_id, risk, .. } = event.payload {
                    return (mine_id, risk);
                }
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(critical.0, "m1");
    assert_eq!(critical.1.probability, 1.0);
}

#[tokio::test]
async fn test_row_inserted_during_initial_fetch_is_applied_once() {
    let late_row = dangerous("m1", 0);
    let store = Arc::new(RacingStore {
        inner: Database::open_in_memory().unwrap(),
        late_row: late_row.clone(),
    });
    let controller =
        SensorDataController::new(SessionKey::live(Some("m1")), manual_ticks(), &seeded(), store);
    let mut rx = controller.subscribe();

    controller.start().await.unwrap();
    // Let the subscription deliver its copy of the row
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let snap = controller.snapshot();
    assert_eq!(snap.readings, vec![late_row]);
    let events = drain(&mut rx);
    assert!(!events.iter().any(|e| matches!(e, ControllerEvent::Updated { .. })));
    assert!(!events.iter().any(|e| matches!(e, ControllerEvent::Critical { .. })));
}

#[tokio::test]
async fn test_stop_is_idempotent_and_freezes_window() {
    let store: Arc<dyn SensorStore> = Arc::new(Database::open_in_memory().unwrap());
    let controller =
        SensorDataController::new(SessionKey::simulated(None), manual_ticks(), &seeded(), store);
    controller.start().await.unwrap();
    controller.tick();

    controller.stop();
    controller.stop();

    let before = controller.snapshot();
    assert_eq!(before.state, LoadingState::Idle);
    assert!(!controller.is_running());
    assert!(controller.tick().is_none());
    assert_eq!(controller.snapshot().readings, before.readings);
    assert_eq!(before.readings.last().unwrap().mine_id, "simulated");
}

#[tokio::test]
async fn test_stop_during_fetch_discards_result() {
    let gate = Arc::new(Notify::new());
    let store = Arc::new(GatedStore { gate: gate.clone() });
    let controller = Arc::new(SensorDataController::new(
        SessionKey::live(Some("m1")),
        manual_ticks(),
        &seeded(),
        store,
    ));

    let starting = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.start().await })
    };

    assert!(eventually(|| controller.snapshot().state == LoadingState::Loading).await);
    controller.stop();
    gate.notify_one();
    starting.await.unwrap().unwrap();

    let snap = controller.snapshot();
    assert!(snap.readings.is_empty());
    assert_eq!(snap.state, LoadingState::Idle);
    assert!(!controller.is_running());
}

#[tokio::test]
async fn test_restart_after_stop() {
    let store: Arc<dyn SensorStore> = Arc::new(Database::open_in_memory().unwrap());
    let controller =
        SensorDataController::new(SessionKey::simulated(Some("m1")), manual_ticks(), &seeded(), store);

    controller.start().await.unwrap();
    controller.stop();
    controller.start().await.unwrap();

    assert!(controller.is_running());
    assert!(controller.tick().is_some());
}
