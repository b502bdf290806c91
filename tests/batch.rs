//! Batch job tests

mod common;

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{eventually, DownStore, FlakyRiskStore};
use rockwatch::alerts::AlertDispatcher;
use rockwatch::batch::{BatchJobs, PREDEFINED_MINES};
use rockwatch::config::{BatchConfig, GeneratorConfig, WeatherConfig};
use rockwatch::error::{DispatchError, WeatherError};
use rockwatch::weather::{StaticWeather, Weather, WeatherSource};
use rockwatch::{Database, SensorStore};

struct WeatherOutage;

#[async_trait]
impl WeatherSource for WeatherOutage {
    async fn fetch_current(&self, _: f64, _: f64) -> Result<Weather, WeatherError> {
        Err(WeatherError::Status(503))
    }
}

#[derive(Default)]
struct CountingDispatcher {
    calls: AtomicUsize,
}

#[async_trait]
impl AlertDispatcher for CountingDispatcher {
    async fn notify(&self, _: &str, _: &str, _: &str, _: f64) -> Result<(), DispatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn small_batch() -> BatchConfig {
    BatchConfig {
        readings_per_mine: 30,
        ..BatchConfig::default()
    }
}

fn jobs(store: Arc<dyn SensorStore>, weather: Arc<dyn WeatherSource>, batch: BatchConfig) -> BatchJobs {
    let generator = GeneratorConfig {
        seed: Some(7),
        ..GeneratorConfig::default()
    };
    BatchJobs::new(store, weather, batch, &generator, &WeatherConfig::default())
}

fn mild_weather() -> Arc<dyn WeatherSource> {
    Arc::new(StaticWeather(Weather {
        temperature: 31.0,
        rainfall: 12.0,
    }))
}

#[tokio::test]
async fn test_generate_mine_data_seeds_every_mine() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let mut jobs = jobs(db.clone(), mild_weather(), BatchConfig::default());

    let report = jobs.generate_mine_data().await;

    assert!(report.success);
    assert_eq!(report.failed, 0);
    assert_eq!(report.mines.len(), PREDEFINED_MINES.len());
    assert_eq!(report.total_records, PREDEFINED_MINES.len() * 300);
    assert_eq!(db.reading_count(None).unwrap(), PREDEFINED_MINES.len() * 300);

    let mines = db.list_mines().await.unwrap();
    assert_eq!(mines.len(), PREDEFINED_MINES.len());
    for mine in &mines {
        assert!(mine.current_risk_level.is_some());
        let p = mine.current_risk_probability.unwrap();
        assert!((0.0..=1.0).contains(&p));
        assert_eq!(db.reading_count(Some(&mine.id)).unwrap(), 300);
    }
}

#[tokio::test]
async fn test_generate_mine_data_reuses_existing_mines() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let mut jobs = jobs(db.clone(), mild_weather(), small_batch());

    jobs.generate_mine_data().await;
    let first: Vec<String> = db.list_mines().await.unwrap().into_iter().map(|m| m.id).collect();
    jobs.generate_mine_data().await;
    let second: Vec<String> = db.list_mines().await.unwrap().into_iter().map(|m| m.id).collect();

    assert_eq!(first.len(), PREDEFINED_MINES.len());
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_one_failing_mine_does_not_stop_the_batch() {
    let store = Arc::new(FlakyRiskStore::new(&["Kolar Gold Fields"]));
    let mut jobs = jobs(store.clone(), mild_weather(), small_batch());

    let report = jobs.generate_mine_data().await;

    assert!(!report.success);
    assert_eq!(report.failed, 1);
    assert_eq!(report.mines.len(), PREDEFINED_MINES.len());
    assert_eq!(report.total_records, PREDEFINED_MINES.len() * 30);

    let broken = report
        .mines
        .iter()
        .find(|m| m.name == "Kolar Gold Fields")
        .unwrap();
    assert!(broken.error.is_some());
    assert!(broken.risk_level.is_none());

    let writes = store.risk_writes.lock();
    assert_eq!(writes.len(), PREDEFINED_MINES.len() - 1);
    assert!(writes.iter().any(|n| n == "Khetri Copper Complex"));
}

#[tokio::test]
async fn test_sync_weather_blends_current_conditions() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    jobs(db.clone(), mild_weather(), small_batch())
        .generate_mine_data()
        .await;

    let mut sync = jobs(db.clone(), mild_weather(), small_batch());
    let report = sync.sync_weather_data().await;

    assert!(report.success);
    assert_eq!(report.synced, PREDEFINED_MINES.len());
    assert_eq!(report.failed, 0);
    assert_eq!(db.reading_count(None).unwrap(), PREDEFINED_MINES.len() * 31);

    for mine in db.list_mines().await.unwrap() {
        let latest = db.fetch_latest(Some(&mine.id), 1).await.unwrap();
        assert_eq!(latest[0].temperature, 31.0);
        assert_eq!(latest[0].rainfall, 12.0);
        assert!(latest[0].is_valid());
    }
}

#[tokio::test]
async fn test_sync_weather_falls_back_to_defaults() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    jobs(db.clone(), mild_weather(), small_batch())
        .generate_mine_data()
        .await;

    let report = jobs(db.clone(), Arc::new(WeatherOutage), small_batch())
        .sync_weather_data()
        .await;
    assert!(report.success);

    let defaults = WeatherConfig::default();
    for mine in db.list_mines().await.unwrap() {
        let latest = db.fetch_latest(Some(&mine.id), 1).await.unwrap();
        assert_eq!(latest[0].temperature, defaults.fallback_temperature);
        assert_eq!(latest[0].rainfall, defaults.fallback_rainfall);
    }
}

#[tokio::test]
async fn test_sync_alerts_above_threshold() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    jobs(db.clone(), mild_weather(), small_batch())
        .generate_mine_data()
        .await;

    let dispatcher = Arc::new(CountingDispatcher::default());
    let mut sync =
        jobs(db.clone(), mild_weather(), small_batch()).with_alerts(dispatcher.clone(), 0.0);
    sync.sync_weather_data().await;

    assert!(eventually(|| dispatcher.calls.load(Ordering::SeqCst) == PREDEFINED_MINES.len()).await);

    let quiet = Arc::new(CountingDispatcher::default());
    let mut sync = jobs(db.clone(), mild_weather(), small_batch()).with_alerts(quiet.clone(), 1.0);
    sync.sync_weather_data().await;
    tokio::task::yield_now().await;
    assert_eq!(quiet.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unreachable_store_reports_failure() {
    let mut jobs = jobs(Arc::new(DownStore), mild_weather(), small_batch());

    let generated = jobs.generate_mine_data().await;
    assert!(!generated.success);
    assert!(generated.error.is_some());
    assert_eq!(generated.total_records, 0);

    let synced = jobs.sync_weather_data().await;
    assert!(!synced.success);
    assert_eq!(synced.synced, 0);
}
