//! Store doubles shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use rockwatch::error::StoreError;
use rockwatch::{Database, Mine, RiskLevel, SensorReading, SensorStore};

/// Store that is always unreachable
pub struct DownStore;

#[async_trait]
impl SensorStore for DownStore {
    async fn fetch_latest(&self, _: Option<&str>, _: usize) -> Result<Vec<SensorReading>, StoreError> {
        Err(StoreError::Unavailable("connection timed out".to_string()))
    }

    async fn insert(&self, _: &SensorReading) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection timed out".to_string()))
    }

    fn subscribe_inserts(&self) -> BoxStream<'static, SensorReading> {
        futures::stream::pending().boxed()
    }

    async fn upsert_mine_risk(&self, _: &str, _: f64, _: RiskLevel, _: DateTime<Utc>) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection timed out".to_string()))
    }

    async fn list_mines(&self) -> Result<Vec<Mine>, StoreError> {
        Err(StoreError::Unavailable("connection timed out".to_string()))
    }

    async fn upsert_mine(&self, _: &Mine) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection timed out".to_string()))
    }
}

/// Empty store whose first fetch blocks until released
pub struct GatedStore {
    pub gate: Arc<Notify>,
}

#[async_trait]
impl SensorStore for GatedStore {
    async fn fetch_latest(&self, mine_id: Option<&str>, _: usize) -> Result<Vec<SensorReading>, StoreError> {
        self.gate.notified().await;
        Ok(vec![SensorReading::zeroed(mine_id.unwrap_or("m"), Utc::now())])
    }

    async fn insert(&self, _: &SensorReading) -> Result<(), StoreError> {
        Ok(())
    }

    fn subscribe_inserts(&self) -> BoxStream<'static, SensorReading> {
        futures::stream::pending().boxed()
    }

    async fn upsert_mine_risk(&self, _: &str, _: f64, _: RiskLevel, _: DateTime<Utc>) -> Result<(), StoreError> {
        Ok(())
    }

    async fn list_mines(&self) -> Result<Vec<Mine>, StoreError> {
        Ok(Vec::new())
    }

    async fn upsert_mine(&self, _: &Mine) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Real in-memory database that refuses risk writes for chosen mine names
pub struct FlakyRiskStore {
    pub inner: Database,
    pub broken_names: HashSet<String>,
    pub risk_writes: Mutex<Vec<String>>,
}

impl FlakyRiskStore {
    pub fn new(broken: &[&str]) -> Self {
        Self {
            inner: Database::open_in_memory().unwrap(),
            broken_names: broken.iter().map(|s| s.to_string()).collect(),
            risk_writes: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SensorStore for FlakyRiskStore {
    async fn fetch_latest(&self, mine_id: Option<&str>, limit: usize) -> Result<Vec<SensorReading>, StoreError> {
        self.inner.fetch_latest(mine_id, limit).await
    }

    async fn insert(&self, reading: &SensorReading) -> Result<(), StoreError> {
        self.inner.insert(reading).await
    }

    async fn insert_batch(&self, readings: &[SensorReading]) -> Result<usize, StoreError> {
        self.inner.insert_batch(readings).await
    }

    fn subscribe_inserts(&self) -> BoxStream<'static, SensorReading> {
        self.inner.subscribe_inserts()
    }

    async fn upsert_mine_risk(
        &self,
        mine_id: &str,
        probability: f64,
        level: RiskLevel,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mine = self.inner.get_mine(mine_id).await?;
        if let Some(mine) = mine {
            if self.broken_names.contains(&mine.name) {
                return Err(StoreError::Unavailable("write timed out".to_string()));
            }
            self.risk_writes.lock().push(mine.name);
        }
        self.inner
            .upsert_mine_risk(mine_id, probability, level, updated_at)
            .await
    }

    async fn list_mines(&self) -> Result<Vec<Mine>, StoreError> {
        self.inner.list_mines().await
    }

    async fn upsert_mine(&self, mine: &Mine) -> Result<(), StoreError> {
        self.inner.upsert_mine(mine).await
    }

    async fn get_mine(&self, mine_id: &str) -> Result<Option<Mine>, StoreError> {
        self.inner.get_mine(mine_id).await
    }
}

/// Real in-memory database where a new row lands between subscribe and fetch
pub struct RacingStore {
    pub inner: Database,
    pub late_row: SensorReading,
}

#[async_trait]
impl SensorStore for RacingStore {
    async fn fetch_latest(&self, mine_id: Option<&str>, limit: usize) -> Result<Vec<SensorReading>, StoreError> {
        self.inner.insert(&self.late_row).await?;
        self.inner.fetch_latest(mine_id, limit).await
    }

    async fn insert(&self, reading: &SensorReading) -> Result<(), StoreError> {
        self.inner.insert(reading).await
    }

    fn subscribe_inserts(&self) -> BoxStream<'static, SensorReading> {
        self.inner.subscribe_inserts()
    }

    async fn upsert_mine_risk(
        &self,
        mine_id: &str,
        probability: f64,
        level: RiskLevel,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.inner
            .upsert_mine_risk(mine_id, probability, level, updated_at)
            .await
    }

    async fn list_mines(&self) -> Result<Vec<Mine>, StoreError> {
        self.inner.list_mines().await
    }

    async fn upsert_mine(&self, mine: &Mine) -> Result<(), StoreError> {
        self.inner.upsert_mine(mine).await
    }
}

/// Poll `check` until it holds or two seconds pass
pub async fn eventually<F: FnMut() -> bool>(mut check: F) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
