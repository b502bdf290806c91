// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/rockwatch

//! Database module for persistent storage

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::error::StoreError;
use crate::risk::RiskLevel;
use crate::sensors::{Mine, SensorReading};

/// Buffered insert notifications per subscriber
const INSERT_CHANNEL_CAPACITY: usize = 1024;

/// Persistence seen by the controller and the batch jobs
#[async_trait]
pub trait SensorStore: Send + Sync {
    /// Latest `limit` readings, newest first. All mines when `mine_id` is `None`.
    /// A reachable store with no rows returns an empty vector.
    async fn fetch_latest(
        &self,
        mine_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SensorReading>, StoreError>;

    async fn insert(&self, reading: &SensorReading) -> Result<(), StoreError>;

    async fn insert_batch(&self, readings: &[SensorReading]) -> Result<usize, StoreError> {
        for reading in readings {
            self.insert(reading).await?;
        }
        Ok(readings.len())
    }

    /// Readings inserted after the call, in insert order
    fn subscribe_inserts(&self) -> BoxStream<'static, SensorReading>;

    async fn upsert_mine_risk(
        &self,
        mine_id: &str,
        probability: f64,
        level: RiskLevel,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn list_mines(&self) -> Result<Vec<Mine>, StoreError>;

    /// Create the mine or update its descriptive fields
    async fn upsert_mine(&self, mine: &Mine) -> Result<(), StoreError>;

    async fn get_mine(&self, mine_id: &str) -> Result<Option<Mine>, StoreError> {
        Ok(self.list_mines().await?.into_iter().find(|m| m.id == mine_id))
    }
}

/// SQLite-backed store
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    inserts: broadcast::Sender<SensorReading>,
}

impl Database {
    /// Open or create database
    pub fn open(config: &DatabaseConfig) -> Result<Self, StoreError> {
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }

        let conn = Connection::open(&config.path)?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;

        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        "#,
        )?;

        let db = Self::with_connection(conn)?;
        info!("Database opened at {:?}", config.path);
        Ok(db)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let (inserts, _) = broadcast::channel(INSERT_CHANNEL_CAPACITY);
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            inserts,
        };
        db.create_tables()?;
        Ok(db)
    }

    /// Create database tables
    fn create_tables(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS mines (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                location TEXT NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                current_risk_level TEXT,
                current_risk_probability REAL,
                last_updated TEXT
            );

            CREATE TABLE IF NOT EXISTS sensor_readings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                mine_id TEXT NOT NULL,
                displacement REAL NOT NULL,
                strain REAL NOT NULL,
                pore_pressure REAL NOT NULL,
                rainfall REAL NOT NULL,
                temperature REAL NOT NULL,
                dem_slope REAL NOT NULL,
                crack_score REAL NOT NULL,
                timestamp TEXT NOT NULL,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_readings_mine_time
                ON sensor_readings(mine_id, timestamp);
            CREATE INDEX IF NOT EXISTS idx_readings_time ON sensor_readings(timestamp);
        "#,
        )?;

        Ok(())
    }

    fn insert_row(conn: &Connection, reading: &SensorReading) -> Result<(), StoreError> {
        conn.execute(
            r#"INSERT INTO sensor_readings
               (mine_id, displacement, strain, pore_pressure, rainfall,
                temperature, dem_slope, crack_score, timestamp)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
            params![
                reading.mine_id,
                reading.displacement,
                reading.strain,
                reading.pore_pressure,
                reading.rainfall,
                reading.temperature,
                reading.dem_slope,
                reading.crack_score,
                format_timestamp(&reading.timestamp),
            ],
        )?;
        Ok(())
    }

    fn notify(&self, reading: SensorReading) {
        // No subscribers is not an error
        let _ = self.inserts.send(reading);
    }

    /// Number of stored readings, optionally for one mine
    pub fn reading_count(&self, mine_id: Option<&str>) -> Result<usize, StoreError> {
        let conn = self.conn.lock();
        let count: i64 = match mine_id {
            Some(id) => conn.query_row(
                "SELECT COUNT(*) FROM sensor_readings WHERE mine_id = ?1",
                params![id],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM sensor_readings", [], |row| row.get(0))?,
        };
        Ok(count as usize)
    }
}

#[async_trait]
impl SensorStore for Database {
    async fn fetch_latest(
        &self,
        mine_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SensorReading>, StoreError> {
        let conn = self.conn.lock();
        let limit = limit as i64;

        const COLUMNS: &str = "mine_id, displacement, strain, pore_pressure, rainfall, \
                               temperature, dem_slope, crack_score, timestamp";

        let mut results = Vec::new();
        match mine_id {
            Some(id) => {
                let sql = format!(
                    "SELECT {} FROM sensor_readings WHERE mine_id = ?1 \
                     ORDER BY timestamp DESC, id DESC LIMIT ?2",
                    COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![id, limit], read_row)?;
                for row in rows {
                    results.push(row??);
                }
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM sensor_readings ORDER BY timestamp DESC, id DESC LIMIT ?1",
                    COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![limit], read_row)?;
                for row in rows {
                    results.push(row??);
                }
            }
        }

        Ok(results)
    }

    async fn insert(&self, reading: &SensorReading) -> Result<(), StoreError> {
        {
            let conn = self.conn.lock();
            Self::insert_row(&conn, reading)?;
        }
        self.notify(reading.clone());
        Ok(())
    }

    async fn insert_batch(&self, readings: &[SensorReading]) -> Result<usize, StoreError> {
        {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            for reading in readings {
                Self::insert_row(&tx, reading)?;
            }
            tx.commit()?;
        }

        for reading in readings {
            self.notify(reading.clone());
        }
        debug!("Inserted {} readings", readings.len());
        Ok(readings.len())
    }

    fn subscribe_inserts(&self) -> BoxStream<'static, SensorReading> {
        let rx = self.inserts.subscribe();

        futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(reading) => return Some((reading, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Insert subscriber lagged, skipped {} readings", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }

    async fn upsert_mine_risk(
        &self,
        mine_id: &str,
        probability: f64,
        level: RiskLevel,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            r#"UPDATE mines
               SET current_risk_probability = ?2, current_risk_level = ?3, last_updated = ?4
               WHERE id = ?1"#,
            params![mine_id, probability, level.as_str(), format_timestamp(&updated_at)],
        )?;

        if changed == 0 {
            return Err(StoreError::Query(format!("no mine with id '{}'", mine_id)));
        }
        Ok(())
    }

    async fn list_mines(&self) -> Result<Vec<Mine>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"SELECT id, name, location, latitude, longitude,
                      current_risk_level, current_risk_probability, last_updated
               FROM mines ORDER BY name"#,
        )?;

        let rows = stmt.query_map([], read_mine)?;
        let mut mines = Vec::new();
        for row in rows {
            mines.push(row??);
        }
        Ok(mines)
    }

    async fn upsert_mine(&self, mine: &Mine) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            r#"INSERT INTO mines (id, name, location, latitude, longitude)
               VALUES (?1, ?2, ?3, ?4, ?5)
               ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   location = excluded.location,
                   latitude = excluded.latitude,
                   longitude = excluded.longitude"#,
            params![mine.id, mine.name, mine.location, mine.latitude, mine.longitude],
        )?;
        Ok(())
    }

    async fn get_mine(&self, mine_id: &str) -> Result<Option<Mine>, StoreError> {
        let conn = self.conn.lock();
        let mine = conn
            .query_row(
                r#"SELECT id, name, location, latitude, longitude,
                          current_risk_level, current_risk_probability, last_updated
                   FROM mines WHERE id = ?1"#,
                params![mine_id],
                read_mine,
            )
            .optional()?;
        mine.transpose()
    }
}

/// Fixed-width UTC text so lexical order matches time order
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization(format!("bad timestamp '{}': {}", text, e)))
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<Result<SensorReading, StoreError>> {
    let timestamp: String = row.get(8)?;
    let reading = SensorReading {
        mine_id: row.get(0)?,
        displacement: row.get(1)?,
        strain: row.get(2)?,
        pore_pressure: row.get(3)?,
        rainfall: row.get(4)?,
        temperature: row.get(5)?,
        dem_slope: row.get(6)?,
        crack_score: row.get(7)?,
        timestamp: Utc::now(),
    };
    Ok(parse_timestamp(&timestamp).map(|timestamp| SensorReading { timestamp, ..reading }))
}

fn read_mine(row: &Row<'_>) -> rusqlite::Result<Result<Mine, StoreError>> {
    let level: Option<String> = row.get(5)?;
    let updated: Option<String> = row.get(7)?;
    let mut mine = Mine {
        id: row.get(0)?,
        name: row.get(1)?,
        location: row.get(2)?,
        latitude: row.get(3)?,
        longitude: row.get(4)?,
        current_risk_level: None,
        current_risk_probability: row.get(6)?,
        last_updated: None,
    };

    if let Some(level) = level {
        match level.parse::<RiskLevel>() {
            Ok(level) => mine.current_risk_level = Some(level),
            Err(e) => return Ok(Err(StoreError::Serialization(e))),
        }
    }
    if let Some(updated) = updated {
        match parse_timestamp(&updated) {
            Ok(ts) => mine.last_updated = Some(ts),
            Err(e) => return Ok(Err(e)),
        }
    }
    Ok(Ok(mine))
}
