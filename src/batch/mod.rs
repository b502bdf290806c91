// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/rockwatch

//! Batch jobs - bulk history generation and weather sync
//!
//! Both jobs walk every mine and keep going when one mine fails; the failure
//! is logged and reported in the summary.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::alerts::{dispatch_detached, AlertDispatcher};
use crate::config::{BatchConfig, GeneratorConfig, WeatherConfig};
use crate::db::SensorStore;
use crate::error::StoreError;
use crate::risk::{RiskAssessment, RiskLevel, RiskModel};
use crate::sensors::{Mine, ReadingGenerator, SensorReading};
use crate::weather::{Weather, WeatherSource};

/// A mine site created by `generate-mine-data` when missing
#[derive(Debug, Clone, Copy)]
pub struct PredefinedMine {
    pub name: &'static str,
    pub location: &'static str,
    pub latitude: f64,
    pub longitude: f64,
}

pub const PREDEFINED_MINES: [PredefinedMine; 8] = [
    PredefinedMine { name: "Jharia Coalfield", location: "Dhanbad, Jharkhand", latitude: 23.7498, longitude: 86.4207 },
    PredefinedMine { name: "Singareni Open Cast", location: "Kothagudem, Telangana", latitude: 17.5510, longitude: 80.6190 },
    PredefinedMine { name: "Bailadila Iron Ore", location: "Dantewada, Chhattisgarh", latitude: 18.6070, longitude: 81.2150 },
    PredefinedMine { name: "Kolar Gold Fields", location: "Kolar, Karnataka", latitude: 12.9560, longitude: 78.2700 },
    PredefinedMine { name: "Neyveli Lignite", location: "Cuddalore, Tamil Nadu", latitude: 11.5950, longitude: 79.4890 },
    PredefinedMine { name: "Talcher Coalfield", location: "Angul, Odisha", latitude: 20.9490, longitude: 85.2330 },
    PredefinedMine { name: "Zawar Zinc Mines", location: "Udaipur, Rajasthan", latitude: 24.3530, longitude: 73.7170 },
    PredefinedMine { name: "Khetri Copper Complex", location: "Jhunjhunu, Rajasthan", latitude: 28.0020, longitude: 75.7870 },
];

/// Recomputes a mine's stored risk from its latest reading
pub struct MineRiskAggregator {
    store: Arc<dyn SensorStore>,
    model: RiskModel,
}

impl MineRiskAggregator {
    /// Aggregator using the four-level weighted-fraction model
    pub fn new(store: Arc<dyn SensorStore>) -> Self {
        Self::with_model(store, RiskModel::WeightedFraction)
    }

    pub fn with_model(store: Arc<dyn SensorStore>, model: RiskModel) -> Self {
        Self { store, model }
    }

    /// Score `reading` and write the result to the mine record
    pub async fn update(
        &self,
        mine_id: &str,
        reading: &SensorReading,
    ) -> Result<RiskAssessment, StoreError> {
        let risk = self.model.assess(reading);
        self.store
            .upsert_mine_risk(mine_id, risk.probability, risk.level, Utc::now())
            .await?;
        Ok(risk)
    }
}

/// Per-mine outcome of `generate-mine-data`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MineSummary {
    pub id: String,
    pub name: String,
    pub records: usize,
    pub risk_level: Option<RiskLevel>,
    pub risk_probability: Option<f64>,
    pub error: Option<String>,
}

/// Result of `generate-mine-data`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateReport {
    /// True when every mine was fully processed
    pub success: bool,
    pub total_records: usize,
    pub failed: usize,
    pub mines: Vec<MineSummary>,
    /// Set when the job could not start at all
    pub error: Option<String>,
}

/// Result of `sync-weather-data`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub success: bool,
    pub message: String,
    pub synced: usize,
    pub failed: usize,
}

/// Runs the batch jobs against one store
pub struct BatchJobs {
    store: Arc<dyn SensorStore>,
    aggregator: MineRiskAggregator,
    generator: ReadingGenerator,
    weather: Arc<dyn WeatherSource>,
    dispatcher: Option<Arc<dyn AlertDispatcher>>,
    config: BatchConfig,
    fallback_weather: Weather,
    alert_threshold: f64,
}

impl BatchJobs {
    pub fn new(
        store: Arc<dyn SensorStore>,
        weather: Arc<dyn WeatherSource>,
        config: BatchConfig,
        generator: &GeneratorConfig,
        weather_config: &WeatherConfig,
    ) -> Self {
        Self {
            aggregator: MineRiskAggregator::new(Arc::clone(&store)),
            store,
            generator: ReadingGenerator::new(generator),
            weather,
            dispatcher: None,
            config,
            fallback_weather: Weather {
                temperature: weather_config.fallback_temperature,
                rainfall: weather_config.fallback_rainfall,
            },
            alert_threshold: 0.7,
        }
    }

    /// Notify through `dispatcher` when a synced mine's risk exceeds `threshold`
    pub fn with_alerts(mut self, dispatcher: Arc<dyn AlertDispatcher>, threshold: f64) -> Self {
        self.dispatcher = Some(dispatcher);
        self.alert_threshold = threshold;
        self
    }

    /// Make sure every predefined mine exists; mines are matched by name
    pub async fn ensure_mines(&self) -> Result<Vec<Mine>, StoreError> {
        let existing = self.store.list_mines().await?;
        let mut mines = Vec::with_capacity(PREDEFINED_MINES.len());

        for site in PREDEFINED_MINES.iter() {
            if let Some(mine) = existing.iter().find(|m| m.name == site.name) {
                mines.push(mine.clone());
                continue;
            }

            let mine = Mine::new(
                &uuid::Uuid::new_v4().to_string(),
                site.name,
                site.location,
                site.latitude,
                site.longitude,
            );
            match self.store.upsert_mine(&mine).await {
                Ok(()) => {
                    info!("Created mine {} ({})", mine.name, mine.id);
                    mines.push(mine);
                }
                Err(e) => error!("Could not create mine {}: {}", site.name, e),
            }
        }

        Ok(mines)
    }

    /// Backfill history for every predefined mine and store each mine's risk
    pub async fn generate_mine_data(&mut self) -> GenerateReport {
        let mines = match self.ensure_mines().await {
            Ok(mines) => mines,
            Err(e) => {
                error!("generate-mine-data could not list mines: {}", e);
                return GenerateReport {
                    success: false,
                    total_records: 0,
                    failed: PREDEFINED_MINES.len(),
                    mines: Vec::new(),
                    error: Some(e.to_string()),
                };
            }
        };

        let step = Duration::minutes(self.config.history_step_minutes.max(1));
        let end = Utc::now();
        let mut summaries = Vec::with_capacity(mines.len());

        for mine in &mines {
            let readings =
                self.generator
                    .historical(&mine.id, self.config.readings_per_mine, step, end);
            summaries.push(self.store_history(mine, &readings).await);
        }

        // Mines the store refused to create count as failures too
        let missing = PREDEFINED_MINES.len().saturating_sub(mines.len());
        let failed = summaries.iter().filter(|s| s.error.is_some()).count() + missing;
        let total_records = summaries.iter().map(|s| s.records).sum();

        info!(
            "generate-mine-data: {} records for {} mines, {} failed",
            total_records,
            summaries.len(),
            failed
        );

        GenerateReport {
            success: failed == 0,
            total_records,
            failed,
            mines: summaries,
            error: None,
        }
    }

    async fn store_history(&self, mine: &Mine, readings: &[SensorReading]) -> MineSummary {
        let mut summary = MineSummary {
            id: mine.id.clone(),
            name: mine.name.clone(),
            records: 0,
            risk_level: None,
            risk_probability: None,
            error: None,
        };

        match self.store.insert_batch(readings).await {
            Ok(count) => summary.records = count,
            Err(e) => {
                error!("Storing history for {} failed: {}", mine.name, e);
                summary.error = Some(e.to_string());
                return summary;
            }
        }

        let Some(latest) = readings.last() else {
            return summary;
        };

        match self.aggregator.update(&mine.id, latest).await {
            Ok(risk) => {
                summary.risk_level = Some(risk.level);
                summary.risk_probability = Some(risk.probability);
            }
            Err(e) => {
                error!("Updating risk for {} failed: {}", mine.name, e);
                summary.error = Some(e.to_string());
            }
        }
        summary
    }

    /// Append one weather-blended reading per mine and refresh its risk
    pub async fn sync_weather_data(&mut self) -> SyncReport {
        let mines = match self.store.list_mines().await {
            Ok(mines) => mines,
            Err(e) => {
                error!("sync-weather-data could not list mines: {}", e);
                return SyncReport {
                    success: false,
                    message: format!("Could not list mines: {}", e),
                    synced: 0,
                    failed: 0,
                };
            }
        };

        let mut synced = 0;
        let mut failed = 0;

        for mine in &mines {
            match self.sync_mine(mine).await {
                Ok(risk) => {
                    synced += 1;
                    self.maybe_alert(mine, risk);
                }
                Err(e) => {
                    error!("Weather sync for {} failed: {}", mine.name, e);
                    failed += 1;
                }
            }
        }

        let message = format!("Weather data synced for {} of {} mines", synced, mines.len());
        info!("{}", message);

        SyncReport {
            success: failed == 0,
            message,
            synced,
            failed,
        }
    }

    async fn sync_mine(&mut self, mine: &Mine) -> Result<RiskAssessment, StoreError> {
        let weather = match self.weather.fetch_current(mine.latitude, mine.longitude).await {
            Ok(weather) => weather,
            Err(e) => {
                warn!("Weather lookup for {} failed, using defaults: {}", mine.name, e);
                self.fallback_weather
            }
        };

        let previous = match self.store.fetch_latest(Some(&mine.id), 1).await {
            Ok(mut rows) => rows.pop(),
            Err(e) => {
                warn!("No previous reading for {}: {}", mine.name, e);
                None
            }
        };

        let mut reading = self.generator.generate(previous.as_ref(), &mine.id);
        reading.temperature = weather.temperature;
        reading.rainfall = weather.rainfall;
        let reading = reading.clamped();

        self.store.insert(&reading).await?;
        self.aggregator.update(&mine.id, &reading).await
    }

    fn maybe_alert(&self, mine: &Mine, risk: RiskAssessment) {
        let Some(dispatcher) = &self.dispatcher else {
            return;
        };
        if risk.probability > self.alert_threshold {
            dispatch_detached(Arc::clone(dispatcher), mine.clone(), risk.probability);
        }
    }
}
