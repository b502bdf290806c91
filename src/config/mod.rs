// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/rockwatch

//! Configuration module

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::risk::RiskModel;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Monitoring session settings
    pub session: SessionConfig,

    /// Synthetic reading generator
    pub generator: GeneratorConfig,

    /// Bulk data generation
    pub batch: BatchConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Weather source
    pub weather: WeatherConfig,

    /// Alert delivery
    pub alerts: AlertConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {:?}", path))?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("rockwatch"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

/// Monitoring session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Simulated tick period in milliseconds
    pub tick_interval_ms: u64,

    /// Rolling window capacity
    pub window_capacity: usize,

    /// Hourly readings generated when a simulated session starts
    pub backfill_hours: usize,

    /// Rows fetched when a live session starts
    pub live_fetch_limit: usize,

    /// Probability above which a critical event is raised
    pub critical_threshold: f64,

    /// Model used to score session readings
    pub risk_model: RiskModel,
}

impl SessionConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 3000,
            window_capacity: 50,
            backfill_hours: 24,
            live_fetch_limit: 50,
            critical_threshold: 0.8,
            risk_model: RiskModel::ThresholdBand,
        }
    }
}

/// Generator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Fixed seed; random when unset
    pub seed: Option<u64>,

    /// Period of the historical drift, hours
    pub drift_period_hours: f64,

    /// Drift amplitude as a fraction of the baseline
    pub drift_amplitude: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: None,
            drift_period_hours: 6.0,
            drift_amplitude: 0.15,
        }
    }
}

/// Bulk generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Historical readings per mine
    pub readings_per_mine: usize,

    /// Spacing between historical readings, minutes
    pub history_step_minutes: i64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            readings_per_mine: 300,
            history_step_minutes: 5,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database path
    pub path: PathBuf,

    /// How long a locked database is waited on before failing, milliseconds
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/rockwatch.db"),
            busy_timeout_ms: 2000,
        }
    }
}

/// Weather source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub enabled: bool,

    /// Forecast endpoint
    pub base_url: String,

    pub timeout_secs: u64,

    /// Used when the weather lookup fails
    pub fallback_temperature: f64,
    pub fallback_rainfall: f64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            timeout_secs: 10,
            fallback_temperature: 25.0,
            fallback_rainfall: 0.0,
        }
    }
}

/// Alert configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub enabled: bool,

    /// Webhook receiving alert payloads; alerts are only logged when unset
    pub webhook_url: Option<String>,

    /// Batch-path probability above which stakeholders are notified
    pub threshold: f64,

    /// Minimum gap between two alerts for the same mine, seconds
    pub cooldown_secs: u64,

    pub timeout_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            webhook_url: None,
            threshold: 0.7,
            cooldown_secs: 300,
            timeout_secs: 10,
        }
    }
}
