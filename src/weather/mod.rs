// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/rockwatch

//! Current weather lookup for the weather-sync batch

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::WeatherConfig;
use crate::error::WeatherError;

/// Conditions blended into a synced reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    /// °C
    pub temperature: f64,
    /// mm
    pub rainfall: f64,
}

#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch_current(&self, latitude: f64, longitude: f64) -> Result<Weather, WeatherError>;
}

/// Open-Meteo forecast API client
pub struct OpenMeteoClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentConditions,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    temperature_2m: f64,
    #[serde(default)]
    precipitation: f64,
}

impl OpenMeteoClient {
    pub fn new(config: &WeatherConfig) -> Result<Self, WeatherError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    async fn fetch_current(&self, latitude: f64, longitude: f64) -> Result<Weather, WeatherError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("current", "temperature_2m,precipitation".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(WeatherError::Status(response.status().as_u16()));
        }

        let body: ForecastResponse = response.json().await?;
        debug!(
            "Weather at ({:.3}, {:.3}): {:.1}°C, {:.1}mm",
            latitude, longitude, body.current.temperature_2m, body.current.precipitation
        );

        Ok(Weather {
            temperature: body.current.temperature_2m,
            rainfall: body.current.precipitation.max(0.0),
        })
    }
}

/// Fixed conditions; used when weather lookups are disabled
pub struct StaticWeather(pub Weather);

#[async_trait]
impl WeatherSource for StaticWeather {
    async fn fetch_current(&self, _latitude: f64, _longitude: f64) -> Result<Weather, WeatherError> {
        Ok(self.0)
    }
}
