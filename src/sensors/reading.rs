// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/rockwatch

//! Reading and mine records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::risk::RiskLevel;

/// Upper bound of the visual crack score
pub const CRACK_SCORE_MAX: f64 = 10.0;

/// One multi-sensor sample for one mine at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub mine_id: String,

    /// Slope displacement in mm
    pub displacement: f64,
    /// Rock strain in microstrain
    pub strain: f64,
    /// Pore water pressure in kPa
    pub pore_pressure: f64,
    /// Rainfall in mm
    pub rainfall: f64,
    /// Air temperature in °C, may be negative
    pub temperature: f64,
    /// Slope angle from the elevation model, degrees
    pub dem_slope: f64,
    /// Visual crack score, 0-10
    pub crack_score: f64,

    pub timestamp: DateTime<Utc>,
}

impl SensorReading {
    /// A reading with every magnitude at zero
    pub fn zeroed(mine_id: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            mine_id: mine_id.to_string(),
            displacement: 0.0,
            strain: 0.0,
            pore_pressure: 0.0,
            rainfall: 0.0,
            temperature: 0.0,
            dem_slope: 0.0,
            crack_score: 0.0,
            timestamp,
        }
    }

    /// Enforce the physical ranges: magnitudes never negative, crack score in 0..=10.
    /// Temperature is left alone.
    pub fn clamped(mut self) -> Self {
        self.displacement = self.displacement.max(0.0);
        self.strain = self.strain.max(0.0);
        self.pore_pressure = self.pore_pressure.max(0.0);
        self.rainfall = self.rainfall.max(0.0);
        self.dem_slope = self.dem_slope.max(0.0);
        self.crack_score = self.crack_score.clamp(0.0, CRACK_SCORE_MAX);
        self
    }

    /// True when all fields are finite and inside their ranges
    pub fn is_valid(&self) -> bool {
        let fields = [
            self.displacement,
            self.strain,
            self.pore_pressure,
            self.rainfall,
            self.temperature,
            self.dem_slope,
            self.crack_score,
        ];
        fields.iter().all(|v| v.is_finite())
            && self.displacement >= 0.0
            && self.strain >= 0.0
            && self.pore_pressure >= 0.0
            && self.rainfall >= 0.0
            && self.dem_slope >= 0.0
            && (0.0..=CRACK_SCORE_MAX).contains(&self.crack_score)
    }
}

/// A monitored mine site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mine {
    pub id: String,
    pub name: String,
    /// Human readable location, e.g. "Dhanbad, Jharkhand"
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,

    pub current_risk_level: Option<RiskLevel>,
    pub current_risk_probability: Option<f64>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Mine {
    pub fn new(id: &str, name: &str, location: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            location: location.to_string(),
            latitude,
            longitude,
            current_risk_level: None,
            current_risk_probability: None,
            last_updated: None,
        }
    }
}
