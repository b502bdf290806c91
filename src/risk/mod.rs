//! Risk module - rockfall risk models and classification
//!
//! Two models are kept side by side and chosen explicitly by the caller:
//!
//! - [`RiskModel::ThresholdBand`] awards points per factor band and is used by
//!   live monitoring sessions (three levels).
//! - [`RiskModel::WeightedFraction`] sums weighted fractions of assumed maxima and
//!   is used by the batch aggregator (four levels).
//!
//! They are tuned independently and give different numbers for the same reading.

mod bands;
mod weighted;

pub use bands::{threshold_band_points, THRESHOLD_BAND_CAP};
pub use weighted::{weighted_fraction_score, FACTOR_MAXIMA, FACTOR_WEIGHTS};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::sensors::SensorReading;

/// Discrete risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    /// Only produced by the weighted-fraction model
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            other => Err(format!("unknown risk level '{}'", other)),
        }
    }
}

/// Risk derived from one reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// 0..=1
    pub probability: f64,
    pub level: RiskLevel,
}

/// Risk scoring strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskModel {
    #[default]
    ThresholdBand,
    WeightedFraction,
}

impl RiskModel {
    /// Score a reading. Pure: no I/O, no state.
    pub fn assess(&self, reading: &SensorReading) -> RiskAssessment {
        let probability = match self {
            RiskModel::ThresholdBand => {
                threshold_band_points(reading).min(THRESHOLD_BAND_CAP) / THRESHOLD_BAND_CAP
            }
            RiskModel::WeightedFraction => weighted_fraction_score(reading),
        };

        RiskAssessment {
            probability,
            level: self.classify(probability),
        }
    }

    /// Map a probability to this model's levels. All comparisons are strict.
    pub fn classify(&self, probability: f64) -> RiskLevel {
        match self {
            RiskModel::ThresholdBand => match probability {
                p if p > 0.7 => RiskLevel::High,
                p if p > 0.4 => RiskLevel::Medium,
                _ => RiskLevel::Low,
            },
            RiskModel::WeightedFraction => match probability {
                p if p > 0.7 => RiskLevel::Critical,
                p if p > 0.5 => RiskLevel::High,
                p if p > 0.3 => RiskLevel::Medium,
                _ => RiskLevel::Low,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RiskModel::ThresholdBand => "threshold_band",
            RiskModel::WeightedFraction => "weighted_fraction",
        }
    }
}

/// Score with the threshold-band model
pub fn score(reading: &SensorReading) -> RiskAssessment {
    RiskModel::ThresholdBand.assess(reading)
}
