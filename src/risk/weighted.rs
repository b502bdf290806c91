// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/rockwatch

//! Weighted-fraction score used by the batch analytics path

use crate::sensors::SensorReading;

/// Assumed maxima: displacement, strain, pore pressure, rainfall, temperature,
/// slope, crack score
pub const FACTOR_MAXIMA: [f64; 7] = [20.0, 500.0, 100.0, 100.0, 50.0, 90.0, 10.0];

/// Weights in the same order, summing to 1
pub const FACTOR_WEIGHTS: [f64; 7] = [0.25, 0.20, 0.15, 0.15, 0.10, 0.10, 0.05];

fn fraction(value: f64, max: f64) -> f64 {
    if value.is_finite() {
        (value / max).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Weighted sum of per-factor fractions, in 0..=1
pub fn weighted_fraction_score(reading: &SensorReading) -> f64 {
    let values = [
        reading.displacement,
        reading.strain,
        reading.pore_pressure,
        reading.rainfall,
        reading.temperature,
        reading.dem_slope,
        reading.crack_score,
    ];

    let total: f64 = values
        .iter()
        .zip(FACTOR_MAXIMA.iter())
        .zip(FACTOR_WEIGHTS.iter())
        .map(|((value, max), weight)| fraction(*value, *max) * weight)
        .sum();

    total.clamp(0.0, 1.0)
}
