// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/rockwatch

//! Threshold-band points

use crate::sensors::{SensorReading, CRACK_SCORE_MAX};

/// Points at which the probability saturates
pub const THRESHOLD_BAND_CAP: f64 = 100.0;

/// (exclusive lower bound, points), highest band first
const DISPLACEMENT_BANDS: [(f64, f64); 3] = [(8.0, 30.0), (5.0, 20.0), (3.0, 10.0)];
const STRAIN_BANDS: [(f64, f64); 3] = [(300.0, 25.0), (200.0, 15.0), (150.0, 8.0)];
const PORE_PRESSURE_BANDS: [(f64, f64); 3] = [(80.0, 20.0), (60.0, 12.0), (45.0, 6.0)];
const RAINFALL_BANDS: [(f64, f64); 3] = [(50.0, 15.0), (25.0, 10.0), (10.0, 5.0)];

fn band_points(value: f64, bands: &[(f64, f64)]) -> f64 {
    bands
        .iter()
        .find(|(threshold, _)| value > *threshold)
        .map(|(_, points)| *points)
        .unwrap_or(0.0)
}

/// Uncapped point total for a reading. Temperature and slope do not contribute.
pub fn threshold_band_points(reading: &SensorReading) -> f64 {
    let crack = if reading.crack_score.is_finite() {
        reading.crack_score.clamp(0.0, CRACK_SCORE_MAX)
    } else {
        0.0
    };

    band_points(reading.displacement, &DISPLACEMENT_BANDS)
        + band_points(reading.strain, &STRAIN_BANDS)
        + band_points(reading.pore_pressure, &PORE_PRESSURE_BANDS)
        + band_points(reading.rainfall, &RAINFALL_BANDS)
        + crack
}
