// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/rockwatch

//! Synthetic reading generator
//!
//! Live ticks are a random walk around the previous reading so trends carry
//! across ticks. Bulk history is drawn around a per-mine baseline with a slow
//! sinusoidal drift, which gives stored series a daily-looking cycle.

use chrono::{DateTime, Duration, Utc};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::Uniform;
use sha2::{Digest, Sha256};
use std::f64::consts::PI;

use super::SensorReading;
use crate::config::GeneratorConfig;

/// Per-tick offset half-ranges
const DISPLACEMENT_STEP: f64 = 0.4;
const STRAIN_STEP: f64 = 15.0;
const PORE_PRESSURE_STEP: f64 = 4.0;
const RAINFALL_SPAN: f64 = 15.0;
const RAINFALL_BIAS: f64 = 0.3;
const TEMPERATURE_STEP: f64 = 2.0;
const SLOPE_STEP: f64 = 0.25;

/// Daily temperature swing used by the historical drift
const TEMPERATURE_SWING: f64 = 4.0;

/// Steady-state values a reading series is drawn around
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    pub displacement: f64,
    pub strain: f64,
    pub pore_pressure: f64,
    pub rainfall: f64,
    pub temperature: f64,
    pub dem_slope: f64,
    pub crack_score: f64,
}

impl Baseline {
    /// Normal operating midpoints
    pub const NORMAL: Baseline = Baseline {
        displacement: 2.5,
        strain: 150.0,
        pore_pressure: 45.0,
        rainfall: 5.0,
        temperature: 24.0,
        dem_slope: 15.5,
        crack_score: 3.0,
    };

    /// Baseline derived from the mine identifier, so each mine sits in its own
    /// band without any stored per-mine settings
    pub fn for_mine(mine_id: &str) -> Self {
        let h = mine_hash(mine_id);

        Self {
            displacement: 1.5 + (h % 10) as f64 / 5.0,
            strain: 120.0 + ((h / 10) % 8) as f64 * 10.0,
            pore_pressure: 38.0 + ((h / 80) % 6) as f64 * 3.0,
            rainfall: 2.0 + ((h / 480) % 5) as f64,
            temperature: 22.0 + ((h / 2_400) % 7) as f64,
            dem_slope: 12.0 + ((h / 16_800) % 9) as f64 * 0.8,
            crack_score: 1.0 + ((h / 151_200) % 4) as f64,
        }
    }

    fn to_reading(self, mine_id: &str, timestamp: DateTime<Utc>) -> SensorReading {
        SensorReading {
            mine_id: mine_id.to_string(),
            displacement: self.displacement,
            strain: self.strain,
            pore_pressure: self.pore_pressure,
            rainfall: self.rainfall,
            temperature: self.temperature,
            dem_slope: self.dem_slope,
            crack_score: self.crack_score,
            timestamp,
        }
    }
}

/// Stable 64-bit hash of a mine id
pub fn mine_hash(mine_id: &str) -> u64 {
    let digest = Sha256::digest(mine_id.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

struct Perturbation {
    displacement: Uniform<f64>,
    strain: Uniform<f64>,
    pore_pressure: Uniform<f64>,
    temperature: Uniform<f64>,
    dem_slope: Uniform<f64>,
}

impl Perturbation {
    fn new() -> Self {
        Self {
            displacement: Uniform::new_inclusive(-DISPLACEMENT_STEP, DISPLACEMENT_STEP),
            strain: Uniform::new_inclusive(-STRAIN_STEP, STRAIN_STEP),
            pore_pressure: Uniform::new_inclusive(-PORE_PRESSURE_STEP, PORE_PRESSURE_STEP),
            temperature: Uniform::new_inclusive(-TEMPERATURE_STEP, TEMPERATURE_STEP),
            dem_slope: Uniform::new_inclusive(-SLOPE_STEP, SLOPE_STEP),
        }
    }
}

/// Produces synthetic readings for simulated sessions and bulk backfill
pub struct ReadingGenerator {
    rng: ChaCha8Rng,
    noise: Perturbation,
    drift_period_hours: f64,
    drift_amplitude: f64,
}

impl ReadingGenerator {
    pub fn new(config: &GeneratorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        Self {
            rng,
            noise: Perturbation::new(),
            drift_period_hours: config.drift_period_hours.max(f64::EPSILON),
            drift_amplitude: config.drift_amplitude,
        }
    }

    /// Generator with a fixed seed and default drift settings
    pub fn seeded(seed: u64) -> Self {
        Self::new(&GeneratorConfig {
            seed: Some(seed),
            ..GeneratorConfig::default()
        })
    }

    /// Next reading, stamped now. The timestamp is nudged past the previous one
    /// if the clock has not moved, so a series stays strictly increasing.
    pub fn generate(&mut self, previous: Option<&SensorReading>, mine_id: &str) -> SensorReading {
        let now = Utc::now();
        let timestamp = match previous {
            Some(prev) if prev.timestamp >= now => prev.timestamp + Duration::milliseconds(1),
            _ => now,
        };
        self.generate_at(previous, mine_id, timestamp)
    }

    /// Next reading at an explicit instant: a random-walk step from `previous`,
    /// or from the normal baseline when there is none
    pub fn generate_at(
        &mut self,
        previous: Option<&SensorReading>,
        mine_id: &str,
        timestamp: DateTime<Utc>,
    ) -> SensorReading {
        let base = match previous {
            Some(prev) => SensorReading {
                mine_id: mine_id.to_string(),
                timestamp,
                ..prev.clone()
            },
            None => Baseline::NORMAL.to_reading(mine_id, timestamp),
        };
        self.perturb(base)
    }

    /// Hourly random-walk history ending at `end`, oldest first
    pub fn backfill_session(
        &mut self,
        mine_id: &str,
        hours: usize,
        end: DateTime<Utc>,
    ) -> Vec<SensorReading> {
        let mut readings: Vec<SensorReading> = Vec::with_capacity(hours);

        for i in 0..hours {
            let timestamp = end - Duration::hours((hours - 1 - i) as i64);
            let next = self.generate_at(readings.last(), mine_id, timestamp);
            readings.push(next);
        }

        readings
    }

    /// Bulk history for one mine: `count` readings spaced by `step` ending at
    /// `end`, oldest first, drifting sinusoidally around the mine's baseline
    pub fn historical(
        &mut self,
        mine_id: &str,
        count: usize,
        step: Duration,
        end: DateTime<Utc>,
    ) -> Vec<SensorReading> {
        let baseline = Baseline::for_mine(mine_id);
        let phase_offset = (mine_hash(mine_id) % 360) as f64 * PI / 180.0;

        (0..count)
            .map(|i| {
                let timestamp = end - step * (count - 1 - i) as i32;
                let hours = timestamp.timestamp() as f64 / 3600.0;
                let wave = (2.0 * PI * hours / self.drift_period_hours + phase_offset).sin();
                let scale = 1.0 + self.drift_amplitude * wave;

                let base = SensorReading {
                    mine_id: mine_id.to_string(),
                    displacement: baseline.displacement * scale,
                    strain: baseline.strain * scale,
                    pore_pressure: baseline.pore_pressure * scale,
                    rainfall: baseline.rainfall * scale,
                    temperature: baseline.temperature + TEMPERATURE_SWING * wave,
                    dem_slope: baseline.dem_slope,
                    crack_score: baseline.crack_score,
                    timestamp,
                };
                self.perturb(base)
            })
            .collect()
    }

    fn perturb(&mut self, mut reading: SensorReading) -> SensorReading {
        let rng = &mut self.rng;

        reading.displacement += self.noise.displacement.sample(rng);
        reading.strain += self.noise.strain.sample(rng);
        reading.pore_pressure += self.noise.pore_pressure.sample(rng);
        reading.rainfall += (rng.gen::<f64>() - RAINFALL_BIAS) * RAINFALL_SPAN;
        reading.temperature += self.noise.temperature.sample(rng);
        reading.dem_slope += self.noise.dem_slope.sample(rng);
        reading.crack_score += rng.gen_range(-1i32..=1) as f64;

        reading.clamped()
    }
}
