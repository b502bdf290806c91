// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/rockwatch

//! Rockwatch - rockfall risk monitoring for open-pit mines
//!
//! Ingests per-mine sensor readings (displacement, strain, pore pressure,
//! rainfall, temperature, slope, crack score), scores rockfall risk and raises
//! alerts when it turns critical.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Generator / │ → │   Session    │ → │  Risk model  │ → │  Event bus   │
//! │  Store feed  │   │  controller  │   │              │   │  (consumers) │
//! └──────────────┘   └──────────────┘   └──────────────┘   └──────┬───────┘
//!                                                                 ↓
//! ┌──────────────┐   ┌──────────────┐                      ┌──────────────┐
//! │   Weather    │ → │  Batch jobs  │ → Mine risk (store)  │ Alert relay  │
//! └──────────────┘   └──────────────┘                      └──────────────┘
//! ```

#![warn(missing_docs)]

pub mod alerts;
pub mod batch;
pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod risk;
pub mod sensors;
pub mod weather;

// Re-exports for convenience
pub use config::Config;
pub use core::{SensorDataController, SessionKey, SessionMode, SessionSnapshot};
pub use db::{Database, SensorStore};
pub use risk::{RiskAssessment, RiskLevel, RiskModel};
pub use sensors::{Mine, ReadingGenerator, SensorReading};

/// Rockwatch version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Rockwatch name
pub const NAME: &str = "Rockwatch";
