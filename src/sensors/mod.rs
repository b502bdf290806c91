//! Sensor module - readings, synthetic generation and reading sources

mod reading;
mod generator;
mod source;

pub use reading::{Mine, SensorReading, CRACK_SCORE_MAX};
pub use generator::{mine_hash, Baseline, ReadingGenerator};
pub use source::{ReadingSource, SourceEvent};
