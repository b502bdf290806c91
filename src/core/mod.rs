//! Core module - monitoring sessions

mod controller;
mod event_bus;
mod scheduler;
mod window;

pub use controller::SensorDataController;
pub use event_bus::{ControllerEvent, Event, EventBus};
pub use scheduler::Scheduler;
pub use window::RollingWindow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::risk::RiskAssessment;
use crate::sensors::SensorReading;

/// Mine id used by simulated sessions that are not scoped to a mine
pub const SIMULATED_MINE_ID: &str = "simulated";

/// Where session readings come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Generator on a timer
    Simulated,
    /// Readings inserted into the store
    Live,
}

/// Identity of one monitoring session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub mode: SessionMode,
    /// `None` watches every mine in live mode
    pub mine_id: Option<String>,
}

impl SessionKey {
    pub fn simulated(mine_id: Option<&str>) -> Self {
        Self {
            mode: SessionMode::Simulated,
            mine_id: mine_id.map(str::to_string),
        }
    }

    pub fn live(mine_id: Option<&str>) -> Self {
        Self {
            mode: SessionMode::Live,
            mine_id: mine_id.map(str::to_string),
        }
    }

    /// Mine id stamped on generated readings
    pub fn generated_mine_id(&self) -> &str {
        self.mine_id.as_deref().unwrap_or(SIMULATED_MINE_ID)
    }
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadingState {
    Idle,
    Loading,
    Ready,
    Updating,
    Error,
}

/// Why a session is running on synthetic data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    /// Store reachable but had no readings
    NoLiveData { mine_id: Option<String> },
    /// Store could not be reached
    StoreUnavailable { reason: String },
}

/// Copy of the session state handed to consumers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub key: SessionKey,
    pub state: LoadingState,
    /// Oldest first
    pub readings: Vec<SensorReading>,
    pub current_reading: Option<SensorReading>,
    pub risk: Option<RiskAssessment>,
    pub last_update: Option<DateTime<Utc>>,
    pub degradation: Option<Degradation>,
}
