// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/rockwatch

//! Session event bus for controller consumers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

use super::{Degradation, LoadingState};
use crate::risk::RiskAssessment;
use crate::sensors::SensorReading;

/// Something a session consumer may react to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ControllerEvent {
    StateChanged(LoadingState),

    /// A reading entered the window and was scored
    Updated {
        reading: SensorReading,
        risk: RiskAssessment,
    },

    /// Risk crossed the critical threshold. The consumer decides whether to alert.
    Critical {
        mine_id: String,
        reading: SensorReading,
        risk: RiskAssessment,
    },

    /// The session is running on synthetic data
    Degraded(Degradation),
}

/// Event with sequence number and publish time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: ControllerEvent,
}

/// Broadcast hub owned by one controller
pub struct EventBus {
    event_tx: broadcast::Sender<Event>,
    event_counter: AtomicU64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity.max(1));

        Self {
            event_tx,
            event_counter: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, payload: ControllerEvent) {
        let id = self.event_counter.fetch_add(1, Ordering::Relaxed);
        let event = Event {
            id,
            timestamp: Utc::now(),
            payload,
        };
        // Nobody listening is fine
        let _ = self.event_tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    pub fn published(&self) -> u64 {
        self.event_counter.load(Ordering::Relaxed)
    }
}
