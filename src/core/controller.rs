// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/rockwatch

//! Sensor data controller - one monitoring session
//!
//! The controller owns the rolling window for a `(mode, mine)` session. A
//! single driver task pulls "next reading" events from a [`ReadingSource`]
//! (timer or store subscription) and applies them. Every start/stop bumps an
//! epoch; work that began under an older epoch is dropped instead of applied,
//! so nothing touches the window after `stop()`.

use anyhow::{anyhow, Result};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{
    ControllerEvent, Degradation, Event, EventBus, LoadingState, RollingWindow, SessionKey,
    SessionMode, SessionSnapshot,
};
use crate::config::{GeneratorConfig, SessionConfig};
use crate::db::SensorStore;
use crate::risk::RiskAssessment;
use crate::sensors::{ReadingGenerator, ReadingSource, SensorReading, SourceEvent};

const EVENT_CAPACITY: usize = 256;

struct SessionState {
    state: LoadingState,
    window: RollingWindow,
    risk: Option<RiskAssessment>,
    last_update: Option<chrono::DateTime<Utc>>,
    degradation: Option<Degradation>,
    generator: ReadingGenerator,
    running: bool,
    epoch: u64,
}

struct Shared {
    key: SessionKey,
    config: SessionConfig,
    store: Arc<dyn SensorStore>,
    events: EventBus,
    state: Mutex<SessionState>,
}

/// Drives one monitoring session
pub struct SensorDataController {
    shared: Arc<Shared>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl SensorDataController {
    pub fn new(
        key: SessionKey,
        config: SessionConfig,
        generator: &GeneratorConfig,
        store: Arc<dyn SensorStore>,
    ) -> Self {
        let state = SessionState {
            state: LoadingState::Idle,
            window: RollingWindow::new(config.window_capacity),
            risk: None,
            last_update: None,
            degradation: None,
            generator: ReadingGenerator::new(generator),
            running: false,
            epoch: 0,
        };

        Self {
            shared: Arc::new(Shared {
                key,
                config,
                store,
                events: EventBus::new(EVENT_CAPACITY),
                state: Mutex::new(state),
            }),
            driver: Mutex::new(None),
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.shared.key
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.shared.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    /// Load the initial window and start the update loop.
    ///
    /// Simulated sessions backfill hourly history. Live sessions fetch the
    /// latest rows and follow inserts; if the store is empty or unreachable the
    /// session falls back to generated data and reports a [`Degradation`].
    /// Calling `start` on a running session does nothing.
    pub async fn start(&self) -> Result<()> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(anyhow!("controller must be started inside a tokio runtime"));
        }

        let shared = &self.shared;
        let epoch = {
            let mut s = shared.state.lock();
            if s.running {
                debug!("Session {:?} already running", shared.key);
                return Ok(());
            }
            s.running = true;
            s.epoch += 1;
            s.state = LoadingState::Loading;
            s.epoch
        };
        shared.events.publish(ControllerEvent::StateChanged(LoadingState::Loading));
        info!("Starting {:?} session for {}", shared.key.mode, shared.describe_mine());

        let source = match shared.key.mode {
            SessionMode::Simulated => {
                shared.load_simulated(epoch, None);
                ReadingSource::interval(shared.config.tick_interval())
            }
            SessionMode::Live => {
                // Subscribe before fetching so no insert falls between the two
                let inserts = shared.store.subscribe_inserts();
                let fetched = shared
                    .store
                    .fetch_latest(shared.key.mine_id.as_deref(), shared.config.live_fetch_limit)
                    .await;

                if !shared.is_current(epoch) {
                    debug!("Session stopped during initial fetch, discarding result");
                    return Ok(());
                }

                match fetched {
                    Ok(rows) if !rows.is_empty() => {
                        shared.load_live(epoch, rows);
                        ReadingSource::subscription(inserts, shared.key.mine_id.clone())
                    }
                    Ok(_) => {
                        warn!(
                            "No stored readings for {}, falling back to simulated data",
                            shared.describe_mine()
                        );
                        shared.load_simulated(
                            epoch,
                            Some(Degradation::NoLiveData {
                                mine_id: shared.key.mine_id.clone(),
                            }),
                        );
                        ReadingSource::interval(shared.config.tick_interval())
                    }
                    Err(e) => {
                        error!("Live fetch failed for {}: {}", shared.describe_mine(), e);
                        shared.enter_error(epoch);
                        shared.load_simulated(
                            epoch,
                            Some(Degradation::StoreUnavailable {
                                reason: e.to_string(),
                            }),
                        );
                        ReadingSource::interval(shared.config.tick_interval())
                    }
                }
            }
        };

        let driver = tokio::spawn(drive(Arc::clone(shared), source, epoch));

        // stop() may have run while the driver was being set up
        if shared.is_current(epoch) {
            if let Some(old) = self.driver.lock().replace(driver) {
                old.abort();
            }
        } else {
            driver.abort();
        }
        Ok(())
    }

    /// Generate and apply one synthetic reading now.
    ///
    /// Only meaningful for sessions running on generated data; live sessions
    /// are driven by inserts and return `None`.
    pub fn tick(&self) -> Option<RiskAssessment> {
        let epoch = {
            let s = self.shared.state.lock();
            if !s.running || !self.shared.is_generating(&s) {
                return None;
            }
            s.epoch
        };
        self.shared.apply_tick(epoch)
    }

    /// Release the timer or subscription. Safe to call any number of times.
    pub fn stop(&self) {
        let driver = self.driver.lock().take();

        let was_running = {
            let mut s = self.shared.state.lock();
            let was_running = s.running;
            s.running = false;
            s.epoch += 1;
            if was_running {
                s.state = LoadingState::Idle;
            }
            was_running
        };

        if let Some(driver) = driver {
            driver.abort();
        }

        if was_running {
            self.shared
                .events
                .publish(ControllerEvent::StateChanged(LoadingState::Idle));
            info!("Stopped session for {}", self.shared.describe_mine());
        }
    }

    /// Current session state
    pub fn snapshot(&self) -> SessionSnapshot {
        let s = self.shared.state.lock();
        SessionSnapshot {
            key: self.shared.key.clone(),
            state: s.state,
            readings: s.window.to_vec(),
            current_reading: s.window.latest().cloned(),
            risk: s.risk,
            last_update: s.last_update,
            degradation: s.degradation.clone(),
        }
    }
}

impl Drop for SensorDataController {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn drive(shared: Arc<Shared>, mut source: ReadingSource, epoch: u64) {
    while let Some(event) = source.next().await {
        if !shared.is_current(epoch) {
            break;
        }
        match event {
            SourceEvent::Tick => {
                shared.apply_tick(epoch);
            }
            SourceEvent::Reading(reading) => {
                shared.apply_reading(epoch, reading);
            }
        }
    }
    debug!("Session driver for {} finished", shared.describe_mine());
}

impl Shared {
    fn describe_mine(&self) -> &str {
        self.key.mine_id.as_deref().unwrap_or("all mines")
    }

    fn is_current(&self, epoch: u64) -> bool {
        let s = self.state.lock();
        s.running && s.epoch == epoch
    }

    /// Sessions on generated data: simulated mode, or live mode after fallback
    fn is_generating(&self, s: &SessionState) -> bool {
        self.key.mode == SessionMode::Simulated || s.degradation.is_some()
    }

    fn enter_error(&self, epoch: u64) {
        {
            let mut s = self.state.lock();
            if !s.running || s.epoch != epoch {
                return;
            }
            s.state = LoadingState::Error;
        }
        self.events
            .publish(ControllerEvent::StateChanged(LoadingState::Error));
    }

    fn load_simulated(&self, epoch: u64, degradation: Option<Degradation>) {
        let mine_id = self.key.generated_mine_id().to_string();
        let mut published = Vec::new();

        {
            let mut s = self.state.lock();
            if !s.running || s.epoch != epoch {
                return;
            }

            let now = Utc::now();
            let history = s
                .generator
                .backfill_session(&mine_id, self.config.backfill_hours, now);
            s.window.seed(history);
            s.risk = s.window.latest().map(|r| self.config.risk_model.assess(r));
            s.last_update = Some(now);
            s.degradation = degradation.clone();
            s.state = LoadingState::Ready;

            if let Some(d) = degradation {
                published.push(ControllerEvent::Degraded(d));
            }
            published.push(ControllerEvent::StateChanged(LoadingState::Ready));
            debug!("Backfilled {} readings for {}", s.window.len(), mine_id);
        }

        for event in published {
            self.events.publish(event);
        }
    }

    fn load_live(&self, epoch: u64, mut rows: Vec<SensorReading>) {
        // Store returns newest first
        rows.reverse();

        {
            let mut s = self.state.lock();
            if !s.running || s.epoch != epoch {
                return;
            }
            s.window.seed(rows);
            s.risk = s.window.latest().map(|r| self.config.risk_model.assess(r));
            s.last_update = Some(Utc::now());
            s.degradation = None;
            s.state = LoadingState::Ready;
            info!("Loaded {} live readings for {}", s.window.len(), self.describe_mine());
        }

        self.events
            .publish(ControllerEvent::StateChanged(LoadingState::Ready));
    }

    fn apply_tick(&self, epoch: u64) -> Option<RiskAssessment> {
        let mine_id = self.key.generated_mine_id().to_string();

        let reading = {
            let mut s = self.state.lock();
            if !s.running || s.epoch != epoch || !self.is_generating(&s) {
                return None;
            }
            let previous = s.window.latest().cloned();
            s.generator.generate(previous.as_ref(), &mine_id)
        };

        let risk = self.apply_reading(epoch, reading.clone())?;

        // Only genuinely simulated sessions write back; a degraded live session
        // must not fill the live table with synthetic rows
        if self.key.mode == SessionMode::Simulated {
            self.persist_detached(reading);
        }
        Some(risk)
    }

    fn apply_reading(&self, epoch: u64, reading: SensorReading) -> Option<RiskAssessment> {
        let risk = {
            let mut s = self.state.lock();
            if !s.running || s.epoch != epoch {
                return None;
            }
            // Rows inserted between subscribe and fetch arrive twice
            if s.window.iter().any(|r| r == &reading) {
                return s.risk;
            }

            s.state = LoadingState::Updating;
            s.window.push(reading.clone());
            let risk = self.config.risk_model.assess(&reading);
            s.risk = Some(risk);
            s.last_update = Some(Utc::now());
            s.state = LoadingState::Ready;
            risk
        };

        self.events.publish(ControllerEvent::Updated {
            reading: reading.clone(),
            risk,
        });

        if risk.probability > self.config.critical_threshold {
            warn!(
                "Critical rockfall risk at {}: {:.2} ({})",
                reading.mine_id, risk.probability, risk.level
            );
            self.events.publish(ControllerEvent::Critical {
                mine_id: reading.mine_id.clone(),
                reading,
                risk,
            });
        }

        Some(risk)
    }

    /// Fire-and-forget insert; failures are only logged
    fn persist_detached(&self, reading: SensorReading) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let store = Arc::clone(&self.store);

        handle.spawn(async move {
            if let Err(e) = store.insert(&reading).await {
                debug!("Dropped synthetic reading for {}: {}", reading.mine_id, e);
            }
        });
    }
}
