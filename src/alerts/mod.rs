// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/rockwatch

//! Alert dispatch
//!
//! The core decides when to alert; dispatchers decide how. Every dispatch is
//! spawned and only observed for logging, so a slow or failing channel never
//! holds up a session or a batch.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::AlertConfig;
use crate::core::{ControllerEvent, Event};
use crate::db::SensorStore;
use crate::error::DispatchError;
use crate::sensors::Mine;

/// Delivers an alert to stakeholders
#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    async fn notify(
        &self,
        mine_id: &str,
        mine_name: &str,
        location: &str,
        probability: f64,
    ) -> Result<(), DispatchError>;
}

/// Body posted to an alert webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertPayload {
    pub mine_id: String,
    pub mine_name: String,
    pub location: String,
    pub probability: f64,
    pub sent_at: DateTime<Utc>,
}

/// Writes alerts to the log only
#[derive(Debug, Default)]
pub struct LogDispatcher;

#[async_trait]
impl AlertDispatcher for LogDispatcher {
    async fn notify(
        &self,
        mine_id: &str,
        mine_name: &str,
        location: &str,
        probability: f64,
    ) -> Result<(), DispatchError> {
        warn!(
            "ALERT {} ({}, {}): rockfall risk {:.0}%",
            mine_name,
            mine_id,
            location,
            probability * 100.0
        );
        Ok(())
    }
}

/// Posts alerts as JSON to a webhook, e.g. an SMS/e-mail relay
pub struct WebhookDispatcher {
    client: reqwest::Client,
    url: String,
}

impl WebhookDispatcher {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl AlertDispatcher for WebhookDispatcher {
    async fn notify(
        &self,
        mine_id: &str,
        mine_name: &str,
        location: &str,
        probability: f64,
    ) -> Result<(), DispatchError> {
        let payload = AlertPayload {
            mine_id: mine_id.to_string(),
            mine_name: mine_name.to_string(),
            location: location.to_string(),
            probability,
            sent_at: Utc::now(),
        };

        let response = self.client.post(&self.url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Alert for {} accepted by webhook", mine_id);
        Ok(())
    }
}

/// Dispatcher for the configuration, `None` when alerting is disabled
pub fn build_dispatcher(
    config: &AlertConfig,
) -> Result<Option<Arc<dyn AlertDispatcher>>, DispatchError> {
    if !config.enabled {
        return Ok(None);
    }

    let dispatcher: Arc<dyn AlertDispatcher> = match &config.webhook_url {
        Some(url) => Arc::new(WebhookDispatcher::new(
            url,
            Duration::from_secs(config.timeout_secs),
        )?),
        None => Arc::new(LogDispatcher),
    };
    Ok(Some(dispatcher))
}

/// Spawn one notification; a failure is logged and not retried
pub fn dispatch_detached(
    dispatcher: Arc<dyn AlertDispatcher>,
    mine: Mine,
    probability: f64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match dispatcher
            .notify(&mine.id, &mine.name, &mine.location, probability)
            .await
        {
            Ok(()) => info!("Alert sent for {} ({:.2})", mine.name, probability),
            Err(e) => warn!("Alert for {} failed: {}", mine.name, e),
        }
    })
}

/// Session consumer that turns critical events into notifications, at most
/// one per mine per cooldown window
pub struct AlertRelay {
    dispatcher: Arc<dyn AlertDispatcher>,
    store: Arc<dyn SensorStore>,
    cooldown: Duration,
    last_sent: Mutex<HashMap<String, Instant>>,
}

impl AlertRelay {
    pub fn new(
        dispatcher: Arc<dyn AlertDispatcher>,
        store: Arc<dyn SensorStore>,
        cooldown: Duration,
    ) -> Self {
        Self {
            dispatcher,
            store,
            cooldown,
            last_sent: Mutex::new(HashMap::new()),
        }
    }

    /// React to one event. Returns the spawned dispatch, if any.
    pub async fn handle(&self, event: &ControllerEvent) -> Option<JoinHandle<()>> {
        let ControllerEvent::Critical { mine_id, risk, .. } = event else {
            return None;
        };

        {
            let mut last_sent = self.last_sent.lock();
            let now = Instant::now();
            if let Some(sent) = last_sent.get(mine_id) {
                if now.duration_since(*sent) < self.cooldown {
                    debug!("Alert for {} suppressed by cooldown", mine_id);
                    return None;
                }
            }
            last_sent.insert(mine_id.clone(), now);
        }

        let mine = match self.store.get_mine(mine_id).await {
            Ok(Some(mine)) => mine,
            Ok(None) => Mine::new(mine_id, mine_id, "unknown", 0.0, 0.0),
            Err(e) => {
                debug!("Mine lookup for alert failed: {}", e);
                Mine::new(mine_id, mine_id, "unknown", 0.0, 0.0)
            }
        };

        Some(dispatch_detached(
            Arc::clone(&self.dispatcher),
            mine,
            risk.probability,
        ))
    }

    /// Follow a session's events until shutdown or until the session is dropped
    pub async fn run(
        &self,
        mut events: broadcast::Receiver<Event>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => {
                        self.handle(&event.payload).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Alert relay lagged, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = shutdown.recv() => break,
            }
        }
        debug!("Alert relay stopped");
    }
}
