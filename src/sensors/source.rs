// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/rockwatch

//! "Next reading" event sources
//!
//! A simulated session is driven by a timer, a live session by the store's
//! insert stream. Both are fed through the same channel so the controller
//! handles them in one loop.

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::debug;

use super::SensorReading;

const SOURCE_BUFFER: usize = 64;

/// What the controller should do next
#[derive(Debug, Clone)]
pub enum SourceEvent {
    /// Generate the next synthetic reading
    Tick,
    /// A reading arrived from the store
    Reading(SensorReading),
}

/// Owns the producer task; dropping the source stops it
pub struct ReadingSource {
    rx: mpsc::Receiver<SourceEvent>,
    task: JoinHandle<()>,
}

impl ReadingSource {
    /// Emit a `Tick` every `period`, the first one a full period from now
    pub fn interval(period: Duration) -> Self {
        let (tx, rx) = mpsc::channel(SOURCE_BUFFER);

        let task = tokio::spawn(async move {
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                timer.tick().await;
                if tx.send(SourceEvent::Tick).await.is_err() {
                    break;
                }
            }
            debug!("interval source stopped");
        });

        Self { rx, task }
    }

    /// Forward inserted readings, keeping only those for `mine_id` when set.
    /// Arrival order is preserved.
    pub fn subscription(
        mut inserts: BoxStream<'static, SensorReading>,
        mine_id: Option<String>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(SOURCE_BUFFER);

        let task = tokio::spawn(async move {
            while let Some(reading) = inserts.next().await {
                if let Some(id) = &mine_id {
                    if &reading.mine_id != id {
                        continue;
                    }
                }
                if tx.send(SourceEvent::Reading(reading)).await.is_err() {
                    break;
                }
            }
            debug!("subscription source stopped");
        });

        Self { rx, task }
    }

    /// Wait for the next event. `None` once the producer has finished.
    pub async fn next(&mut self) -> Option<SourceEvent> {
        self.rx.recv().await
    }
}

impl Drop for ReadingSource {
    fn drop(&mut self) {
        self.task.abort();
    }
}
