// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/rockwatch

//! Task scheduler for timed batch jobs

use anyhow::Result;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

type TaskFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static>;

struct ScheduledTask {
    interval: Duration,
    task: TaskFn,
    enabled: bool,
}

/// Runs registered async jobs at fixed intervals. A job never overlaps itself:
/// a run that outlasts its interval delays the next one.
pub struct Scheduler {
    tasks: Arc<RwLock<HashMap<String, ScheduledTask>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn add_task<F, Fut>(&self, name: &str, interval: Duration, task: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task: TaskFn = Arc::new(move || Box::pin(task()) as BoxFuture<'static, ()>);

        let mut tasks = self.tasks.write().await;
        tasks.insert(
            name.to_string(),
            ScheduledTask {
                interval,
                task,
                enabled: true,
            },
        );
        debug!("Scheduled task '{}' with interval {:?}", name, interval);
    }

    pub async fn enable_task(&self, name: &str, enabled: bool) {
        let mut tasks = self.tasks.write().await;
        if let Some(task) = tasks.get_mut(name) {
            task.enabled = enabled;
        }
    }

    /// Run every task registered so far until `shutdown` fires. Each task runs
    /// once immediately, then on its interval.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        let mut handles = Vec::new();

        {
            let tasks = self.tasks.read().await;
            for (name, scheduled) in tasks.iter() {
                let name = name.clone();
                let period = scheduled.interval;
                let registry = Arc::clone(&self.tasks);

                handles.push(tokio::spawn(async move {
                    let mut timer = interval(period);
                    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

                    loop {
                        timer.tick().await;

                        let task = {
                            let tasks = registry.read().await;
                            match tasks.get(&name) {
                                Some(t) if t.enabled => Some(Arc::clone(&t.task)),
                                Some(_) => None,
                                None => break,
                            }
                        };

                        if let Some(task) = task {
                            debug!("Running scheduled task '{}'", name);
                            task().await;
                        }
                    }
                }));
            }
            info!("Scheduler running {} task(s)", handles.len());
        }

        let _ = shutdown.recv().await;
        info!("Scheduler shutting down...");

        for handle in handles {
            handle.abort();
        }
        Ok(())
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
