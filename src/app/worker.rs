//! Periodic background maintenance (e.g. rate limiter garbage collection).

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

use crate::domain::AppError;

/// A unit of housekeeping run on every tick of a [`MaintenanceWorker`].
#[async_trait]
pub trait MaintenanceTask: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns how many entries were processed or reclaimed.
    async fn run_once(&self) -> Result<usize, AppError>;
}

/// Configuration for the background worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Interval between runs
    pub poll_interval: Duration,
    /// Whether the worker is enabled
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            enabled: true,
        }
    }
}

pub struct MaintenanceWorker {
    task: Arc<dyn MaintenanceTask>,
    config: WorkerConfig,
    shutdown_rx: watch::Receiver<bool>,
}

impl MaintenanceWorker {
    pub fn new(
        task: Arc<dyn MaintenanceTask>,
        config: WorkerConfig,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            task,
            config,
            shutdown_rx,
        }
    }

    /// Run the worker loop until shutdown is signalled
    pub async fn run(mut self) {
        let name = self.task.name();
        if !self.config.enabled {
            info!(task = name, "Maintenance worker is disabled");
            return;
        }

        info!(
            task = name,
            poll_interval = ?self.config.poll_interval,
            "Starting maintenance worker"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {
                    self.tick().await;
                }
                result = self.shutdown_rx.changed() => {
                    // A dropped sender also means shutdown
                    if result.is_err() || *self.shutdown_rx.borrow() {
                        info!(task = name, "Maintenance worker shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn tick(&self) {
        match self.task.run_once().await {
            Ok(0) => {}
            Ok(count) => {
                info!(task = self.task.name(), count, "Maintenance run completed");
            }
            Err(e) => {
                error!(task = self.task.name(), error = ?e, "Maintenance run failed");
            }
        }
    }
}

/// Spawn the background worker as a tokio task
pub fn spawn_worker(
    task: Arc<dyn MaintenanceTask>,
    config: WorkerConfig,
) -> (tokio::task::JoinHandle<()>, watch::Sender<bool>) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = MaintenanceWorker::new(task, config, shutdown_rx);
    let handle = tokio::spawn(worker.run());
    (handle, shutdown_tx)
}
