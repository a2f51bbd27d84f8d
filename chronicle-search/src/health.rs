// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Background probe of the primary index's health, with automatic
//! reconfiguration on recovery.

use crate::primary::PrimaryIndexClient;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{info, warn};

const PROBE_INTERVAL: Duration = Duration::from_secs(10);

pub struct IndexHealthMonitor {
    healthy: AtomicBool,
    shutdown: Notify,
}

impl IndexHealthMonitor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            healthy: AtomicBool::new(false),
            shutdown: Notify::new(),
        })
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    /// Spawns the probe loop. Returns the task handle so callers can await
    /// it on shutdown if desired.
    pub fn spawn(self: &Arc<Self>, client: Arc<PrimaryIndexClient>) -> tokio::task::JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PROBE_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        monitor.probe_once(&client).await;
                    }
                    _ = monitor.shutdown.notified() => {
                        break;
                    }
                }
            }
        })
    }

    async fn probe_once(self: &Arc<Self>, client: &PrimaryIndexClient) {
        let now_healthy = client.health().await;
        let was_healthy = self.healthy.swap(now_healthy, Ordering::SeqCst);

        if now_healthy && !was_healthy {
            info!("primary index recovered, reconfiguring indexes");
            if let Err(err) = client.configure_indexes().await {
                warn!(error = %err, "failed to reconfigure primary index after recovery");
            }
        } else if !now_healthy && was_healthy {
            warn!("primary index became unhealthy, falling back to relational search");
        }
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unhealthy() {
        let monitor = IndexHealthMonitor::new();
        assert!(!monitor.is_healthy());
    }
}
