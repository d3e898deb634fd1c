// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Periodic health probing, one monitor per printer.
//
// Each cycle takes the printer's turn, probes, and writes the outcome into
// the status cache. A failed or garbled probe marks the printer offline and
// the loop carries on at the next interval; nothing here is fatal. The
// first failure after a success is a warning, repeats are debug noise, and
// a recovery is announced.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use labelwerk_core::types::LinkState;

use crate::printer::Printer;
use crate::status::StatusCache;

pub struct HealthMonitor {
    name: String,
    device: Arc<Mutex<Printer>>,
    cache: Arc<StatusCache>,
    interval: Duration,
    consecutive_failures: u32,
}

impl HealthMonitor {
    pub fn new(
        name: impl Into<String>,
        device: Arc<Mutex<Printer>>,
        cache: Arc<StatusCache>,
        interval: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            device,
            cache,
            interval,
            consecutive_failures: 0,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Probe once and record the result. Returns the new link state.
    pub async fn probe_once(&mut self) -> LinkState {
        let outcome = {
            let mut printer = self.device.lock().await;
            printer.check_status().await
        };

        match outcome {
            Ok(status) => {
                let online = status.online;
                let previous = self.cache.record_status(&self.name, status);
                let failures = std::mem::take(&mut self.consecutive_failures);

                if online && previous != LinkState::Online {
                    info!(printer = %self.name, after_failures = failures, "printer online");
                } else if !online && previous != LinkState::Offline {
                    warn!(printer = %self.name, "printer reachable but not ready");
                }
                if online {
                    LinkState::Online
                } else {
                    LinkState::Offline
                }
            }
            Err(e) => {
                let message = e.to_string();
                self.cache.record_failure(&self.name, &message);
                self.consecutive_failures += 1;

                if self.consecutive_failures == 1 {
                    warn!(printer = %self.name, error = %message, "health probe failed");
                } else {
                    debug!(
                        printer = %self.name,
                        error = %message,
                        failures = self.consecutive_failures,
                        "health probe still failing"
                    );
                }
                LinkState::Offline
            }
        }
    }

    /// Probe immediately, then every interval, until `shutdown` fires.
    ///
    /// Cancellation is only observed between probes; a probe in flight
    /// always completes.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(printer = %self.name, interval_secs = self.interval.as_secs(), "health monitor started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.probe_once().await;
        }
        debug!(printer = %self.name, "health monitor stopped");
    }
}
