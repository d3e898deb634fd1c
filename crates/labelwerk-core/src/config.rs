// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fleet configuration.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LabelwerkError, Result};
use crate::types::PrinterConfig;

/// Timeouts applied to every transport operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoTimeouts {
    /// Upper bound for establishing a channel.
    pub connect_timeout_ms: u64,
    /// Upper bound for the first byte of a probe response.
    pub read_timeout_ms: u64,
    /// Upper bound for writing a whole payload.
    pub write_timeout_ms: u64,
    /// Pause between writing a probe and reading, for dialects that stream
    /// their reply in bursts.
    pub settle_delay_ms: u64,
    /// Silence that ends a multi-chunk read.
    pub quiet_window_ms: u64,
}

impl Default for IoTimeouts {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            read_timeout_ms: 3_000,
            write_timeout_ms: 10_000,
            settle_delay_ms: 500,
            quiet_window_ms: 100,
        }
    }
}

impl IoTimeouts {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn quiet(&self) -> Duration {
        Duration::from_millis(self.quiet_window_ms)
    }
}

/// Settings for the whole printer fleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// How long a job may wait in the queue before it expires.
    pub queue_timeout_secs: u64,
    /// Send attempts per job before it is marked failed.
    pub max_send_attempts: u32,
    /// A cached status older than this many probe intervals is reported stale.
    pub stale_after_intervals: u32,
    /// Queue worker polling period.
    pub worker_tick_millis: u64,
    /// Period of the expiry sweep.
    pub sweep_interval_secs: u64,
    /// How long finished jobs stay queryable.
    pub job_retention_secs: u64,
    pub io: IoTimeouts,
    pub printers: Vec<PrinterConfig>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            queue_timeout_secs: 300,
            max_send_attempts: 3,
            stale_after_intervals: 3,
            worker_tick_millis: 1_000,
            sweep_interval_secs: 5,
            job_retention_secs: 3_600,
            io: IoTimeouts::default(),
            printers: Vec::new(),
        }
    }
}

impl FleetConfig {
    pub fn queue_timeout(&self) -> Duration {
        Duration::from_secs(self.queue_timeout_secs)
    }

    pub fn worker_tick(&self) -> Duration {
        Duration::from_millis(self.worker_tick_millis)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn job_retention(&self) -> Duration {
        Duration::from_secs(self.job_retention_secs)
    }

    /// Reject configurations the fleet cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_send_attempts == 0 {
            return Err(LabelwerkError::Config(
                "max_send_attempts must be at least 1".into(),
            ));
        }
        if self.worker_tick_millis == 0 || self.sweep_interval_secs == 0 {
            return Err(LabelwerkError::Config(
                "worker tick and sweep interval must be non-zero".into(),
            ));
        }

        let mut seen = HashSet::new();
        for printer in &self.printers {
            if printer.name.trim().is_empty() {
                return Err(LabelwerkError::Config("printer name is empty".into()));
            }
            if !seen.insert(printer.name.as_str()) {
                return Err(LabelwerkError::Config(format!(
                    "duplicate printer name '{}'",
                    printer.name
                )));
            }
            if printer.healthcheck.interval_secs == 0 {
                return Err(LabelwerkError::Config(format!(
                    "printer '{}' has a zero healthcheck interval",
                    printer.name
                )));
            }
        }
        Ok(())
    }
}
