// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Last known status per printer.
//
// Reads never block on printer I/O: they return whatever the last probe (or
// send) recorded, plus how old it is. Entries are never expired here; an
// unreachable printer just accumulates age until the next probe.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;

use labelwerk_core::types::{LinkState, PrinterStatus};

#[derive(Debug, Clone)]
struct Entry {
    state: LinkState,
    status: PrinterStatus,
    observed: Option<Instant>,
    last_error: Option<String>,
}

impl Default for Entry {
    fn default() -> Self {
        Self {
            state: LinkState::Unknown,
            status: PrinterStatus::default(),
            observed: None,
            last_error: None,
        }
    }
}

/// A consistent snapshot of one printer's cached status.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReading {
    pub state: LinkState,
    pub status: PrinterStatus,
    /// `None` until the first observation.
    pub age: Option<Duration>,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
pub struct StatusCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a printer in the `Unknown` state.
    pub fn register(&self, printer: &str) {
        self.write(|entries| {
            entries.entry(printer.to_string()).or_default();
        });
    }

    /// Store a parsed probe result. Returns the previous link state.
    ///
    /// Model and firmware carry over when the new status lacks them.
    pub fn record_status(&self, printer: &str, mut status: PrinterStatus) -> LinkState {
        self.write(|entries| {
            let entry = entries.entry(printer.to_string()).or_default();
            let previous = entry.state;

            if status.model.is_none() {
                status.model = entry.status.model.take();
            }
            if status.firmware.is_none() {
                status.firmware = entry.status.firmware.take();
            }
            if status.observed_at.is_none() {
                status.observed_at = Some(Utc::now());
            }

            entry.state = if status.online {
                LinkState::Online
            } else {
                LinkState::Offline
            };
            entry.status = status;
            entry.observed = Some(Instant::now());
            entry.last_error = None;
            previous
        })
    }

    /// Store a failed probe. Sensor readings are dropped; identity is kept.
    pub fn record_failure(&self, printer: &str, error: &str) -> LinkState {
        self.write(|entries| {
            let entry = entries.entry(printer.to_string()).or_default();
            let previous = entry.state;

            entry.state = LinkState::Offline;
            entry.status.online = false;
            entry.status.sensors.clear();
            entry.status.observed_at = Some(Utc::now());
            entry.observed = Some(Instant::now());
            entry.last_error = Some(error.to_string());
            previous
        })
    }

    /// A send failed: flip to offline without waiting for the next probe.
    pub fn mark_offline(&self, printer: &str, error: &str) {
        self.write(|entries| {
            let entry = entries.entry(printer.to_string()).or_default();
            entry.state = LinkState::Offline;
            entry.status.online = false;
            entry.last_error = Some(error.to_string());
        });
    }

    /// A send succeeded: the printer is evidently reachable.
    pub fn mark_online(&self, printer: &str) {
        self.write(|entries| {
            let entry = entries.entry(printer.to_string()).or_default();
            entry.state = LinkState::Online;
            entry.status.online = true;
            entry.status.observed_at = Some(Utc::now());
            entry.observed = Some(Instant::now());
            entry.last_error = None;
        });
    }

    pub fn get(&self, printer: &str) -> Option<StatusReading> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(printer).map(|entry| StatusReading {
            state: entry.state,
            status: entry.status.clone(),
            age: entry.observed.map(|at| at.elapsed()),
            last_error: entry.last_error.clone(),
        })
    }

    pub fn state(&self, printer: &str) -> LinkState {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(printer)
            .map(|entry| entry.state)
            .unwrap_or(LinkState::Unknown)
    }

    pub fn is_online(&self, printer: &str) -> bool {
        self.state(printer) == LinkState::Online
    }

    fn write<T>(&self, f: impl FnOnce(&mut HashMap<String, Entry>) -> T) -> T {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labelwerk_core::types::sensor;

    fn online_with_model() -> PrinterStatus {
        let mut status = PrinterStatus::online_now();
        status.model = Some("ZD421".into());
        status.firmware = Some("V84".into());
        status.set_flag(sensor::PAPER_OUT, false);
        status
    }

    #[test]
    fn unknown_until_first_probe() {
        let cache = StatusCache::new();
        cache.register("dock");
        let reading = cache.get("dock").unwrap();
        assert_eq!(reading.state, LinkState::Unknown);
        assert_eq!(reading.age, None);
        assert!(!cache.is_online("dock"));
        assert!(cache.get("nowhere").is_none());
    }

    #[test]
    fn failure_keeps_identity_and_clears_sensors() {
        let cache = StatusCache::new();
        assert_eq!(cache.record_status("dock", online_with_model()), LinkState::Unknown);
        assert!(cache.is_online("dock"));

        assert_eq!(cache.record_failure("dock", "timed out"), LinkState::Online);
        let reading = cache.get("dock").unwrap();
        assert_eq!(reading.state, LinkState::Offline);
        assert!(!reading.status.online);
        assert_eq!(reading.status.model.as_deref(), Some("ZD421"));
        assert!(reading.status.sensors.is_empty());
        assert_eq!(reading.last_error.as_deref(), Some("timed out"));
    }

    #[test]
    fn new_status_inherits_missing_identity() {
        let cache = StatusCache::new();
        cache.record_status("dock", online_with_model());
        cache.record_status("dock", PrinterStatus::online_now());
        let reading = cache.get("dock").unwrap();
        assert_eq!(reading.status.model.as_deref(), Some("ZD421"));
        assert_eq!(reading.status.firmware.as_deref(), Some("V84"));
    }

    #[test]
    fn reachable_but_not_ready_is_offline() {
        let cache = StatusCache::new();
        cache.record_status("hub", PrinterStatus::default());
        assert_eq!(cache.state("hub"), LinkState::Offline);
        assert!(cache.get("hub").unwrap().last_error.is_none());
    }

    #[test]
    fn send_outcomes_flip_state() {
        let cache = StatusCache::new();
        cache.record_status("dock", online_with_model());
        cache.mark_offline("dock", "channel closed");
        assert!(!cache.is_online("dock"));
        assert_eq!(
            cache.get("dock").unwrap().status.flag(sensor::PAPER_OUT),
            Some(false)
        );

        cache.mark_online("dock");
        assert!(cache.is_online("dock"));
    }

    #[tokio::test(start_paused = true)]
    async fn age_grows_without_probes() {
        let cache = StatusCache::new();
        cache.record_status("dock", online_with_model());
        tokio::time::advance(Duration::from_secs(90)).await;
        let age = cache.get("dock").unwrap().age.unwrap();
        assert!(age >= Duration::from_secs(90));
    }
}
