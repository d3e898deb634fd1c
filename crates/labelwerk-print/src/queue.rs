// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-printer FIFO of queued job ids.
//
// Enqueue never waits for a printer. Only the printer's own queue worker
// takes jobs off the front; the periodic sweep removes jobs whose deadline
// has passed. Job state itself lives in the `JobRegistry`.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::time::Instant;
use tracing::{info, instrument, warn};

use labelwerk_core::error::LabelwerkError;
use labelwerk_core::types::{JobId, JobStatus};

use crate::registry::JobRegistry;

/// What one sweep did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Pending jobs that never reached their printer.
    pub expired: Vec<JobId>,
    /// Re-queued jobs whose printer did not come back in time.
    pub failed: Vec<JobId>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.failed.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct PrintQueue {
    queues: Mutex<HashMap<String, VecDeque<JobId>>>,
}

impl PrintQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<JobId>>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, printer: &str) {
        self.lock().entry(printer.to_string()).or_default();
    }

    /// Append to the tail of the printer's queue.
    #[instrument(skip(self), fields(job_id = %id))]
    pub fn enqueue(&self, printer: &str, id: JobId) {
        self.lock().entry(printer.to_string()).or_default().push_back(id);
    }

    /// Put a job back at the head, ahead of later submissions.
    pub fn push_front(&self, printer: &str, id: JobId) {
        self.lock()
            .entry(printer.to_string())
            .or_default()
            .push_front(id);
    }

    pub fn peek(&self, printer: &str) -> Option<JobId> {
        self.lock().get(printer).and_then(|q| q.front().copied())
    }

    pub fn dequeue(&self, printer: &str) -> Option<JobId> {
        self.lock().get_mut(printer).and_then(VecDeque::pop_front)
    }

    /// Remove a specific job. Returns whether it was queued.
    pub fn remove(&self, printer: &str, id: &JobId) -> bool {
        let mut queues = self.lock();
        let Some(queue) = queues.get_mut(printer) else {
            return false;
        };
        match queue.iter().position(|queued| queued == id) {
            Some(at) => queue.remove(at).is_some(),
            None => false,
        }
    }

    pub fn depth(&self, printer: &str) -> usize {
        self.lock().get(printer).map_or(0, VecDeque::len)
    }

    /// Queued ids in send order.
    pub fn snapshot(&self, printer: &str) -> Vec<JobId> {
        self.lock()
            .get(printer)
            .map(|q| q.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Expire pending jobs and fail re-queued ones whose deadline has
    /// passed (`now >= deadline`), removing them from their queues.
    ///
    /// The registry arbitrates: a job the worker already moved on is left
    /// alone. Lock order is queue, then registry.
    pub fn sweep(&self, registry: &JobRegistry, now: Instant) -> SweepReport {
        let mut report = SweepReport::default();
        let mut queues = self.lock();

        for (printer, queue) in queues.iter_mut() {
            queue.retain(|id| {
                if !registry.is_past_deadline(id, now) {
                    return registry.status(id).is_some_and(|s| !s.is_terminal());
                }
                match registry.status(id) {
                    Some(JobStatus::Pending) => {
                        let reason = LabelwerkError::JobExpired(*id).to_string();
                        if registry
                            .transition(id, JobStatus::Expired, Some(reason))
                            .is_ok()
                        {
                            info!(printer = %printer, job_id = %id, "job expired in queue");
                            report.expired.push(*id);
                        }
                    }
                    Some(JobStatus::Printing) => {
                        // Keeps the last send error recorded by the worker.
                        if registry.transition(id, JobStatus::Failed, None).is_ok() {
                            warn!(printer = %printer, job_id = %id, "re-queued job ran out of time");
                            report.failed.push(*id);
                        }
                    }
                    _ => {}
                }
                false
            });
        }
        report
    }
}
