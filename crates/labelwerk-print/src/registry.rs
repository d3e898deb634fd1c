// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job registry: job id -> current job state.
//
// Status lookups go through here independently of queue position. Every
// status change goes through `transition`, which only allows forward moves
// of the job lifecycle; when the queue worker and the expiry sweep race for
// the same job, the first transition wins and the other is rejected.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, instrument};

use labelwerk_core::error::{LabelwerkError, Result};
use labelwerk_core::types::{JobId, JobStatus, PrintJob};

#[derive(Debug, Clone)]
struct JobRecord {
    job: PrintJob,
    /// Monotonic twin of `job.expires_at`.
    deadline: Instant,
    /// When the job reached a terminal state.
    finished: Option<Instant>,
}

#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, JobRecord>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: PrintJob, deadline: Instant) {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        jobs.insert(
            job.id,
            JobRecord {
                job,
                deadline,
                finished: None,
            },
        );
    }

    pub fn get(&self, id: &JobId) -> Option<PrintJob> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        jobs.get(id).map(|record| record.job.clone())
    }

    pub fn status(&self, id: &JobId) -> Option<JobStatus> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        jobs.get(id).map(|record| record.job.status)
    }

    /// Inclusive: a job is past its deadline at exactly `deadline`.
    pub fn is_past_deadline(&self, id: &JobId, now: Instant) -> bool {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        jobs.get(id).is_some_and(|record| now >= record.deadline)
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move a job forward in its lifecycle.
    #[instrument(skip(self, message), fields(job_id = %id))]
    pub fn transition(
        &self,
        id: &JobId,
        to: JobStatus,
        message: Option<String>,
    ) -> Result<PrintJob> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let record = jobs
            .get_mut(id)
            .ok_or_else(|| LabelwerkError::JobNotFound(id.to_string()))?;

        let from = record.job.status;
        if !from.can_transition_to(to) {
            return Err(LabelwerkError::InvalidTransition { job: *id, from, to });
        }

        record.job.status = to;
        record.job.updated_at = Utc::now();
        if message.is_some() {
            record.job.error_message = message;
        }
        if to.is_terminal() {
            record.finished = Some(Instant::now());
        }
        debug!(%from, %to, "job status changed");
        Ok(record.job.clone())
    }

    /// Count a failed send attempt, where the copy loop stopped, and why.
    /// Returns the attempts made so far.
    pub fn record_attempt(&self, id: &JobId, copies_sent: u32, error: &str) -> Option<u32> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let record = jobs.get_mut(id)?;
        record.job.attempts += 1;
        record.job.copies_sent = copies_sent;
        record.job.error_message = Some(error.to_string());
        record.job.updated_at = Utc::now();
        Some(record.job.attempts)
    }

    /// Record copies written by a successful send.
    pub fn record_copies(&self, id: &JobId, copies_sent: u32) {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(record) = jobs.get_mut(id) {
            record.job.copies_sent = copies_sent;
            record.job.updated_at = Utc::now();
        }
    }

    /// Drop jobs that have been terminal for at least `retention`.
    pub fn reclaim(&self, now: Instant, retention: Duration) -> usize {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let before = jobs.len();
        jobs.retain(|_, record| match record.finished {
            Some(at) => now.saturating_duration_since(at) < retention,
            None => true,
        });
        before - jobs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labelwerk_core::types::Dialect;

    fn job() -> PrintJob {
        PrintJob::new(
            "shipping".into(),
            "dock".into(),
            Dialect::Zpl,
            b"^XA^XZ".to_vec(),
            1,
            Duration::from_secs(300),
        )
    }

    #[test]
    fn transitions_are_forward_only() {
        let registry = JobRegistry::new();
        let job = job();
        let id = job.id;
        registry.insert(job, Instant::now() + Duration::from_secs(300));

        registry.transition(&id, JobStatus::Printing, None).unwrap();
        let err = registry
            .transition(&id, JobStatus::Expired, None)
            .unwrap_err();
        assert!(matches!(err, LabelwerkError::InvalidTransition { .. }));

        let done = registry.transition(&id, JobStatus::Completed, None).unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert!(registry.transition(&id, JobStatus::Failed, None).is_err());
    }

    #[test]
    fn unknown_job_is_not_found() {
        let registry = JobRegistry::new();
        let err = registry
            .transition(&JobId::new(), JobStatus::Printing, None)
            .unwrap_err();
        assert!(matches!(err, LabelwerkError::JobNotFound(_)));
    }

    #[test]
    fn attempts_accumulate() {
        let registry = JobRegistry::new();
        let job = job();
        let id = job.id;
        registry.insert(job, Instant::now());

        assert_eq!(registry.record_attempt(&id, 2, "timed out"), Some(1));
        assert_eq!(registry.record_attempt(&id, 3, "channel closed"), Some(2));
        let stored = registry.get(&id).unwrap();
        assert_eq!(stored.copies_sent, 3);
        assert_eq!(stored.attempts, 2);
        assert_eq!(stored.error_message.as_deref(), Some("channel closed"));
        assert_eq!(registry.record_attempt(&JobId::new(), 0, "x"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_is_inclusive() {
        let registry = JobRegistry::new();
        let job = job();
        let id = job.id;
        let deadline = Instant::now() + Duration::from_secs(300);
        registry.insert(job, deadline);

        assert!(!registry.is_past_deadline(&id, deadline - Duration::from_millis(1)));
        assert!(registry.is_past_deadline(&id, deadline));
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_jobs_are_reclaimed_after_retention() {
        let registry = JobRegistry::new();
        let finished = job();
        let pending = job();
        let finished_id = finished.id;
        let pending_id = pending.id;
        let deadline = Instant::now() + Duration::from_secs(300);
        registry.insert(finished, deadline);
        registry.insert(pending, deadline);

        registry
            .transition(&finished_id, JobStatus::Expired, None)
            .unwrap();

        let retention = Duration::from_secs(60);
        assert_eq!(registry.reclaim(Instant::now(), retention), 0);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(registry.reclaim(Instant::now(), retention), 1);
        assert!(registry.get(&finished_id).is_none());
        assert!(registry.get(&pending_id).is_some());
    }
}
