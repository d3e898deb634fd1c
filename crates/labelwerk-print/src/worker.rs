// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Queue worker, one per printer.
//
// Every tick: if the cached status says the printer is online, send queued
// jobs in submission order until the queue is empty or a send fails. A
// failure flips the printer offline straight away and puts the job back at
// the head, up to the retry limit. An offline printer is simply skipped
// until the next tick; the worker never waits on it. Shutdown is checked
// before each job and each copy; unsent jobs stay queued.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use labelwerk_core::error::LabelwerkError;
use labelwerk_core::types::{JobId, JobStatus};

use crate::printer::Printer;
use crate::quantity::{self, SendOutcome, SendPlan};
use crate::queue::PrintQueue;
use crate::registry::JobRegistry;
use crate::retry::{RetryConfig, RetryDecision, should_retry};
use crate::status::StatusCache;

pub struct QueueWorker {
    name: String,
    device: Arc<Mutex<Printer>>,
    cache: Arc<StatusCache>,
    queue: Arc<PrintQueue>,
    registry: Arc<JobRegistry>,
    retry: RetryConfig,
    tick: Duration,
}

impl QueueWorker {
    pub fn new(
        name: impl Into<String>,
        device: Arc<Mutex<Printer>>,
        cache: Arc<StatusCache>,
        queue: Arc<PrintQueue>,
        registry: Arc<JobRegistry>,
        retry: RetryConfig,
        tick: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            device,
            cache,
            queue,
            registry,
            retry,
            tick,
        }
    }

    /// One pass over the queue. Returns how many jobs completed.
    pub async fn run_cycle(&self, shutdown: &CancellationToken) -> usize {
        let mut completed = 0;

        while !shutdown.is_cancelled() && self.cache.is_online(&self.name) {
            let Some(id) = self.queue.peek(&self.name) else {
                break;
            };
            let Some(job) = self.registry.get(&id) else {
                self.queue.remove(&self.name, &id);
                continue;
            };
            if job.status.is_terminal() {
                self.queue.remove(&self.name, &id);
                continue;
            }
            if self.registry.is_past_deadline(&id, Instant::now()) {
                // Overdue jobs belong to the sweep; nothing behind them is
                // sent ahead of them.
                debug!(printer = %self.name, job_id = %id, "head job is overdue, leaving it to the sweep");
                break;
            }
            if !self.claim(&id, job.status) {
                continue;
            }

            let plan = SendPlan::for_payload(&job.payload, job.dialect, job.quantity);
            let outcome = {
                let mut printer = self.device.lock().await;
                quantity::execute(&mut printer, &job.payload, plan, job.copies_sent, shutdown).await
            };

            match outcome {
                Ok(SendOutcome::Interrupted(copies)) => {
                    self.registry.record_copies(&id, copies);
                    self.queue.push_front(&self.name, id);
                    info!(printer = %self.name, job_id = %id, copies_sent = copies, "shutdown mid-job, job kept at the head");
                    break;
                }
                Ok(SendOutcome::Complete(copies)) => {
                    self.registry.record_copies(&id, copies);
                    if let Err(e) = self.registry.transition(&id, JobStatus::Completed, None) {
                        warn!(printer = %self.name, job_id = %id, error = %e, "could not complete job");
                    } else {
                        info!(printer = %self.name, job_id = %id, copies, "job printed");
                        completed += 1;
                    }
                    self.cache.mark_online(&self.name);
                }
                Err(failure) => {
                    let reason = failure.error.to_string();
                    self.cache.mark_offline(&self.name, &reason);
                    let attempts = self
                        .registry
                        .record_attempt(&id, failure.copies_sent, &reason)
                        .unwrap_or(u32::MAX);

                    match should_retry(&failure.error, attempts, &self.retry) {
                        RetryDecision::Requeue => {
                            warn!(
                                printer = %self.name,
                                job_id = %id,
                                attempts,
                                copies_sent = failure.copies_sent,
                                error = %reason,
                                "send failed, job requeued"
                            );
                            self.queue.push_front(&self.name, id);
                        }
                        RetryDecision::Exhausted => self.fail(&id, attempts, reason),
                    }
                    break;
                }
            }
        }
        completed
    }

    /// Take the job off the queue, then mark it printing. The sweep only
    /// acts on queued jobs, so a job it already expired or failed is gone
    /// from the queue and is not claimed.
    fn claim(&self, id: &JobId, seen: JobStatus) -> bool {
        if !self.queue.remove(&self.name, id) {
            debug!(printer = %self.name, job_id = %id, "job left the queue before it was claimed");
            return false;
        }
        if seen == JobStatus::Pending {
            if let Err(e) = self.registry.transition(id, JobStatus::Printing, None) {
                debug!(printer = %self.name, job_id = %id, error = %e, "job could not be claimed");
                return false;
            }
        }
        true
    }

    fn fail(&self, id: &JobId, attempts: u32, reason: String) {
        let err = LabelwerkError::QueueSendFailed {
            job: *id,
            attempts,
            reason: reason.clone(),
        };
        error!(printer = %self.name, error = %err, "job failed");
        if let Err(e) = self.registry.transition(id, JobStatus::Failed, Some(reason)) {
            warn!(printer = %self.name, job_id = %id, error = %e, "could not fail job");
        }
    }

    /// Run cycles every tick until `shutdown` fires. A cycle in progress
    /// stops after the write it is in; in-flight sends are never abandoned.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(printer = %self.name, "queue worker started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.run_cycle(&shutdown).await;
        }
        debug!(printer = %self.name, "queue worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labelwerk_core::config::IoTimeouts;
    use labelwerk_core::types::{
        ConnectionConfig, Dialect, HealthcheckConfig, PrintJob, PrinterConfig, PrinterStatus,
    };

    use crate::transport::StubHandle;

    struct Rig {
        worker: QueueWorker,
        cache: Arc<StatusCache>,
        queue: Arc<PrintQueue>,
        registry: Arc<JobRegistry>,
        handle: StubHandle,
    }

    fn rig(max_attempts: u32) -> Rig {
        let config = PrinterConfig {
            name: "dock".into(),
            dialect: Dialect::Zpl,
            connection: ConnectionConfig::Tcp {
                host: "10.0.0.5".into(),
                port: 9100,
            },
            enabled: true,
            healthcheck: HealthcheckConfig::default(),
        };
        let (printer, handle) = Printer::stub(config, IoTimeouts::default());
        let cache = Arc::new(StatusCache::new());
        let queue = Arc::new(PrintQueue::new());
        let registry = Arc::new(JobRegistry::new());
        let worker = QueueWorker::new(
            "dock",
            Arc::new(Mutex::new(printer)),
            Arc::clone(&cache),
            Arc::clone(&queue),
            Arc::clone(&registry),
            RetryConfig { max_attempts },
            Duration::from_secs(1),
        );
        Rig {
            worker,
            cache,
            queue,
            registry,
            handle,
        }
    }

    fn submit(rig: &Rig, body: &str, quantity: u32) -> JobId {
        let job = PrintJob::new(
            "shipping".into(),
            "dock".into(),
            Dialect::Zpl,
            body.as_bytes().to_vec(),
            quantity,
            Duration::from_secs(300),
        );
        let id = job.id;
        rig.registry
            .insert(job, Instant::now() + Duration::from_secs(300));
        rig.queue.enqueue("dock", id);
        id
    }

    #[tokio::test]
    async fn offline_printer_is_skipped() {
        let rig = rig(3);
        let id = submit(&rig, "^XA^FDa^FS^XZ", 1);

        assert_eq!(rig.worker.run_cycle(&CancellationToken::new()).await, 0);
        assert_eq!(rig.registry.status(&id), Some(JobStatus::Pending));
        assert_eq!(rig.handle.opens(), 0);
    }

    #[tokio::test]
    async fn online_printer_drains_in_order() {
        let rig = rig(3);
        rig.cache.record_status("dock", PrinterStatus::online_now());
        let first = submit(&rig, "^XA^FDfirst^FS^XZ", 1);
        let second = submit(&rig, "^XA^FDsecond^FS^XZ", 2);

        assert_eq!(rig.worker.run_cycle(&CancellationToken::new()).await, 2);
        assert_eq!(rig.registry.status(&first), Some(JobStatus::Completed));
        assert_eq!(rig.registry.status(&second), Some(JobStatus::Completed));
        assert_eq!(rig.queue.depth("dock"), 0);

        let writes = rig.handle.writes();
        assert_eq!(writes.len(), 3);
        assert_eq!(writes[0], b"^XA^FDfirst^FS^XZ");
        assert_eq!(writes[2], b"^XA^FDsecond^FS^XZ");
    }

    #[tokio::test]
    async fn failed_send_requeues_at_head_and_marks_offline() {
        let rig = rig(3);
        rig.cache.record_status("dock", PrinterStatus::online_now());
        rig.handle.reject_payloads(true);
        let first = submit(&rig, "^XA^FDfirst^FS^XZ", 1);
        let second = submit(&rig, "^XA^FDsecond^FS^XZ", 1);

        assert_eq!(rig.worker.run_cycle(&CancellationToken::new()).await, 0);
        assert!(!rig.cache.is_online("dock"));
        assert_eq!(rig.queue.snapshot("dock"), vec![first, second]);
        let job = rig.registry.get(&first).unwrap();
        assert_eq!(job.status, JobStatus::Printing);
        assert_eq!(job.attempts, 1);
        assert!(!rig.handle.is_open());
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let rig = rig(2);
        rig.handle.reject_payloads(true);
        let id = submit(&rig, "^XA^FDa^FS^XZ", 1);

        for _ in 0..2 {
            rig.cache.record_status("dock", PrinterStatus::online_now());
            rig.worker.run_cycle(&CancellationToken::new()).await;
        }

        let job = rig.registry.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempts, 2);
        assert_eq!(rig.queue.depth("dock"), 0);
    }

    #[tokio::test]
    async fn retry_resumes_the_copy_loop() {
        let rig = rig(3);
        rig.cache.record_status("dock", PrinterStatus::online_now());
        rig.handle.accept_payloads(2);
        let id = submit(&rig, "^XA^FDa^FS^XZ", 4);

        rig.worker.run_cycle(&CancellationToken::new()).await;
        assert_eq!(rig.registry.get(&id).unwrap().copies_sent, 2);

        rig.handle.reject_payloads(false);
        rig.cache.record_status("dock", PrinterStatus::online_now());
        rig.worker.run_cycle(&CancellationToken::new()).await;

        assert_eq!(rig.registry.status(&id), Some(JobStatus::Completed));
        assert_eq!(rig.handle.writes_containing(b"^FDa"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn overdue_head_job_is_left_for_the_sweep() {
        let rig = rig(3);
        rig.cache.record_status("dock", PrinterStatus::online_now());
        let id = submit(&rig, "^XA^FDa^FS^XZ", 1);
        tokio::time::advance(Duration::from_secs(300)).await;

        assert_eq!(rig.worker.run_cycle(&CancellationToken::new()).await, 0);
        assert_eq!(rig.registry.status(&id), Some(JobStatus::Pending));
        assert_eq!(rig.handle.opens(), 0);
    }

    #[tokio::test]
    async fn cancelled_cycle_leaves_jobs_queued() {
        let rig = rig(3);
        rig.cache.record_status("dock", PrinterStatus::online_now());
        let first = submit(&rig, "^XA^FDfirst^FS^XZ", 1);
        let second = submit(&rig, "^XA^FDsecond^FS^XZ", 1);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        assert_eq!(rig.worker.run_cycle(&shutdown).await, 0);
        assert_eq!(rig.queue.snapshot("dock"), vec![first, second]);
        assert_eq!(rig.registry.status(&first), Some(JobStatus::Pending));
        assert_eq!(rig.handle.opens(), 0);
    }

    #[tokio::test]
    async fn shutdown_during_a_send_finishes_only_that_write() {
        let rig = rig(3);
        rig.cache.record_status("dock", PrinterStatus::online_now());
        let first = submit(&rig, "^XA^FDfirst^FS^XZ", 3);
        let second = submit(&rig, "^XA^FDsecond^FS^XZ", 1);
        let shutdown = CancellationToken::new();
        rig.handle.cancel_after_payloads(1, shutdown.clone());

        assert_eq!(rig.worker.run_cycle(&shutdown).await, 0);
        assert_eq!(rig.handle.writes(), vec![b"^XA^FDfirst^FS^XZ".to_vec()]);
        assert_eq!(rig.queue.snapshot("dock"), vec![first, second]);
        assert_eq!(rig.registry.status(&second), Some(JobStatus::Pending));

        let job = rig.registry.get(&first).unwrap();
        assert_eq!(job.status, JobStatus::Printing);
        assert_eq!(job.copies_sent, 1);
        assert_eq!(job.attempts, 0);

        rig.worker.run_cycle(&CancellationToken::new()).await;
        assert_eq!(rig.registry.status(&first), Some(JobStatus::Completed));
        assert_eq!(rig.registry.status(&second), Some(JobStatus::Completed));
        assert_eq!(rig.handle.writes_containing(b"^FDfirst"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn job_taken_by_the_sweep_is_not_claimed() {
        let rig = rig(3);
        let id = submit(&rig, "^XA^FDa^FS^XZ", 1);
        let seen = rig.registry.get(&id).unwrap().status;

        tokio::time::advance(Duration::from_secs(300)).await;
        let report = rig.queue.sweep(&rig.registry, Instant::now());
        assert_eq!(report.expired, vec![id]);

        assert!(!rig.worker.claim(&id, seen));
        assert_eq!(rig.registry.status(&id), Some(JobStatus::Expired));
        assert_eq!(rig.handle.opens(), 0);
    }

    #[tokio::test]
    async fn claim_dequeues_before_marking_printing() {
        let rig = rig(3);
        let id = submit(&rig, "^XA^FDa^FS^XZ", 1);

        assert!(rig.worker.claim(&id, JobStatus::Pending));
        assert_eq!(rig.queue.depth("dock"), 0);
        assert_eq!(rig.registry.status(&id), Some(JobStatus::Printing));
    }
}
