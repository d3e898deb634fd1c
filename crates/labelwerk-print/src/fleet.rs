// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fleet manager: the one context that owns every printer, the status cache,
// the queues and the job registry.
//
// Background tasks (a health monitor and a queue worker per printer, plus
// one expiry sweeper) only talk to each other through that shared state.
// The API-layer operations below never touch printer I/O; submission is a
// render plus an append and returns immediately.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use labelwerk_core::config::FleetConfig;
use labelwerk_core::error::{LabelwerkError, Result};
use labelwerk_core::human_errors::{HumanError, describe_attention, humanize_error};
use labelwerk_core::types::{
    Dialect, FieldValues, JobId, JobReceipt, JobStatus, LinkState, PrintJob, PrinterConfig,
    PrinterStatus,
};

use crate::health::HealthMonitor;
use crate::printer::Printer;
use crate::protocol::resolve_dialect;
use crate::queue::{PrintQueue, SweepReport};
use crate::registry::JobRegistry;
use crate::render::Renderer;
use crate::retry::RetryConfig;
use crate::status::StatusCache;
use crate::worker::QueueWorker;

/// Cached status of one printer, as returned by `get_status`.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub name: String,
    pub state: LinkState,
    pub status: PrinterStatus,
    /// Time since the last probe or send outcome; `None` before the first.
    pub age: Option<Duration>,
    /// Older than `stale_after_intervals` probe intervals, or never observed.
    pub stale: bool,
    /// Something an operator should fix at the printer.
    pub attention: Option<HumanError>,
    pub last_error: Option<String>,
}

/// One row of `list_printers`.
#[derive(Debug, Clone)]
pub struct PrinterSummary {
    pub name: String,
    pub dialect: Dialect,
    pub state: LinkState,
    pub status: PrinterStatus,
    pub queue_depth: usize,
    pub attention: Option<String>,
}

struct PrinterSlot {
    config: PrinterConfig,
    device: Arc<tokio::sync::Mutex<Printer>>,
}

struct FleetState {
    settings: FleetConfig,
    printers: Vec<PrinterSlot>,
    cache: Arc<StatusCache>,
    queue: Arc<PrintQueue>,
    registry: Arc<JobRegistry>,
    renderer: Arc<dyn Renderer>,
}

impl FleetState {
    fn slot(&self, name: &str) -> Option<&PrinterSlot> {
        self.printers.iter().find(|slot| slot.config.name == name)
    }
}

/// Cheaply cloneable handle to the running fleet.
#[derive(Clone)]
pub struct Fleet {
    state: Arc<FleetState>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
    shutdown: CancellationToken,
}

impl Fleet {
    /// Build a fleet over already-constructed printers.
    pub fn new(
        settings: FleetConfig,
        printers: Vec<Printer>,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Self> {
        let configs: Vec<PrinterConfig> = printers.iter().map(|p| p.config().clone()).collect();
        FleetConfig {
            printers: configs,
            ..settings.clone()
        }
        .validate()?;

        let cache = Arc::new(StatusCache::new());
        let queue = Arc::new(PrintQueue::new());
        let slots = printers
            .into_iter()
            .map(|printer| {
                cache.register(printer.name());
                queue.register(printer.name());
                PrinterSlot {
                    config: printer.config().clone(),
                    device: Arc::new(tokio::sync::Mutex::new(printer)),
                }
            })
            .collect();

        Ok(Self {
            state: Arc::new(FleetState {
                settings,
                printers: slots,
                cache,
                queue,
                registry: Arc::new(JobRegistry::new()),
                renderer,
            }),
            tasks: Arc::default(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Build a fleet from configuration, skipping disabled printers.
    pub fn from_config(settings: FleetConfig, renderer: Arc<dyn Renderer>) -> Result<Self> {
        settings.validate()?;

        let mut printers = Vec::new();
        for config in &settings.printers {
            if !config.enabled {
                info!(printer = %config.name, "printer disabled, skipping");
                continue;
            }
            debug!(
                printer = %config.name,
                dialect = %config.dialect,
                connection = %config.connection.describe(),
                "printer configured"
            );
            printers.push(Printer::from_config(config.clone(), settings.io.clone()));
        }
        Self::new(settings, printers, renderer)
    }

    // -- Lifecycle -----------------------------------------------------------

    /// Spawn the per-printer health monitors and queue workers plus the
    /// expiry sweeper. Calling it again while running does nothing.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if !tasks.is_empty() {
            warn!("fleet already started");
            return;
        }

        let state = &self.state;
        let retry = RetryConfig::from(&state.settings);
        for slot in &state.printers {
            let name = slot.config.name.clone();

            let monitor = HealthMonitor::new(
                name.clone(),
                Arc::clone(&slot.device),
                Arc::clone(&state.cache),
                slot.config.healthcheck.interval(),
            );
            tasks.push(tokio::spawn(monitor.run(self.shutdown.clone())));

            let worker = QueueWorker::new(
                name,
                Arc::clone(&slot.device),
                Arc::clone(&state.cache),
                Arc::clone(&state.queue),
                Arc::clone(&state.registry),
                retry,
                state.settings.worker_tick(),
            );
            tasks.push(tokio::spawn(worker.run(self.shutdown.clone())));
        }

        tasks.push(tokio::spawn(run_sweeper(
            Arc::clone(state),
            self.shutdown.clone(),
        )));
        info!(printers = state.printers.len(), "fleet started");
    }

    /// Signal every task and wait for them. Sends and probes already in
    /// flight finish first.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "fleet task ended abnormally");
            }
        }
        info!("fleet stopped");
    }

    /// Run one expiry sweep and retention pass now.
    pub fn sweep(&self) -> SweepReport {
        sweep_once(&self.state, Instant::now())
    }

    // -- API -----------------------------------------------------------------

    /// Render a label and queue it for a printer.
    ///
    /// Without `printer_name`, the first configured printer the template
    /// supports is used. Every validation failure is returned before the
    /// queue is touched.
    #[instrument(skip(self, fields), fields(template = %template_name))]
    pub fn submit(
        &self,
        template_name: &str,
        printer_name: Option<&str>,
        quantity: u32,
        fields: &FieldValues,
    ) -> Result<JobReceipt> {
        let state = &self.state;
        let template = state
            .renderer
            .template(template_name)
            .ok_or_else(|| LabelwerkError::TemplateNotFound(template_name.to_string()))?;

        let slot = match printer_name {
            Some(name) => {
                let slot = state
                    .slot(name)
                    .ok_or_else(|| LabelwerkError::PrinterNotFound(name.to_string()))?;
                if !template.supports(&slot.config) {
                    return Err(LabelwerkError::IncompatibleTemplate {
                        template: template_name.to_string(),
                        printer: name.to_string(),
                    });
                }
                slot
            }
            None => state
                .printers
                .iter()
                .find(|slot| template.supports(&slot.config))
                .ok_or_else(|| LabelwerkError::NoCompatiblePrinter(template_name.to_string()))?,
        };

        let quantity = template.quantity.unwrap_or(quantity);
        if quantity == 0 {
            return Err(LabelwerkError::InvalidQuantity(quantity));
        }

        let mut fields = fields.clone();
        fields.insert("quantity".into(), serde_json::Value::from(quantity));
        let label = state.renderer.render(template_name, &fields)?;
        let dialect = resolve_dialect(&label.dialect_hint, slot.config.dialect);

        let timeout = state.settings.queue_timeout();
        let printer = slot.config.name.clone();
        let job = PrintJob::new(
            template_name.to_string(),
            printer.clone(),
            dialect,
            label.payload,
            quantity,
            timeout,
        );
        let id = job.id;
        let now = Instant::now();
        let deadline = now
            .checked_add(timeout)
            .unwrap_or_else(|| now + Duration::from_secs(u32::MAX.into()));

        state.registry.insert(job, deadline);
        state.queue.enqueue(&printer, id);

        let message = if state.cache.is_online(&printer) {
            format!("queued for {printer}")
        } else {
            format!("queued for {printer}; the printer is offline, the label prints when it is back")
        };
        info!(job_id = %id, printer = %printer, quantity, "job queued");

        Ok(JobReceipt {
            job_id: id,
            status: JobStatus::Pending,
            message,
        })
    }

    /// Last known status of a printer with its age. Never waits on I/O.
    pub fn get_status(&self, printer_name: &str) -> Result<StatusReport> {
        let state = &self.state;
        let slot = state
            .slot(printer_name)
            .ok_or_else(|| LabelwerkError::PrinterNotFound(printer_name.to_string()))?;

        let reading = state.cache.get(printer_name);
        let (link, status, age, last_error) = match reading {
            Some(r) => (r.state, r.status, r.age, r.last_error),
            None => (LinkState::Unknown, PrinterStatus::default(), None, None),
        };

        let threshold = slot
            .config
            .healthcheck
            .interval()
            .saturating_mul(state.settings.stale_after_intervals);
        let stale = age.is_none_or(|age| age > threshold);
        let attention = describe_attention(&status);

        Ok(StatusReport {
            name: printer_name.to_string(),
            state: link,
            status,
            age,
            stale,
            attention,
            last_error,
        })
    }

    pub fn list_printers(&self) -> Vec<PrinterSummary> {
        let state = &self.state;
        state
            .printers
            .iter()
            .map(|slot| {
                let name = &slot.config.name;
                let (link, status) = state
                    .cache
                    .get(name)
                    .map(|r| (r.state, r.status))
                    .unwrap_or((LinkState::Unknown, PrinterStatus::default()));
                PrinterSummary {
                    name: name.clone(),
                    dialect: slot.config.dialect,
                    state: link,
                    attention: describe_attention(&status).map(|hint| hint.message),
                    status,
                    queue_depth: state.queue.depth(name),
                }
            })
            .collect()
    }

    /// Current state of a job with an operator-facing message.
    pub fn get_job(&self, job_id: &str) -> Result<JobReceipt> {
        let job = job_id
            .parse::<JobId>()
            .ok()
            .and_then(|id| self.state.registry.get(&id))
            .ok_or_else(|| LabelwerkError::JobNotFound(job_id.to_string()))?;

        Ok(JobReceipt {
            job_id: job.id,
            status: job.status,
            message: job_message(&job),
        })
    }

    /// Full job record, for callers that need more than the receipt.
    pub fn job(&self, id: &JobId) -> Option<PrintJob> {
        self.state.registry.get(id)
    }
}

fn job_message(job: &PrintJob) -> String {
    match job.status {
        JobStatus::Pending => format!("queued for {}", job.printer_name),
        JobStatus::Printing if job.attempts > 0 => format!(
            "waiting for {} after {} failed attempt(s)",
            job.printer_name, job.attempts
        ),
        JobStatus::Printing => format!("sending to {}", job.printer_name),
        JobStatus::Completed => format!("printed {} label(s)", job.quantity),
        JobStatus::Failed => {
            humanize_error(&LabelwerkError::QueueSendFailed {
                job: job.id,
                attempts: job.attempts,
                reason: job.error_message.clone().unwrap_or_default(),
            })
            .message
        }
        JobStatus::Expired => humanize_error(&LabelwerkError::JobExpired(job.id)).message,
    }
}

fn sweep_once(state: &FleetState, now: Instant) -> SweepReport {
    let report = state.queue.sweep(&state.registry, now);
    let reclaimed = state
        .registry
        .reclaim(now, state.settings.job_retention());
    if !report.is_empty() || reclaimed > 0 {
        debug!(
            expired = report.expired.len(),
            failed = report.failed.len(),
            reclaimed,
            "sweep finished"
        );
    }
    report
}

async fn run_sweeper(state: Arc<FleetState>, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(state.settings.sweep_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        sweep_once(&state, Instant::now());
    }
    debug!("expiry sweeper stopped");
}
