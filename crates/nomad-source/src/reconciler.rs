// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Convergence of the runner registry towards the node's running allocations.
//!
//! # Lifecycle
//!
//! ```text
//!   Reconciler::new ──> run()
//!                        │
//!                        ├── initial poll (any failure is fatal)
//!                        │
//!                        ├── every poll_interval: poll()
//!                        │      ├── prune event runners whose stream ended
//!                        │      ├── list allocations
//!                        │      ├── start runners for new running allocations/tasks
//!                        │      ├── reopen ended log directions of running tasks
//!                        │      └── stop runners for departed or no longer running
//!                        │          allocations/tasks
//!                        │
//!                        └── on cancel or fatal error:
//!                               cancel all runners, wait for them,
//!                               drop the sender (entry channel closes)
//! ```
//!
//! The registry is owned by the reconciler task alone. Runners only share the
//! entry channel.
//!
//! # Failure handling
//!
//! A failed listing keeps every runner alive and skips the cycle. After
//! `max_poll_failures` consecutive failures the reconciler gives up with
//! [`SourceError::PollRetriesExhausted`]. A successful listing resets the
//! counter.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use loki_push::Entry;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::constants;
use crate::error::{NomadError, SourceError};
use crate::model::{Allocation, AllocationStatus};
use crate::orchestrator::Orchestrator;
use crate::task_runner::TaskRunner;
use crate::workload_runner::WorkloadRunner;

#[derive(Clone, Debug)]
pub struct SourceConfig {
    pub poll_interval: Duration,
    pub max_poll_failures: u32,
    pub max_event_age: Duration,
    pub channel_capacity: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            poll_interval: constants::POLL_INTERVAL,
            max_poll_failures: constants::MAX_POLL_FAILURES,
            max_event_age: constants::MAX_EVENT_AGE,
            channel_capacity: constants::CHANNEL_CAPACITY,
        }
    }
}

/// What one poll changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// The listing failed and the cycle was skipped.
    pub skipped: bool,
    pub workloads_started: usize,
    pub workloads_stopped: usize,
    pub tasks_started: usize,
    pub tasks_stopped: usize,
    /// Event runners removed because their stream ended on their own.
    pub runners_exited: usize,
    /// Log directions reopened because their stream ended while the task
    /// still runs.
    pub streams_restarted: usize,
}

impl ReconcileSummary {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        *self == ReconcileSummary::default()
    }
}

pub struct Reconciler {
    orchestrator: Arc<dyn Orchestrator>,
    config: SourceConfig,
    cancel: CancellationToken,
    tracker: TaskTracker,
    tx: mpsc::Sender<Entry>,
    workloads: HashMap<String, WorkloadRunner>,
    tasks: HashMap<String, HashMap<String, TaskRunner>>,
    consecutive_failures: u32,
}

impl Reconciler {
    /// Creates the reconciler and the receiving half of the entry channel.
    /// The channel closes once [`Reconciler::run`] has returned and every
    /// runner has exited.
    pub fn new(
        orchestrator: Arc<dyn Orchestrator>,
        config: SourceConfig,
        parent: &CancellationToken,
    ) -> (Self, mpsc::Receiver<Entry>) {
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        (
            Self {
                orchestrator,
                config,
                cancel: parent.child_token(),
                tracker: TaskTracker::new(),
                tx,
                workloads: HashMap::new(),
                tasks: HashMap::new(),
                consecutive_failures: 0,
            },
            rx,
        )
    }

    #[must_use]
    pub fn active_workloads(&self) -> usize {
        self.workloads.len()
    }

    #[must_use]
    pub fn active_tasks(&self, alloc_id: &str) -> usize {
        self.tasks.get(alloc_id).map_or(0, HashMap::len)
    }

    /// Polls until cancelled or a fatal error occurs, then stops every
    /// runner and waits for them before returning.
    pub async fn run(mut self) -> Result<(), SourceError> {
        let result = self.poll_loop().await;
        if let Err(e) = &result {
            warn!("NOMAD | Reconciler stopping on fatal error: {e}");
        }

        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        self.workloads.clear();
        self.tasks.clear();
        info!("NOMAD | All runners stopped");

        result
    }

    async fn poll_loop(&mut self) -> Result<(), SourceError> {
        let allocations = tokio::select! {
            () = self.cancel.cancelled() => return Ok(()),
            listed = self.orchestrator.node_allocations() => listed.map_err(SourceError::InitialPoll)?,
        };
        let summary = self.converge(&allocations);
        debug!(?summary, "NOMAD | Initial reconciliation done");

        let period = self.config.poll_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return Ok(()),
                _ = ticker.tick() => {
                    let summary = self.poll().await?;
                    if !summary.is_noop() {
                        debug!(?summary, "NOMAD | Reconciled allocations");
                    }
                }
            }
        }
    }

    /// Runs one reconciliation pass.
    pub async fn poll(&mut self) -> Result<ReconcileSummary, SourceError> {
        let exited = self.prune_finished();

        let listed = self.orchestrator.node_allocations().await;
        let mut summary = match listed {
            Ok(allocations) => {
                self.consecutive_failures = 0;
                self.converge(&allocations)
            }
            Err(e) => {
                self.record_failure(e)?;
                ReconcileSummary {
                    skipped: true,
                    ..ReconcileSummary::default()
                }
            }
        };
        summary.runners_exited = exited;
        Ok(summary)
    }

    fn record_failure(&mut self, err: NomadError) -> Result<(), SourceError> {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.config.max_poll_failures {
            return Err(SourceError::PollRetriesExhausted {
                attempts: self.consecutive_failures,
                source: err,
            });
        }
        warn!(
            failures = self.consecutive_failures,
            max = self.config.max_poll_failures,
            "NOMAD | Failed to list allocations: {err}"
        );
        Ok(())
    }

    fn prune_finished(&mut self) -> usize {
        let mut exited = 0;

        self.workloads.retain(|alloc_id, runner| {
            let finished = runner.is_finished();
            if finished {
                debug!(%alloc_id, "NOMAD | Event runner exited");
                exited += 1;
            }
            !finished
        });

        exited
    }

    fn converge(&mut self, allocations: &[Allocation]) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        let mut running = HashSet::new();

        for alloc in allocations {
            match alloc.client_status {
                AllocationStatus::Running => {
                    running.insert(alloc.id.as_str());
                    self.ensure_running(alloc, &mut summary);
                }
                AllocationStatus::Unknown => {
                    warn!(alloc_id = %alloc.id, "NOMAD | Allocation has an unknown client status, not tailing it");
                }
                AllocationStatus::Pending
                | AllocationStatus::Complete
                | AllocationStatus::Failed
                | AllocationStatus::Lost => {}
            }
        }

        let departed: HashSet<String> = self
            .workloads
            .keys()
            .chain(self.tasks.keys())
            .filter(|id| !running.contains(id.as_str()))
            .cloned()
            .collect();
        for alloc_id in departed {
            if let Some(runner) = self.workloads.remove(&alloc_id) {
                runner.stop();
                summary.workloads_stopped += 1;
            }
            if let Some(runners) = self.tasks.remove(&alloc_id) {
                for runner in runners.values() {
                    runner.stop();
                }
                summary.tasks_stopped += runners.len();
            }
            info!(%alloc_id, "NOMAD | Stopped tailing allocation");
        }

        summary
    }

    fn ensure_running(&mut self, alloc: &Allocation, summary: &mut ReconcileSummary) {
        if !self.workloads.contains_key(&alloc.id) {
            let runner = WorkloadRunner::start(
                &self.orchestrator,
                alloc,
                &self.tx,
                &self.cancel,
                &self.tracker,
                self.config.max_event_age,
            );
            self.workloads.insert(alloc.id.clone(), runner);
            summary.workloads_started += 1;
        }

        let runners = self.tasks.entry(alloc.id.clone()).or_default();
        runners.retain(|task, runner| {
            let keep = alloc.is_task_running(task);
            if !keep {
                debug!(alloc_id = %alloc.id, %task, "NOMAD | Task is no longer running");
                runner.stop();
                summary.tasks_stopped += 1;
            }
            keep
        });

        for task in alloc.running_tasks() {
            if let Some(runner) = runners.get_mut(task) {
                summary.streams_restarted +=
                    runner.restart_finished(&self.orchestrator, &self.tx, &self.tracker);
                continue;
            }
            let runner = TaskRunner::start(
                &self.orchestrator,
                alloc,
                task,
                &self.tx,
                &self.cancel,
                &self.tracker,
            );
            runners.insert(task.to_string(), runner);
            summary.tasks_started += 1;
        }
    }
}
