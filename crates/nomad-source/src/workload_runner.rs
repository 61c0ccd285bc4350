// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use futures::StreamExt;
use loki_push::{Entry, LabelSet};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

use crate::constants::EVENTS_STREAM;
use crate::events::flatten;
use crate::labels;
use crate::model::{Allocation, EventBatch};
use crate::orchestrator::Orchestrator;

/// Follows the task lifecycle events of one allocation and ships them as log
/// lines on the `events` stream.
pub struct WorkloadRunner {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl WorkloadRunner {
    pub fn start(
        orchestrator: &Arc<dyn Orchestrator>,
        alloc: &Allocation,
        tx: &mpsc::Sender<Entry>,
        parent: &CancellationToken,
        tracker: &TaskTracker,
        max_event_age: Duration,
    ) -> Self {
        let cancel = parent.child_token();
        let handle = tracker.spawn(follow(
            Arc::clone(orchestrator),
            alloc.id.clone(),
            labels::allocation_labels(alloc),
            tx.clone(),
            cancel.clone(),
            max_event_age,
        ));
        Self { cancel, handle }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for WorkloadRunner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn follow(
    orchestrator: Arc<dyn Orchestrator>,
    alloc_id: String,
    alloc_labels: LabelSet,
    tx: mpsc::Sender<Entry>,
    cancel: CancellationToken,
    max_event_age: Duration,
) {
    let opened = tokio::select! {
        () = cancel.cancelled() => return,
        opened = orchestrator.event_stream(&alloc_id) => opened,
    };
    let mut batches = match opened {
        Ok(batches) => batches,
        Err(e) => {
            warn!(%alloc_id, "NOMAD | Failed to open event stream: {e}");
            return;
        }
    };
    info!(%alloc_id, "NOMAD | Following allocation events");

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(%alloc_id, "NOMAD | Stopping event stream");
                return;
            }
            next = batches.next() => next,
        };

        match next {
            Some(Ok(batch)) => {
                for entry in entries_from_batch(&alloc_id, &alloc_labels, batch, max_event_age) {
                    if tx.send(entry).await.is_err() {
                        debug!(%alloc_id, "NOMAD | Entry channel closed, stopping event stream");
                        return;
                    }
                }
            }
            Some(Err(e)) => {
                warn!(%alloc_id, "NOMAD | Event stream failed: {e}");
                return;
            }
            None => {
                warn!(%alloc_id, "NOMAD | Event stream closed unexpectedly, it is restarted on the next poll if the allocation still runs");
                return;
            }
        }
    }
}

fn entries_from_batch(
    alloc_id: &str,
    alloc_labels: &LabelSet,
    batch: EventBatch,
    max_event_age: Duration,
) -> Vec<Entry> {
    let now = SystemTime::now();
    let mut entries = Vec::new();

    for raw in batch.events {
        let flattened = match flatten(&raw.payload, now, max_event_age) {
            Ok(Some(flattened)) => flattened,
            Ok(None) => {
                debug!(%alloc_id, index = batch.index, "NOMAD | Allocation has no task states yet");
                continue;
            }
            Err(e) => {
                warn!(%alloc_id, topic = %raw.topic, event_type = %raw.event_type, "NOMAD | Unexpected event payload: {e}");
                continue;
            }
        };

        for rejected in flattened.rejected {
            warn!(
                %alloc_id,
                task = %rejected.task,
                event = %rejected.raw,
                "NOMAD | Skipping malformed task event: {}",
                rejected.reason
            );
        }
        if flattened.stale > 0 {
            debug!(%alloc_id, count = flattened.stale, "NOMAD | Ignored old task events");
        }

        for event in flattened.events {
            trace!(%alloc_id, task = %event.task, event_type = %event.event.event_type, "NOMAD | Received task event");
            let event_labels: LabelSet = [
                (labels::TASK_NAME, event.task.as_str()),
                (labels::EVENT_TYPE, event.event.event_type.as_str()),
                (labels::STREAM, EVENTS_STREAM),
            ]
            .into_iter()
            .collect();
            entries.push(Entry::new(
                event.timestamp,
                event.event.display_message,
                alloc_labels.merge(&event_labels),
            ));
        }
    }

    entries
}
