// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::SystemTime;

use futures::StreamExt;
use loki_push::{Entry, LabelSet};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

use crate::labels;
use crate::model::{Allocation, LogStreamKind};
use crate::orchestrator::Orchestrator;
use crate::reassembler::LineReassembler;

/// Tails the stdout and stderr of one task.
///
/// Each direction runs as its own tokio task with its own reassembly buffer.
/// A direction whose stream ends is restarted alone through
/// [`TaskRunner::restart_finished`]. The other direction keeps its stream.
pub struct TaskRunner {
    alloc_id: String,
    task: String,
    task_labels: LabelSet,
    cancel: CancellationToken,
    handles: Vec<(LogStreamKind, JoinHandle<()>)>,
}

impl TaskRunner {
    pub fn start(
        orchestrator: &Arc<dyn Orchestrator>,
        alloc: &Allocation,
        task: &str,
        tx: &mpsc::Sender<Entry>,
        parent: &CancellationToken,
        tracker: &TaskTracker,
    ) -> Self {
        let mut runner = Self {
            alloc_id: alloc.id.clone(),
            task: task.to_string(),
            task_labels: labels::task_labels(alloc, task),
            cancel: parent.child_token(),
            handles: Vec::with_capacity(LogStreamKind::ALL.len()),
        };
        for kind in LogStreamKind::ALL {
            let handle = runner.spawn(kind, orchestrator, tx, tracker);
            runner.handles.push((kind, handle));
        }
        runner
    }

    fn spawn(
        &self,
        kind: LogStreamKind,
        orchestrator: &Arc<dyn Orchestrator>,
        tx: &mpsc::Sender<Entry>,
        tracker: &TaskTracker,
    ) -> JoinHandle<()> {
        tracker.spawn(tail(
            Arc::clone(orchestrator),
            self.alloc_id.clone(),
            self.task.clone(),
            kind,
            self.task_labels.clone(),
            tx.clone(),
            self.cancel.clone(),
        ))
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Number of directions whose tail has exited.
    #[must_use]
    pub fn finished_streams(&self) -> usize {
        self.handles
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .count()
    }

    /// Reopens every direction whose tail has exited and returns how many
    /// were reopened. Directions still streaming are left alone.
    pub fn restart_finished(
        &mut self,
        orchestrator: &Arc<dyn Orchestrator>,
        tx: &mpsc::Sender<Entry>,
        tracker: &TaskTracker,
    ) -> usize {
        if self.cancel.is_cancelled() {
            return 0;
        }
        let finished: Vec<usize> = self
            .handles
            .iter()
            .enumerate()
            .filter(|(_, (_, handle))| handle.is_finished())
            .map(|(i, _)| i)
            .collect();
        for &i in &finished {
            let kind = self.handles[i].0;
            debug!(alloc_id = %self.alloc_id, task = %self.task, stream = %kind, "NOMAD | Restarting log tail");
            self.handles[i].1 = self.spawn(kind, orchestrator, tx, tracker);
        }
        finished.len()
    }
}

impl Drop for TaskRunner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn tail(
    orchestrator: Arc<dyn Orchestrator>,
    alloc_id: String,
    task: String,
    kind: LogStreamKind,
    task_labels: LabelSet,
    tx: mpsc::Sender<Entry>,
    cancel: CancellationToken,
) {
    let stream_labels: LabelSet = [(labels::STREAM, kind.as_str())].into_iter().collect();
    let entry_labels = task_labels.merge(&stream_labels);

    let opened = tokio::select! {
        () = cancel.cancelled() => return,
        opened = orchestrator.log_stream(&alloc_id, &task, kind) => opened,
    };
    let mut chunks = match opened {
        Ok(chunks) => chunks,
        Err(e) => {
            warn!(%alloc_id, %task, stream = %kind, "NOMAD | Failed to open log stream: {e}");
            return;
        }
    };
    info!(%alloc_id, %task, stream = %kind, "NOMAD | Tailing task logs");

    let mut reassembler = LineReassembler::new();
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(%alloc_id, %task, stream = %kind, "NOMAD | Stopping log tail");
                return;
            }
            next = chunks.next() => next,
        };

        match next {
            Some(Ok(chunk)) => {
                let arrival = SystemTime::now();
                for line in reassembler.push(&chunk, arrival) {
                    trace!(%alloc_id, %task, stream = %kind, line = %line.text, "NOMAD | Received log line");
                    let entry = Entry::new(line.timestamp, line.text, entry_labels.clone());
                    if tx.send(entry).await.is_err() {
                        debug!(%alloc_id, %task, "NOMAD | Entry channel closed, stopping log tail");
                        return;
                    }
                }
            }
            Some(Err(e)) => {
                warn!(%alloc_id, %task, stream = %kind, "NOMAD | Log stream failed: {e}");
                break;
            }
            None => {
                warn!(%alloc_id, %task, stream = %kind, "NOMAD | Log stream closed unexpectedly, it is restarted on the next poll if the task still runs");
                break;
            }
        }
    }

    if let Some(line) = reassembler.finish() {
        let entry = Entry::new(line.timestamp, line.text, entry_labels);
        if tx.send(entry).await.is_err() {
            debug!(%alloc_id, %task, stream = %kind, "NOMAD | Entry channel closed, dropping partial line");
        }
    }
}
