// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory orchestrator for unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};

use crate::error::NomadError;
use crate::model::{
    Allocation, AllocationStatus, EventBatch, JobSummary, LogStreamKind, TaskState,
};
use crate::orchestrator::{ChunkStream, EventBatchStream, Orchestrator};

pub(crate) fn running_alloc(id: &str, tasks: &[&str]) -> Allocation {
    Allocation {
        id: id.to_string(),
        job_id: format!("job-{id}"),
        job: Some(JobSummary {
            name: Some(format!("job-{id}")),
        }),
        task_group: "group".to_string(),
        client_status: AllocationStatus::Running,
        task_states: tasks
            .iter()
            .map(|t| {
                (
                    (*t).to_string(),
                    TaskState {
                        state: "running".to_string(),
                    },
                )
            })
            .collect::<BTreeMap<_, _>>(),
    }
}

/// Unscripted streams stay open until dropped, or end immediately when
/// `close_streams` is set. Scripted streams yield their items once and end.
#[derive(Default)]
pub(crate) struct FakeOrchestrator {
    allocations: Mutex<Vec<Allocation>>,
    failing: AtomicBool,
    close_streams: AtomicBool,
    logs: Mutex<HashMap<(String, String, LogStreamKind), Vec<Bytes>>>,
    events: Mutex<HashMap<String, Vec<EventBatch>>>,
    pub log_opens: AtomicUsize,
    pub event_opens: AtomicUsize,
}

impl FakeOrchestrator {
    pub fn set_allocations(&self, allocations: Vec<Allocation>) {
        *self.allocations.lock().unwrap() = allocations;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_close_streams(&self, close: bool) {
        self.close_streams.store(close, Ordering::SeqCst);
    }

    pub fn script_logs(&self, alloc_id: &str, task: &str, kind: LogStreamKind, chunks: Vec<Bytes>) {
        self.logs
            .lock()
            .unwrap()
            .insert((alloc_id.to_string(), task.to_string(), kind), chunks);
    }

    pub fn script_events(&self, alloc_id: &str, batches: Vec<EventBatch>) {
        self.events
            .lock()
            .unwrap()
            .insert(alloc_id.to_string(), batches);
    }

    fn unscripted<T: Send + 'static>(&self) -> stream::BoxStream<'static, T> {
        if self.close_streams.load(Ordering::SeqCst) {
            stream::empty().boxed()
        } else {
            stream::pending().boxed()
        }
    }
}

#[async_trait]
impl Orchestrator for FakeOrchestrator {
    async fn node_allocations(&self) -> Result<Vec<Allocation>, NomadError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NomadError::NotAClient);
        }
        Ok(self.allocations.lock().unwrap().clone())
    }

    async fn log_stream(
        &self,
        alloc_id: &str,
        task: &str,
        kind: LogStreamKind,
    ) -> Result<ChunkStream, NomadError> {
        self.log_opens.fetch_add(1, Ordering::SeqCst);
        let scripted = self
            .logs
            .lock()
            .unwrap()
            .remove(&(alloc_id.to_string(), task.to_string(), kind));
        Ok(match scripted {
            Some(chunks) => stream::iter(chunks.into_iter().map(Ok)).boxed(),
            None => self.unscripted(),
        })
    }

    async fn event_stream(&self, alloc_id: &str) -> Result<EventBatchStream, NomadError> {
        self.event_opens.fetch_add(1, Ordering::SeqCst);
        let scripted = self.events.lock().unwrap().remove(alloc_id);
        Ok(match scripted {
            Some(batches) => stream::iter(batches.into_iter().map(Ok)).boxed(),
            None => self.unscripted(),
        })
    }
}
