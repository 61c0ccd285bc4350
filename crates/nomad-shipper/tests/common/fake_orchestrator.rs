// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Scripted orchestrator: fixed allocations, log chunks and event batches

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use nomad_source::model::{
    Allocation, AllocationStatus, EventBatch, JobSummary, LogStreamKind, TaskState,
};
use nomad_source::orchestrator::{ChunkStream, EventBatchStream, Orchestrator};
use nomad_source::NomadError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn running_alloc(id: &str, job: &str, tasks: &[&str]) -> Allocation {
    Allocation {
        id: id.to_string(),
        job_id: job.to_string(),
        job: Some(JobSummary {
            name: Some(job.to_string()),
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
            .collect(),
    }
}

/// Scripted streams yield their items then stay open until dropped.
pub struct FakeOrchestrator {
    allocations: Vec<Allocation>,
    logs: Mutex<HashMap<(String, String, LogStreamKind), Vec<Bytes>>>,
    events: Mutex<HashMap<String, Vec<EventBatch>>>,
    listings: AtomicUsize,
    /// Listings after this many successful ones fail
    succeed_times: usize,
}

impl FakeOrchestrator {
    pub fn new(allocations: Vec<Allocation>) -> Self {
        Self {
            allocations,
            logs: Mutex::new(HashMap::new()),
            events: Mutex::new(HashMap::new()),
            listings: AtomicUsize::new(0),
            succeed_times: usize::MAX,
        }
    }

    pub fn failing_after(mut self, successes: usize) -> Self {
        self.succeed_times = successes;
        self
    }

    pub fn with_logs(self, alloc_id: &str, task: &str, kind: LogStreamKind, chunks: &[&str]) -> Self {
        self.logs.lock().unwrap().insert(
            (alloc_id.to_string(), task.to_string(), kind),
            chunks.iter().map(|c| Bytes::copy_from_slice(c.as_bytes())).collect(),
        );
        self
    }

    #[allow(dead_code)]
    pub fn with_events(self, alloc_id: &str, batches: Vec<EventBatch>) -> Self {
        self.events
            .lock()
            .unwrap()
            .insert(alloc_id.to_string(), batches);
        self
    }
}

#[async_trait]
impl Orchestrator for FakeOrchestrator {
    async fn node_allocations(&self) -> Result<Vec<Allocation>, NomadError> {
        let previous = self.listings.fetch_add(1, Ordering::SeqCst);
        if previous >= self.succeed_times {
            return Err(NomadError::NotAClient);
        }
        Ok(self.allocations.clone())
    }

    async fn log_stream(
        &self,
        alloc_id: &str,
        task: &str,
        kind: LogStreamKind,
    ) -> Result<ChunkStream, NomadError> {
        let chunks = self
            .logs
            .lock()
            .unwrap()
            .remove(&(alloc_id.to_string(), task.to_string(), kind))
            .unwrap_or_default();
        Ok(stream::iter(chunks.into_iter().map(Ok))
            .chain(stream::pending())
            .boxed())
    }

    async fn event_stream(&self, alloc_id: &str) -> Result<EventBatchStream, NomadError> {
        let batches = self
            .events
            .lock()
            .unwrap()
            .remove(alloc_id)
            .unwrap_or_default();
        Ok(stream::iter(batches.into_iter().map(Ok))
            .chain(stream::pending())
            .boxed())
    }
}
