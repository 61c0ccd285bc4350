// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::NomadError;
use crate::model::{Allocation, EventBatch, LogStreamKind};

/// Raw log bytes of one task stream, in the order the agent produced them.
pub type ChunkStream = BoxStream<'static, Result<Bytes, NomadError>>;

/// Event batches for one allocation, heartbeats included.
pub type EventBatchStream = BoxStream<'static, Result<EventBatch, NomadError>>;

/// What the shipper needs from the workload orchestrator.
///
/// Streams stay open until the server closes them or the caller drops them;
/// dropping a stream aborts the underlying request.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Lists the allocations placed on the local node.
    async fn node_allocations(&self) -> Result<Vec<Allocation>, NomadError>;

    /// Follows a task's stdout or stderr from the beginning of the log.
    async fn log_stream(
        &self,
        alloc_id: &str,
        task: &str,
        kind: LogStreamKind,
    ) -> Result<ChunkStream, NomadError>;

    /// Follows the allocation topic of the event stream for one allocation.
    async fn event_stream(&self, alloc_id: &str) -> Result<EventBatchStream, NomadError>;
}
