// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Wiring between the Nomad source and the Loki sink, and shutdown ordering.
//!
//! ```text
//!   Reconciler ──(runners)──> source channel ──> Pipeline ──> sink channel ──> SinkClient
//! ```
//!
//! On shutdown the root token is cancelled, yet the pipeline keeps forwarding
//! until the source channel closes, which only happens once every runner has
//! exited. Only then is the sink sender dropped, so the sink's final flush
//! sees everything the runners produced.

use std::future::Future;
use std::sync::Arc;

use loki_push::{SinkClient, SinkConfig};
use nomad_source::{Orchestrator, Reconciler, SourceConfig};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::ShipperError;

pub struct Pipeline {
    orchestrator: Arc<dyn Orchestrator>,
    source: SourceConfig,
    sink: SinkConfig,
}

impl Pipeline {
    #[must_use]
    pub fn new(orchestrator: Arc<dyn Orchestrator>, source: SourceConfig, sink: SinkConfig) -> Self {
        Self {
            orchestrator,
            source,
            sink,
        }
    }

    /// Runs until `shutdown` resolves or the source stops on its own, then
    /// drains and flushes. A fatal source error is returned once the drain
    /// has completed.
    pub async fn run<F>(self, shutdown: F) -> Result<(), ShipperError>
    where
        F: Future<Output = ()>,
    {
        let root = CancellationToken::new();
        let (reconciler, mut source_rx) = Reconciler::new(self.orchestrator, self.source, &root);
        let (sink, sink_tx) = SinkClient::new(self.sink)?;

        let sink_handle = tokio::spawn(sink.run());
        let source_handle = tokio::spawn(reconciler.run());

        tokio::pin!(shutdown);
        let mut shutting_down = false;
        let mut forwarded: u64 = 0;

        loop {
            tokio::select! {
                () = &mut shutdown, if !shutting_down => {
                    info!("Shutdown requested, draining runners");
                    shutting_down = true;
                    root.cancel();
                }
                entry = source_rx.recv() => {
                    let Some(entry) = entry else {
                        debug!("Source channel closed");
                        break;
                    };
                    if sink_tx.send(entry).await.is_err() {
                        error!("Sink client stopped unexpectedly, shutting down");
                        root.cancel();
                        break;
                    }
                    forwarded += 1;
                }
            }
        }

        // Unblocks runners still sending if the loop ended early.
        drop(source_rx);
        drop(sink_tx);

        let sink_result = sink_handle.await;
        let source_result = source_handle.await;
        info!(forwarded, "Pipeline stopped");

        sink_result.map_err(|e| ShipperError::Runtime(format!("sink task failed: {e}")))?;
        source_result
            .map_err(|e| ShipperError::Runtime(format!("source task failed: {e}")))??;
        Ok(())
    }
}
