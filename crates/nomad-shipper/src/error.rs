// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use loki_push::PushError;
use nomad_source::{NomadError, SourceError};

/// Errors that stop the shipper
#[derive(Debug, thiserror::Error)]
pub enum ShipperError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to connect to nomad: {0}")]
    Nomad(#[from] NomadError),

    #[error("Failed to create sink client: {0}")]
    Sink(#[from] PushError),

    #[error("Log source failed: {0}")]
    Source(#[from] SourceError),

    #[error("Runtime error: {0}")]
    Runtime(String),
}
