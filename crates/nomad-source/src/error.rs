// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Errors talking to the Nomad HTTP API.
#[derive(Debug, Error)]
pub enum NomadError {
    #[error("request to nomad failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("nomad returned HTTP status {status}: {message}")]
    Status {
        status: reqwest::StatusCode,
        message: String,
    },

    #[error("failed to decode nomad response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to decode log frame data: {0}")]
    FrameData(#[from] base64::DecodeError),

    #[error("local nomad agent is not running as a client")]
    NotAClient,

    #[error("invalid nomad address {0:?}")]
    InvalidAddress(String),
}

/// Fatal conditions that stop the reconciler.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to list allocations {attempts} times in a row, last error: {source}")]
    PollRetriesExhausted {
        attempts: u32,
        #[source]
        source: NomadError,
    },

    #[error("initial allocation listing failed: {0}")]
    InitialPoll(#[source] NomadError),
}
