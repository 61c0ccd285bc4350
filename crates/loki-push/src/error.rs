// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Failure to deliver a batch to the push endpoint.
///
/// Every variant leaves the batch in place so the next flush retries it.
#[derive(Debug, Error)]
pub enum PushError {
    #[error("failed to compress push request: {0}")]
    Compress(#[from] snap::Error),

    #[error("failed to send push request: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned HTTP status {status}: {message}")]
    Status {
        status: reqwest::StatusCode,
        message: String,
    },
}
