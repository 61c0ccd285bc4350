// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::error::ShipperError;

/// Installs the global `fmt` subscriber. HTTP client internals are silenced
/// so that `debug` and `trace` stay readable.
pub fn init(log_level: &str) -> Result<(), ShipperError> {
    let filter = EnvFilter::try_new(env_filter(log_level))
        .map_err(|e| ShipperError::InvalidConfig(format!("could not parse log level: {e}")))?;

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ShipperError::Runtime(format!("setting default subscriber failed: {e}")))?;

    debug!("Logging subsystem enabled");
    Ok(())
}

fn env_filter(log_level: &str) -> String {
    format!("h2=off,hyper=off,reqwest=off,rustls=off,{log_level}")
}
