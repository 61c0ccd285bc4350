// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

pub const DEFAULT_NOMAD_ADDR: &str = "http://127.0.0.1:4646";

/// Interval between two allocation listings.
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Consecutive failed listings after which the reconciler gives up.
pub const MAX_POLL_FAILURES: u32 = 10;

/// Task events older than this are not shipped.
pub const MAX_EVENT_AGE: Duration = Duration::from_secs(12 * 60 * 60);

/// Capacity of the entry channel shared by all runners.
pub const CHANNEL_CAPACITY: usize = 32;

/// Timeout for non-streaming Nomad API requests.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Stream name used for task events.
pub const EVENTS_STREAM: &str = "events";

pub const LOG_ORIGIN: &str = "start";
