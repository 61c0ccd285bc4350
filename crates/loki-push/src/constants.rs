// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// How often the sink client checks whether the batch should be pushed.
pub const FLUSH_PERIOD: Duration = Duration::from_secs(15);

/// Timeout applied to a regular push request.
pub const PUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout applied to the push performed when the entry channel closes.
pub const FINAL_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// A batch whose oldest entry is older than this is ready to send.
pub const MAX_BATCH_AGE: Duration = Duration::from_secs(2);

/// A batch holding at least this many line bytes is ready to send.
pub const MIN_BATCH_BYTES: usize = 4096;

/// Capacity of the entry channel between producers and the sink client.
pub const CHANNEL_CAPACITY: usize = 32;

pub const CONTENT_TYPE: &str = "application/x-protobuf";
