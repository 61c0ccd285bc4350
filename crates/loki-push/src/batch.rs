// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory accumulation of entries between pushes.
//!
//! Entries are grouped into streams keyed by the canonical string of their
//! label set. Within a stream, entries keep the order in which they were
//! added. The batch tracks the arrival time of its oldest entry and the total
//! number of line bytes it holds, which together drive the readiness policy:
//!
//! - an empty batch is never ready,
//! - a batch whose oldest entry is older than `max_age` is ready,
//! - a batch holding at least `min_bytes` line bytes is ready.

use std::collections::HashMap;
use std::time::Duration;

use prost::Message;
use tokio::time::Instant;

use crate::constants;
use crate::entry::Entry;
use crate::error::PushError;
use crate::proto::{EntryAdapter, PushRequest, StreamAdapter};

#[derive(Debug)]
pub struct Batch {
    streams: HashMap<String, StreamAdapter>,
    oldest_entry_time: Option<Instant>,
    bytes: usize,
    max_age: Duration,
    min_bytes: usize,
}

impl Default for Batch {
    fn default() -> Self {
        Self::new(constants::MAX_BATCH_AGE, constants::MIN_BATCH_BYTES)
    }
}

impl Batch {
    #[must_use]
    pub fn new(max_age: Duration, min_bytes: usize) -> Self {
        Self {
            streams: HashMap::new(),
            oldest_entry_time: None,
            bytes: 0,
            max_age,
            min_bytes,
        }
    }

    /// Appends `entry` to the stream matching its labels.
    pub fn add(&mut self, entry: Entry) {
        if self.oldest_entry_time.is_none() {
            self.oldest_entry_time = Some(Instant::now());
        }
        self.bytes += entry.line().len();

        let key = entry.labels().to_string();
        let stream = self
            .streams
            .entry(key)
            .or_insert_with_key(|labels| StreamAdapter {
                labels: labels.clone(),
                entries: Vec::new(),
            });
        stream.entries.push(EntryAdapter {
            timestamp: Some(prost_types::Timestamp::from(entry.timestamp())),
            line: entry.line().to_owned(),
        });
    }

    #[must_use]
    pub fn ready_to_send(&self) -> bool {
        self.ready_to_send_at(Instant::now())
    }

    #[must_use]
    pub fn ready_to_send_at(&self, now: Instant) -> bool {
        let Some(oldest) = self.oldest_entry_time else {
            return false;
        };
        now.saturating_duration_since(oldest) > self.max_age || self.bytes >= self.min_bytes
    }

    pub fn reset(&mut self) {
        self.streams.clear();
        self.oldest_entry_time = None;
        self.bytes = 0;
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    #[must_use]
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    #[must_use]
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.streams.values().map(|s| s.entries.len()).sum()
    }

    /// Builds the push request for the current contents. Streams are ordered
    /// by label string so the encoding is deterministic.
    #[must_use]
    pub fn push_request(&self) -> PushRequest {
        let mut streams: Vec<StreamAdapter> = self.streams.values().cloned().collect();
        streams.sort_by(|a, b| a.labels.cmp(&b.labels));
        PushRequest { streams }
    }

    /// Serializes the batch as a snappy block-compressed protobuf
    /// `PushRequest`. The batch itself is left untouched.
    pub fn make_push_request(&self) -> Result<Vec<u8>, PushError> {
        let encoded = self.push_request().encode_to_vec();
        let compressed = snap::raw::Encoder::new().compress_vec(&encoded)?;
        Ok(compressed)
    }
}
