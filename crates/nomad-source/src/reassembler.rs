// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Reassembly of log lines from arbitrarily split byte chunks.
//!
//! Nomad delivers task output in chunks whose boundaries have nothing to do
//! with line boundaries. [`LineReassembler`] splits each chunk on `\n`, joins
//! the leftover of the previous chunk to the first segment, and keeps the
//! unterminated tail for the next chunk.
//!
//! Timestamps follow the arrival of a line's first byte: a line completed
//! from a buffered partial carries the time the partial was first seen, every
//! other line carries the arrival time of its chunk.
//!
//! Splitting happens on raw bytes and decoding only once a line is complete,
//! so a multibyte character split across two chunks is decoded intact.

use std::time::SystemTime;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Line {
    pub timestamp: SystemTime,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct LineReassembler {
    partial: Vec<u8>,
    first_seen: Option<SystemTime>,
}

impl LineReassembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk received at `arrival` and returns the lines it
    /// completed, in order.
    pub fn push(&mut self, chunk: &[u8], arrival: SystemTime) -> Vec<Line> {
        let had_partial = !self.partial.is_empty();
        let mut lines = Vec::new();

        let mut segments = chunk.split(|b| *b == b'\n').peekable();
        let mut tail: &[u8] = &[];
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                tail = segment;
                break;
            }
            let (mut bytes, timestamp) = if lines.is_empty() && had_partial {
                (
                    std::mem::take(&mut self.partial),
                    self.first_seen.unwrap_or(arrival),
                )
            } else {
                (Vec::new(), arrival)
            };
            bytes.extend_from_slice(segment);
            lines.push(Line {
                timestamp,
                text: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        self.partial.extend_from_slice(tail);
        if self.partial.is_empty() {
            self.first_seen = None;
        } else if !lines.is_empty() || !had_partial {
            self.first_seen = Some(arrival);
        }

        lines
    }

    /// Drains the buffered partial line, if any. Used when a stream ends
    /// without a final line feed.
    pub fn finish(&mut self) -> Option<Line> {
        if self.partial.is_empty() {
            return None;
        }
        let bytes = std::mem::take(&mut self.partial);
        let timestamp = self.first_seen.take().unwrap_or_else(SystemTime::now);
        Some(Line {
            timestamp,
            text: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    #[must_use]
    pub fn has_partial(&self) -> bool {
        !self.partial.is_empty()
    }
}
