// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::SystemTime;

use crate::labels::LabelSet;

/// A single timestamped log line with its labels.
///
/// Entries are immutable once built; producers construct them and hand them
/// over the entry channel by value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    timestamp: SystemTime,
    line: String,
    labels: LabelSet,
}

impl Entry {
    #[must_use]
    pub fn new(timestamp: SystemTime, line: impl Into<String>, labels: LabelSet) -> Self {
        Self {
            timestamp,
            line: line.into(),
            labels,
        }
    }

    #[must_use]
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    #[must_use]
    pub fn line(&self) -> &str {
        &self.line
    }

    #[must_use]
    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }
}
