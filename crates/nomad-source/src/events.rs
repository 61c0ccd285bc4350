// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Flattening of allocation event payloads into individual task events.
//!
//! An allocation event carries the whole allocation, including every task's
//! event history under `Allocation.TaskStates.<task>.Events`. The payload is
//! decoded into typed structs at the boundary. Each leaf event is decoded on
//! its own so that one malformed event only rejects itself.

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer};
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct AllocationPayload {
    #[serde(rename = "Allocation")]
    allocation: AllocationState,
}

#[derive(Debug, Deserialize)]
struct AllocationState {
    #[serde(rename = "TaskStates", default)]
    task_states: Option<BTreeMap<String, TaskEvents>>,
}

#[derive(Debug, Deserialize)]
struct TaskEvents {
    #[serde(rename = "Events", default)]
    events: Option<Vec<Value>>,
}

/// A single task lifecycle event.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TaskEvent {
    #[serde(rename = "Type")]
    pub event_type: String,
    /// Nanoseconds since the Unix epoch.
    #[serde(rename = "Time", deserialize_with = "nanos")]
    pub time_ns: i64,
    #[serde(rename = "DisplayMessage")]
    pub display_message: String,
}

impl TaskEvent {
    #[must_use]
    pub fn timestamp(&self) -> SystemTime {
        let offset = Duration::from_nanos(self.time_ns.unsigned_abs());
        let ts = if self.time_ns >= 0 {
            UNIX_EPOCH.checked_add(offset)
        } else {
            UNIX_EPOCH.checked_sub(offset)
        };
        ts.unwrap_or(UNIX_EPOCH)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlattenedEvent {
    pub task: String,
    pub timestamp: SystemTime,
    pub event: TaskEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RejectedEvent {
    pub task: String,
    pub reason: String,
    pub raw: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Flattened {
    /// Accepted events, ordered by task name then by position in the task's
    /// history.
    pub events: Vec<FlattenedEvent>,
    pub rejected: Vec<RejectedEvent>,
    /// Number of events dropped for being older than the age limit.
    pub stale: usize,
}

/// Extracts the task events of one allocation event payload.
///
/// Returns `Ok(None)` when the allocation has no task states yet, and an
/// error when the payload is not an allocation at all. Events older than
/// `now - max_age` are counted in [`Flattened::stale`] and dropped.
pub fn flatten(
    payload: &Value,
    now: SystemTime,
    max_age: Duration,
) -> Result<Option<Flattened>, serde_json::Error> {
    let payload = AllocationPayload::deserialize(payload)?;
    let Some(task_states) = payload.allocation.task_states else {
        return Ok(None);
    };
    let min_time = now.checked_sub(max_age).unwrap_or(UNIX_EPOCH);

    let mut flattened = Flattened::default();
    for (task, state) in task_states {
        for raw in state.events.unwrap_or_default() {
            match TaskEvent::deserialize(&raw) {
                Ok(event) => {
                    let timestamp = event.timestamp();
                    if timestamp < min_time {
                        flattened.stale += 1;
                        continue;
                    }
                    flattened.events.push(FlattenedEvent {
                        task: task.clone(),
                        timestamp,
                        event,
                    });
                }
                Err(e) => flattened.rejected.push(RejectedEvent {
                    task: task.clone(),
                    reason: e.to_string(),
                    raw: raw.to_string(),
                }),
            }
        }
    }
    Ok(Some(flattened))
}

// Nomad writes `Time` as an integer; tolerate a float rendering too.
fn nanos<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = serde_json::Number::deserialize(deserializer)?;
    if let Some(n) = number.as_i64() {
        return Ok(n);
    }
    number
        .as_f64()
        .filter(|f| f.is_finite())
        .map(|f| f as i64)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp {number}")))
}
