// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Nomad API objects, limited to the fields the shipper reads.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer};

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationStatus {
    Pending,
    Running,
    Complete,
    Failed,
    Lost,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct JobSummary {
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TaskState {
    #[serde(rename = "State", default)]
    pub state: String,
}

impl TaskState {
    pub const RUNNING: &'static str = "running";

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == Self::RUNNING
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Allocation {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "JobID", default)]
    pub job_id: String,
    #[serde(rename = "Job", default)]
    pub job: Option<JobSummary>,
    #[serde(rename = "TaskGroup", default)]
    pub task_group: String,
    #[serde(rename = "ClientStatus", default)]
    pub client_status: AllocationStatus,
    #[serde(
        rename = "TaskStates",
        default,
        deserialize_with = "null_as_default::deserialize"
    )]
    pub task_states: BTreeMap<String, TaskState>,
}

impl Allocation {
    /// Job name, falling back to the job ID when the listing omits the job.
    #[must_use]
    pub fn job_name(&self) -> &str {
        self.job
            .as_ref()
            .and_then(|job| job.name.as_deref())
            .unwrap_or(&self.job_id)
    }

    /// Tasks whose state is `running`. Prestart and init tasks that have
    /// already finished report `dead` and are skipped.
    pub fn running_tasks(&self) -> impl Iterator<Item = &str> {
        self.task_states
            .iter()
            .filter(|(_, state)| state.is_running())
            .map(|(task, _)| task.as_str())
    }

    #[must_use]
    pub fn is_task_running(&self, task: &str) -> bool {
        self.task_states.get(task).is_some_and(TaskState::is_running)
    }
}

/// Identity of the local Nomad client node, read from `/v1/agent/self`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeIdentity {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AgentSelf {
    #[serde(default)]
    pub config: AgentConfig,
    #[serde(default)]
    pub stats: AgentStats,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AgentConfig {
    #[serde(rename = "NodeName", default)]
    pub node_name: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AgentStats {
    #[serde(default)]
    pub client: Option<AgentClientStats>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AgentClientStats {
    #[serde(default)]
    pub node_id: String,
}

/// One frame of a `/v1/client/fs/logs` stream. Heartbeats are empty objects.
#[derive(Debug, Default, Deserialize)]
pub struct StreamFrame {
    #[serde(rename = "Data", default)]
    pub data: Option<String>,
    #[serde(rename = "File", default)]
    pub file: Option<String>,
    #[serde(rename = "Offset", default)]
    pub offset: Option<i64>,
    #[serde(rename = "FileEvent", default)]
    pub file_event: Option<String>,
}

impl StreamFrame {
    #[must_use]
    pub fn is_heartbeat(&self) -> bool {
        self.data.as_deref().map_or(true, str::is_empty) && self.file_event.is_none()
    }
}

/// One object of a `/v1/event/stream` response. Heartbeats carry no events.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct EventBatch {
    #[serde(rename = "Index", default)]
    pub index: u64,
    #[serde(
        rename = "Events",
        default,
        deserialize_with = "null_as_default::deserialize"
    )]
    pub events: Vec<RawEvent>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawEvent {
    #[serde(rename = "Topic", default)]
    pub topic: String,
    #[serde(rename = "Type", default)]
    pub event_type: String,
    #[serde(rename = "Key", default)]
    pub key: String,
    #[serde(rename = "Payload", default)]
    pub payload: serde_json::Value,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogStreamKind {
    Stdout,
    Stderr,
}

impl LogStreamKind {
    pub const ALL: [LogStreamKind; 2] = [LogStreamKind::Stdout, LogStreamKind::Stderr];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LogStreamKind::Stdout => "stdout",
            LogStreamKind::Stderr => "stderr",
        }
    }
}

impl fmt::Display for LogStreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Nomad encodes empty maps and lists as `null`.
mod null_as_default {
    use super::{Deserialize, Deserializer};

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Default + Deserialize<'de>,
    {
        let opt = Option::<T>::deserialize(deserializer)?;
        Ok(opt.unwrap_or_default())
    }
}
