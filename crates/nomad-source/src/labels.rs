// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use loki_push::LabelSet;

use crate::model::Allocation;

pub const JOB_ID: &str = "nomad_job_id";
pub const JOB_NAME: &str = "nomad_job_name";
pub const TASK_GROUP: &str = "nomad_task_group";
pub const ALLOC_ID: &str = "nomad_alloc_id";
pub const TASK_NAME: &str = "nomad_task_name";
pub const EVENT_TYPE: &str = "event_type";
pub const STREAM: &str = "stream";

/// Labels shared by everything shipped for an allocation.
#[must_use]
pub fn allocation_labels(alloc: &Allocation) -> LabelSet {
    [
        (JOB_ID, alloc.job_id.as_str()),
        (JOB_NAME, alloc.job_name()),
        (TASK_GROUP, alloc.task_group.as_str()),
        (ALLOC_ID, alloc.id.as_str()),
    ]
    .into_iter()
    .collect()
}

#[must_use]
pub fn task_labels(alloc: &Allocation, task: &str) -> LabelSet {
    let mut labels = allocation_labels(alloc);
    labels.insert(TASK_NAME, task);
    labels
}
