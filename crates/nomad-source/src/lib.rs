// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Discovery and tailing of the Nomad allocations running on the local node.
//!
//! The [`Reconciler`] periodically lists the node's allocations through an
//! [`Orchestrator`] and keeps one runner set per running allocation:
//!
//! - a [`WorkloadRunner`] following the allocation's task events, and
//! - a [`TaskRunner`] per task following its stdout and stderr.
//!
//! Every runner turns what it reads into [`loki_push::Entry`] values and sends
//! them into one shared bounded channel, whose receiving half is handed out by
//! [`Reconciler::new`].

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod client;
pub mod constants;
pub mod error;
pub mod events;
pub mod frames;
pub mod labels;
pub mod model;
pub mod orchestrator;
pub mod reassembler;
pub mod reconciler;
pub mod task_runner;
pub mod workload_runner;

#[cfg(test)]
mod testing;

pub use client::{NomadClient, NomadConfig};
pub use error::{NomadError, SourceError};
pub use orchestrator::Orchestrator;
pub use reconciler::{ReconcileSummary, Reconciler, SourceConfig};
pub use task_runner::TaskRunner;
pub use workload_runner::WorkloadRunner;
