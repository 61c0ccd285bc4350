// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batching and delivery of labeled log lines to a Loki push endpoint.
//!
//! Producers send [`Entry`] values into the bounded channel returned by
//! [`SinkClient::new`]. The client groups them by label set into a
//! [`Batch`], and pushes the batch as a snappy-compressed protobuf
//! `PushRequest` whenever the readiness policy allows it.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod batch;
pub mod client;
pub mod constants;
pub mod entry;
pub mod error;
pub mod labels;
pub mod proto;

pub use batch::Batch;
pub use client::{SinkClient, SinkConfig};
pub use entry::Entry;
pub use error::PushError;
pub use labels::LabelSet;
