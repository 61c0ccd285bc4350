// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Embeds the shipper version at build time.
//!
//! Release pipelines set `NOMAD_SHIPPER_VERSION` (a tag such as `1.4.2` or a
//! commit hash). Local builds fall back to the crate version.

use std::env;

fn main() {
    let version = env::var("NOMAD_SHIPPER_VERSION")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| env::var("CARGO_PKG_VERSION").ok())
        .unwrap_or_else(|| "dev".to_string());

    println!("cargo:rustc-env=SHIPPER_VERSION={}", version.trim());
    println!("cargo:rerun-if-env-changed=NOMAD_SHIPPER_VERSION");
}
