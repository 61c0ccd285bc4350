// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Common test utilities for pipeline tests

pub mod fake_orchestrator;
pub mod mock_server;
