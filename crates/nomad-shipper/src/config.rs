// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;

use loki_push::SinkConfig;
use nomad_source::constants::DEFAULT_NOMAD_ADDR;
use nomad_source::{NomadConfig, SourceConfig};

use crate::error::ShipperError;
use crate::version;

/// Configuration of the shipper, read from the environment
#[derive(Debug, Clone)]
pub struct ShipperConfig {
    /// Loki push URL (NOMAD_SHIPPER_SINK_ADDR, or PROMTAIL_ADDR)
    pub sink_addr: String,
    /// Address of the local Nomad agent (NOMAD_ADDR)
    pub nomad_addr: String,
    /// ACL token sent as X-Nomad-Token (NOMAD_TOKEN)
    pub nomad_token: Option<String>,
    pub nomad_region: Option<String>,
    pub nomad_namespace: Option<String>,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            sink_addr: String::new(),
            nomad_addr: DEFAULT_NOMAD_ADDR.to_string(),
            nomad_token: None,
            nomad_region: None,
            nomad_namespace: None,
            log_level: "info".to_string(),
        }
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl ShipperConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ShipperError> {
        let sink_addr = non_empty("NOMAD_SHIPPER_SINK_ADDR")
            .or_else(|| non_empty("PROMTAIL_ADDR"))
            .unwrap_or_default();
        let nomad_addr =
            non_empty("NOMAD_ADDR").unwrap_or_else(|| DEFAULT_NOMAD_ADDR.to_string());
        let log_level = non_empty("NOMAD_SHIPPER_LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or_else(|| "info".to_string());

        let config = Self {
            sink_addr,
            nomad_addr,
            nomad_token: non_empty("NOMAD_TOKEN"),
            nomad_region: non_empty("NOMAD_REGION"),
            nomad_namespace: non_empty("NOMAD_NAMESPACE"),
            log_level,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ShipperError> {
        if self.sink_addr.trim().is_empty() {
            return Err(ShipperError::InvalidConfig(
                "NOMAD_SHIPPER_SINK_ADDR (or PROMTAIL_ADDR) must be set".to_string(),
            ));
        }
        for (name, value) in [
            ("sink address", &self.sink_addr),
            ("NOMAD_ADDR", &self.nomad_addr),
        ] {
            let valid = value.starts_with("http://") || value.starts_with("https://");
            if !valid {
                return Err(ShipperError::InvalidConfig(format!(
                    "{name} '{value}' must be an http(s) URL"
                )));
            }
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(ShipperError::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }

    #[must_use]
    pub fn nomad_config(&self) -> NomadConfig {
        NomadConfig {
            address: self.nomad_addr.clone(),
            token: self.nomad_token.clone(),
            region: self.nomad_region.clone(),
            namespace: self.nomad_namespace.clone(),
            ..NomadConfig::default()
        }
    }

    #[must_use]
    pub fn sink_config(&self) -> SinkConfig {
        let mut sink = SinkConfig::new(self.sink_addr.clone());
        sink.user_agent = version::user_agent();
        sink
    }

    #[must_use]
    pub fn source_config(&self) -> SourceConfig {
        SourceConfig::default()
    }
}
