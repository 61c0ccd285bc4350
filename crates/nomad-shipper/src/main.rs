// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info, warn};

use nomad_shipper::{logging, version, Pipeline, ShipperConfig, ShipperError};
use nomad_source::NomadClient;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match ShipperConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("nomad-shipper: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = logging::init(&config.log_level) {
        eprintln!("nomad-shipper: {e}");
        return ExitCode::FAILURE;
    }

    info!(
        version = version::display(),
        sink = %config.sink_addr,
        nomad = %config.nomad_addr,
        "Nomad shipper starting"
    );

    match run(config).await {
        Ok(()) => {
            info!("Nomad shipper stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Nomad shipper failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ShipperConfig) -> Result<(), ShipperError> {
    let client = NomadClient::connect(config.nomad_config()).await?;
    let pipeline = Pipeline::new(
        Arc::new(client),
        config.source_config(),
        config.sink_config(),
    );
    pipeline.run(shutdown_signal()).await
}

async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for SIGINT: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => info!("Received SIGINT"),
        () = terminate => info!("Received SIGTERM"),
    }
}
