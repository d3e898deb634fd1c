// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Labelwerk — thermal label printer fleet daemon
//
// Entry point. Initialises logging, loads the configuration, starts the
// fleet's background tasks, and shuts them down cleanly on Ctrl-C.

mod services;

use std::process::ExitCode;
use std::sync::Arc;

use labelwerk_core::error::Result;
use labelwerk_core::human_errors::humanize_error;
use labelwerk_print::{Fleet, Renderer, StaticRenderer};

use services::config_file;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Labelwerk starting");

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let human = humanize_error(&e);
            tracing::error!(error = %e, suggestion = %human.suggestion, "{}", human.message);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let config = config_file::load(&config_file::config_path())?;

    let renderer = StaticRenderer::new(config.templates);
    if renderer.is_empty() {
        tracing::warn!("no label templates configured; every submission will be rejected");
    }
    let renderer: Arc<dyn Renderer> = Arc::new(renderer);

    let fleet = Fleet::from_config(config.fleet, renderer)?;
    fleet.start();
    for printer in fleet.list_printers() {
        tracing::info!(printer = %printer.name, dialect = %printer.dialect, "printer managed");
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    fleet.shutdown().await;
    Ok(())
}
