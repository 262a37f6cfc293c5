mod config;
mod roi_watch;
mod service;

use anyhow::Context;
use common::{TelemetryGuard, setup_logging};
use config::RelayConfig;
use service::RelayService;
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    flag,
};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

fn main() -> anyhow::Result<()> {
    let config = RelayConfig::from_env()?;

    // The OTLP exporters need a Tokio runtime that outlives the guard;
    // declared first so it is dropped last.
    let runtime = match config.otel_endpoint {
        Some(_) => Some(tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?),
        None => None,
    };
    let _telemetry = match (runtime.as_ref(), config.otel_endpoint.as_deref()) {
        (Some(rt), Some(endpoint)) => Some(
            rt.block_on(async { TelemetryGuard::init("relay", endpoint, config.environment) })?,
        ),
        _ => {
            setup_logging(config.environment)?;
            None
        }
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    flag::register(SIGTERM, Arc::clone(&shutdown))?;
    flag::register(SIGINT, Arc::clone(&shutdown))?;
    tracing::info!("Signal handlers registered (SIGTERM, SIGINT)");

    tracing::info!(
        environment = config.environment.as_str(),
        broker = %config.broker.address(),
        "Relay starting"
    );

    let mut service = RelayService::new(config)?;
    service.run(&shutdown)
}
