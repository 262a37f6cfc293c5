use crate::config::Environment;
use anyhow::{Context, Result};
use tracing_subscriber::layer::{Layer, Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Base of every subscriber this crate installs
pub(crate) type FilteredRegistry = Layered<EnvFilter, Registry>;

/// Install the global subscriber: pretty output in development, JSON in
/// production, filtered by `RUST_LOG` (default `info`).
///
/// The OpenTelemetry layer exports spans only once a tracer provider is
/// installed, see [`crate::telemetry::TelemetryGuard`].
pub fn setup_logging(environment: Environment) -> Result<()> {
    install(environment, tracing_opentelemetry::layer())
}

pub(crate) fn install<L>(environment: Environment, otel_layer: L) -> Result<()>
where
    L: Layer<FilteredRegistry> + Send + Sync + 'static,
{
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer);

    // Background loops run on named threads; keep the name on every line
    match environment {
        Environment::Production => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_level(true)
                    .with_thread_names(true),
            )
            .try_init(),
        Environment::Development => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_ansi(true)
                    .with_thread_names(true),
            )
            .try_init(),
    }
    .context("A global tracing subscriber is already installed")
}
