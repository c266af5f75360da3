use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use super::{LogFormat, TelemetryConfig};

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured level. JSON output
/// includes the current span and the span list so per-message fields
/// (topic, vehicle id) appear on every event.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<()> {
    let env_filter = build_env_filter(&config.log_level)?;

    let installed = match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_span_list(true)
                    .with_current_span(true),
            )
            .try_init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true))
            .try_init(),
    };
    installed.context("failed to install tracing subscriber")?;

    info!(
        service_name = %config.service_name,
        log_format = ?config.log_format,
        "telemetry initialized"
    );

    Ok(())
}

fn build_env_filter(log_level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level '{log_level}'")),
    }
}
