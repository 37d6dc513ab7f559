//! Logging setup and span helpers.
//!
//! `RUST_LOG` takes precedence over the configured level.

use crate::config::Config;
use crate::error::{Result, ShipmentError};
use crate::types::Actor;
use tracing::Span;

/// Install the global `tracing` subscriber.
///
/// # Errors
///
/// Fails if the level is not a valid filter directive or a global subscriber
/// has already been installed.
pub fn init_logging(config: &Config) -> Result<()> {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)
            .map_err(|e| ShipmentError::Config(format!("invalid log level: {e}")))?,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| ShipmentError::Config(format!("failed to init tracing subscriber: {e}")))
}

/// Span wrapping one service operation on a shipment.
pub fn operation_span(operation: &'static str, shipment_id: &str, actor: &Actor) -> Span {
    tracing::info_span!(
        "shipment.operation",
        "operation" = operation,
        "shipment.id" = %shipment_id,
        "actor.id" = actor.id,
        "actor.role" = %actor.role,
    )
}
