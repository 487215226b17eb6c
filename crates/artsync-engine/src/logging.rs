//! Logging bootstrap
//!
//! `RUST_LOG` wins over the configured filter. Installing twice is a no-op.

use crate::config::LogFormat;
use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber
///
/// Returns `false` if a subscriber was already installed.
pub fn init_logging(default_filter: &str, format: LogFormat) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init().is_ok(),
        LogFormat::Text => registry.with(fmt::layer().with_target(false)).try_init().is_ok(),
    }
}

/// Span wrapping one reconciliation pass
#[must_use]
pub fn pass_span(tenant: &str, pass_id: &str) -> Span {
    tracing::info_span!("reconcile", tenant = tenant, pass_id = pass_id)
}
