//! Sets up tracing for the autoscaler
//!
//! Simplified relative to the teacher's jaeger/otlp-capable setup: this crate
//! only ships the local stdout subscriber, since exporting traces to a
//! collector is an ambient deployment concern outside this spec's scope.

use tracing_subscriber::{prelude::*, EnvFilter};

/// Set up the global tracing subscriber
///
/// # Arguments
///
/// * `name` - The name of this service, attached to every emitted span
pub fn setup(name: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(filter);
    registry
        .try_init()
        .expect("Failed to register tracing subscriber");
    tracing::info!(service = name, "tracing initialized");
}
