//! Tracing/logging bootstrap.
//!
//! This is the ambient logging stack an embedding binary calls once at
//! startup; the crate's components only ever emit `tracing` events and take
//! no dependency on how those events are consumed. Trimmed of the teacher's
//! OpenTelemetry/OTLP exporter wiring — no metrics backend is in scope here.

use tracing_subscriber::EnvFilter;

use crate::{config::Config, error::Result};

/// Initialize the global `tracing` subscriber: JSON-formatted events,
/// level controlled by `RUST_LOG` (falling back to `info`).
pub fn init_tracing(_config: &Config) -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();

    tracing::info!("tracing initialized");

    Ok(())
}
