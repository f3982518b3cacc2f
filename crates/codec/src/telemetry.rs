//! Logging setup for the `session-codec` tool.
//!
//! Structured JSON logs go to stderr so that stdout carries only command
//! output (decoded sessions, encoded blobs).
//!
//! # Telemetry invariants
//!
//! - **No key material, tokens or plaintext** in any log field. Pipeline
//!   events record sizes and flags only.
//! - Log level comes from `LOG_LEVEL` (default: `warn`); `RUST_LOG` wins.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Initialise the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if a global subscriber has already been set.
pub fn init(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialise tracing subscriber: {e}"))
}
