//! Tracing setup for binaries embedding the engine.
//!
//! The db and storage layers emit through the `log` facade; everything else
//! uses `tracing`. `init` installs a fmt subscriber filtered by `RUST_LOG`
//! and bridges `log` records into it.

use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global subscriber. Safe to call more than once; later
/// calls are no-ops.
pub fn init() {
    let _ = tracing_log::LogTracer::init();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
        tracing::info!("logging initialized");
        log::info!("log bridge works");
    }
}
