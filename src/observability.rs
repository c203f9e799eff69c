//! Logging initialization.
//!
//! The library itself only emits through the `tracing` facade; binaries and
//! integration tests that want output on stderr call [`init_logging`] once.

use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

static LOGGING_INIT: OnceLock<()> = OnceLock::new();

/// Installs a formatted `tracing` subscriber honoring `RUST_LOG`.
///
/// Idempotent; later calls (and an already-installed global subscriber) are
/// silently ignored.
pub fn init_logging() {
    LOGGING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("orgchart=info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_logging();
        init_logging();
    }
}
