//! Tracing bootstrap for binaries embedding the lookup library.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::EnvFilter;

/// Global flag indicating whether tracing has been initialized
static TRACING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the global tracing subscriber.
///
/// `verbosity` maps to a default level (0 → warn, 1 → info, 2 → debug,
/// 3+ → trace); `RUST_LOG` overrides it. Logs go to stderr so secrets
/// printed on stdout stay machine-readable. Idempotent: later calls are
/// no-ops.
pub fn init_tracing(verbosity: u8) {
    if TRACING_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
