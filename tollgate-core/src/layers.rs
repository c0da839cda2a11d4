use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,tollgate=debug";

/// Initialise the global `tracing` subscriber with a standard `fmt` layer.
///
/// Respects the `RUST_LOG` environment variable. Falls back to
/// `info,tollgate=debug` when `RUST_LOG` is not set.
///
/// Call this once, at the very start of `main`, before any tracing macro.
/// Calling it again is harmless: the second installation is ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
