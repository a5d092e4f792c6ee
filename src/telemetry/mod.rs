use tracing_subscriber::EnvFilter;

/// Initializes the tracing subscriber for the ringkv binaries. The level is
/// taken from `RUST_LOG` when set and defaults to `info`.
pub fn init_tracing() {
    let level_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(level_filter).init();
}
