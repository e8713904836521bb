use tracing_subscriber::EnvFilter;

/// Installs a `tracing` subscriber reading its filter from `RUST_LOG`,
/// defaulting to `info` when unset. Call once at process startup; calling
/// it twice is harmless; the second call is simply ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
