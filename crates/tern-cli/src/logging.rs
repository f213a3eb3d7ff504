use tracing_subscriber::EnvFilter;

/// Initialize tracing from `RUST_LOG`, defaulting to `info`.
///
/// Logs go to stderr so that stdout stays clean for tables and CSV.
pub fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}
