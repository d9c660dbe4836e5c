// Third Party
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber for the binary. The default filter shows
/// this crate's events at `level`; `RUST_LOG` overrides it.
pub fn init_tracing(service_name: &str, level: tracing::Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{}={}", service_name, level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
