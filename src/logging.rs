//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Installs a fmt subscriber filtered by `filter`, falling back to
/// `RUST_LOG` and then `info`. Returns `false` if a global subscriber was
/// already installed.
pub fn init_tracing(filter: Option<&str>) -> bool {
    let env_filter = filter
        .and_then(|f| EnvFilter::try_new(f).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
