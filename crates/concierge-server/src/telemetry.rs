//! Logging bootstrap

use tracing_subscriber::EnvFilter;

/// Install the global subscriber
///
/// `RUST_LOG` wins over `default_filter`.
///
/// # Errors
/// When a global subscriber is already installed
pub fn init_tracing(json: bool, default_filter: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|err| anyhow::anyhow!("tracing already initialised: {err}"))
}
