use tracing_subscriber::EnvFilter;

use crate::settings::Settings;

/// Default filter for a deployment: chatty for local and dev environments, `info` elsewhere.
pub fn default_directive(settings: &Settings) -> &'static str {
    match settings.server.env_name.to_ascii_lowercase().as_str() {
        "local" | "dev" | "development" | "test" => "ragconf=debug,info",
        _ => "info",
    }
}

/// Install a global fmt subscriber. `RUST_LOG` wins over `default_directive` when set.
pub fn init(default_directive: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install the tracing subscriber: {}", e))
}
