use dnsperf_domain::config::{CliOverrides, ProbeConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn load_config(path: Option<&str>, overrides: CliOverrides) -> anyhow::Result<ProbeConfig> {
    Ok(ProbeConfig::load(path, overrides)?)
}

/// `RUST_LOG` wins over the configured level. Logs go to stderr so stdout
/// stays valid JSON.
pub fn init_logging(config: &ProbeConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
