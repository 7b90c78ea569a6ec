pub mod errors;
pub mod logging;
pub mod probe;
pub mod quic;
pub mod tls;

pub use errors::ConfigError;
pub use logging::LoggingConfig;
pub use probe::{CliOverrides, ProbeConfig, DEFAULT_CONFIG_FILE};
pub use quic::{QuicConfig, DOQ_VERSION_FINAL, DOQ_VERSION_I00, DOQ_VERSION_I01, DOQ_VERSION_I02};
pub use tls::{TlsPolicy, TlsVersion};
