//! dnsperf domain layer: upstream addressing, error taxonomy, configuration
//! and the exchange measurement model.
pub mod codes;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod upstream;

pub use codes::{CertificateInvalidReason, QuicErrorCode, TlsAlert};
pub use config::{ProbeConfig, TlsPolicy, TlsVersion};
pub use errors::ProbeError;
pub use metrics::{Collector, Measurement, Phase, PhaseTiming, QlogEvent};
pub use upstream::{Scheme, UpstreamAddress, UpstreamUrl};
