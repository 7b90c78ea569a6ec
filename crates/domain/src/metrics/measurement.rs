use super::collector::Collector;
use super::phase::Phase;
use super::qlog::QlogEvent;
use crate::codes::{CertificateInvalidReason, QuicErrorCode};
use serde::Serialize;
use std::time::Duration;

/// Durations and classified facts derived from a [`Collector`].
///
/// A duration is `None` (and omitted from JSON) when its phase never
/// completed; it is never reported as zero in that case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    #[serde(skip_serializing_if = "Option::is_none", with = "nanos")]
    pub udp_socket_setup_duration: Option<Duration>,

    #[serde(skip_serializing_if = "Option::is_none", with = "nanos")]
    pub tcp_handshake_duration: Option<Duration>,

    #[serde(skip_serializing_if = "Option::is_none", with = "nanos")]
    pub tls_handshake_duration: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_version: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_error: Option<CertificateInvalidReason>,

    #[serde(skip_serializing_if = "Option::is_none", with = "nanos")]
    pub quic_handshake_duration: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quic_version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quic_negotiated_protocol: Option<String>,
    pub quic_used_0rtt: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quic_error: Option<QuicErrorCode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub qlog_messages: Vec<QlogEvent>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", with = "nanos")]
    pub query_time: Option<Duration>,

    #[serde(skip_serializing_if = "Option::is_none", with = "nanos")]
    pub total_time: Option<Duration>,
}

impl Measurement {
    pub fn from_collector(collector: &Collector) -> Self {
        Self {
            udp_socket_setup_duration: collector.timing(Phase::UdpSocketSetup).duration(),
            tcp_handshake_duration: collector.timing(Phase::TcpHandshake).duration(),
            tls_handshake_duration: collector.timing(Phase::TlsHandshake).duration(),
            tls_version: collector.tls_version(),
            tls_error: collector.tls_error_reason(),
            quic_handshake_duration: collector.timing(Phase::QuicHandshake).duration(),
            quic_version: collector.quic_version(),
            quic_negotiated_protocol: collector.quic_negotiated_protocol().map(str::to_string),
            quic_used_0rtt: collector.used_0rtt(),
            quic_error: collector.quic_error_code(),
            qlog_messages: collector.qlog_events().to_vec(),
            http_version: collector.negotiated_http_version().map(str::to_string),
            query_time: collector.timing(Phase::Query).duration(),
            total_time: collector.timing(Phase::Exchange).duration(),
        }
    }
}

impl From<&Collector> for Measurement {
    fn from(collector: &Collector) -> Self {
        Self::from_collector(collector)
    }
}

/// Durations as integer nanoseconds.
mod nanos {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => {
                serializer.serialize_u64(u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX))
            }
            None => serializer.serialize_none(),
        }
    }
}
