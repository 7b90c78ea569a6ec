use super::measurement::Measurement;
use super::phase::{Phase, PhaseTiming};
use super::qlog::QlogEvent;
use crate::codes::{CertificateInvalidReason, QuicErrorCode};
use std::time::Instant;

/// Per-exchange bag of phase timestamps and classified facts.
///
/// One collector belongs to exactly one exchange attempt. Recorders may be
/// called more than once; the last write wins.
#[derive(Debug, Clone)]
pub struct Collector {
    origin: Instant,

    exchange: PhaseTiming,
    udp_socket_setup: PhaseTiming,
    tcp_handshake: PhaseTiming,
    tls_handshake: PhaseTiming,
    quic_handshake: PhaseTiming,
    query: PhaseTiming,

    tls_version: Option<u16>,
    tls_error: Option<CertificateInvalidReason>,

    quic_version: Option<u32>,
    quic_negotiated_protocol: Option<String>,
    quic_error: Option<QuicErrorCode>,
    quic_used_0rtt: bool,

    http_version: Option<String>,

    qlog: Vec<QlogEvent>,
}

impl Default for Collector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            exchange: PhaseTiming::default(),
            udp_socket_setup: PhaseTiming::default(),
            tcp_handshake: PhaseTiming::default(),
            tls_handshake: PhaseTiming::default(),
            quic_handshake: PhaseTiming::default(),
            query: PhaseTiming::default(),
            tls_version: None,
            tls_error: None,
            quic_version: None,
            quic_negotiated_protocol: None,
            quic_error: None,
            quic_used_0rtt: false,
            http_version: None,
            qlog: Vec::new(),
        }
    }

    fn timing_mut(&mut self, phase: Phase) -> &mut PhaseTiming {
        match phase {
            Phase::Exchange => &mut self.exchange,
            Phase::UdpSocketSetup => &mut self.udp_socket_setup,
            Phase::TcpHandshake => &mut self.tcp_handshake,
            Phase::TlsHandshake => &mut self.tls_handshake,
            Phase::QuicHandshake => &mut self.quic_handshake,
            Phase::Query => &mut self.query,
        }
    }

    pub fn timing(&self, phase: Phase) -> &PhaseTiming {
        match phase {
            Phase::Exchange => &self.exchange,
            Phase::UdpSocketSetup => &self.udp_socket_setup,
            Phase::TcpHandshake => &self.tcp_handshake,
            Phase::TlsHandshake => &self.tls_handshake,
            Phase::QuicHandshake => &self.quic_handshake,
            Phase::Query => &self.query,
        }
    }

    pub fn start(&mut self, phase: Phase) {
        self.timing_mut(phase).start();
    }

    pub fn finish(&mut self, phase: Phase) {
        self.timing_mut(phase).finish();
    }

    pub fn exchange_started(&mut self) {
        self.start(Phase::Exchange);
    }

    pub fn exchange_finished(&mut self) {
        self.finish(Phase::Exchange);
    }

    pub fn query_send(&mut self) {
        self.start(Phase::Query);
    }

    pub fn query_receive(&mut self) {
        self.finish(Phase::Query);
    }

    pub fn tls_handshake_finished(&mut self, version: Option<u16>) {
        self.finish(Phase::TlsHandshake);
        if let Some(version) = version {
            self.tls_version = Some(version);
        }
    }

    pub fn tls_error(&mut self, reason: CertificateInvalidReason) {
        self.tls_error = Some(reason);
    }

    pub fn quic_handshake_done(
        &mut self,
        quic_version: u32,
        tls_version: u16,
        negotiated_protocol: Option<String>,
    ) {
        self.quic_handshake_done_at(Instant::now(), quic_version, tls_version, negotiated_protocol);
    }

    /// Same as [`Collector::quic_handshake_done`] for a handshake that
    /// completed at `done_at` while early data was already in flight.
    pub fn quic_handshake_done_at(
        &mut self,
        done_at: Instant,
        quic_version: u32,
        tls_version: u16,
        negotiated_protocol: Option<String>,
    ) {
        self.quic_handshake.finish_at(done_at);
        self.quic_version = Some(quic_version);
        self.tls_version = Some(tls_version);
        self.quic_negotiated_protocol = negotiated_protocol;
    }

    pub fn quic_error(&mut self, code: QuicErrorCode) {
        self.quic_error = Some(code);
    }

    pub fn quic_used_0rtt(&mut self, used: bool) {
        self.quic_used_0rtt = used;
    }

    pub fn http_version(&mut self, version: impl Into<String>) {
        self.http_version = Some(version.into());
    }

    /// Appends a trace record stamped relative to the collector's creation.
    pub fn qlog(&mut self, name: impl Into<String>, data: serde_json::Value) {
        let time = self.origin.elapsed().as_secs_f64() * 1000.0;
        self.qlog.push(QlogEvent {
            time,
            name: name.into(),
            data,
        });
    }

    pub fn tls_version(&self) -> Option<u16> {
        self.tls_version
    }

    pub fn tls_error_reason(&self) -> Option<CertificateInvalidReason> {
        self.tls_error
    }

    pub fn quic_version(&self) -> Option<u32> {
        self.quic_version
    }

    pub fn quic_negotiated_protocol(&self) -> Option<&str> {
        self.quic_negotiated_protocol.as_deref()
    }

    pub fn quic_error_code(&self) -> Option<QuicErrorCode> {
        self.quic_error
    }

    pub fn used_0rtt(&self) -> bool {
        self.quic_used_0rtt
    }

    pub fn negotiated_http_version(&self) -> Option<&str> {
        self.http_version.as_deref()
    }

    pub fn qlog_events(&self) -> &[QlogEvent] {
        &self.qlog
    }

    pub fn measurement(&self) -> Measurement {
        Measurement::from_collector(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fresh_collector_has_no_completed_phase() {
        let collector = Collector::new();
        for phase in [
            Phase::Exchange,
            Phase::UdpSocketSetup,
            Phase::TcpHandshake,
            Phase::TlsHandshake,
            Phase::QuicHandshake,
            Phase::Query,
        ] {
            assert!(!collector.timing(phase).is_complete(), "{:?}", phase);
        }
        assert!(!collector.used_0rtt());
    }

    #[test]
    fn test_late_quic_handshake_uses_observed_instant() {
        let mut collector = Collector::new();
        collector.start(Phase::QuicHandshake);
        let started = collector.timing(Phase::QuicHandshake).started_at().unwrap();
        let done_at = started + std::time::Duration::from_millis(40);

        collector.quic_handshake_done_at(done_at, 1, 0x0304, Some("doq".to_string()));

        assert_eq!(
            collector.timing(Phase::QuicHandshake).duration(),
            Some(std::time::Duration::from_millis(40))
        );
        assert_eq!(collector.quic_negotiated_protocol(), Some("doq"));
    }

    #[test]
    fn test_tls_failure_keeps_previous_version() {
        let mut collector = Collector::new();
        collector.start(Phase::TlsHandshake);
        collector.tls_handshake_finished(Some(0x0304));
        collector.start(Phase::TlsHandshake);
        collector.tls_handshake_finished(None);
        assert_eq!(collector.tls_version(), Some(0x0304));
    }

    #[test]
    fn test_qlog_events_are_ordered() {
        let mut collector = Collector::new();
        collector.qlog("transport:connection_started", json!({ "peer": "127.0.0.1:784" }));
        collector.qlog("transport:connection_closed", json!({}));
        let events = collector.qlog_events();
        assert_eq!(events.len(), 2);
        assert!(events[0].time <= events[1].time);
        assert_eq!(events[1].name, "transport:connection_closed");
    }
}
