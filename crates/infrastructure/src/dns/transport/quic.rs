//! DNS over QUIC (RFC 9250 and the doq-i00..i02 drafts).
//!
//! Every exchange runs on a fresh endpoint and connection that are closed
//! afterwards. The query goes out with ID 0 on its own bidirectional stream,
//! FIN marks the end of the request, and the reply ID is put back to the
//! caller's value before decoding. Final `doq` frames messages with a
//! two-byte length prefix; the drafts rely on stream boundaries alone.

use super::buffer_pool::{BufferPool, PooledBuffer};
use super::core::TransportCore;
use super::DnsClient;
use crate::dns::classify;
use crate::dns::codec;
use crate::dns::exchange::ExchangeResult;
use async_trait::async_trait;
use dnsperf_domain::config::DOQ_VERSION_FINAL;
use dnsperf_domain::{Collector, Phase, ProbeError, QuicErrorCode};
use hickory_proto::op::Message;
use quinn::crypto::rustls::{HandshakeData, QuicClientConfig};
use quinn::{Connection, Endpoint, VarInt};
use serde_json::json;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

pub const QUIC_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);
pub const QUIC_VERSION_1: u32 = 0x0000_0001;

/// DOQ_NO_ERROR
const CLOSE_NO_ERROR: u32 = 0x0;
/// DOQ_PROTOCOL_ERROR
const CLOSE_PROTOCOL_ERROR: u32 = 0x2;

const TLS13: u16 = 0x0304;

/// Room for a full DNS message plus the RFC 9250 length prefix.
pub const QUIC_BUFFER_SIZE: usize = codec::MAX_MESSAGE_SIZE + 2;

/// Resolves when a 0-RTT handshake completes: whether early data was
/// accepted and when the handshake finished.
type EarlyHandshake = JoinHandle<(bool, Instant)>;

pub struct QuicClient {
    core: TransportCore,
    quic_config: quinn::ClientConfig,
    buffers: Arc<BufferPool>,
    /// ALPN of the last completed handshake. Early data is only sent on a
    /// resumed session, which keeps the protocol it was issued for.
    last_protocol: Mutex<Option<String>>,
}

/// Stream-level failure; 0-RTT rejection is retried once over 1-RTT.
enum StreamFailure {
    ZeroRttRejected,
    Failed(ProbeError),
}

impl From<ProbeError> for StreamFailure {
    fn from(error: ProbeError) -> Self {
        StreamFailure::Failed(error)
    }
}

impl QuicClient {
    pub fn new(core: TransportCore) -> Result<Self, ProbeError> {
        Self::with_buffer_pool(core, Arc::new(BufferPool::new(QUIC_BUFFER_SIZE, 16)))
    }

    pub fn with_buffer_pool(
        core: TransportCore,
        buffers: Arc<BufferPool>,
    ) -> Result<Self, ProbeError> {
        let crypto = QuicClientConfig::try_from(core.tls_config().clone())
            .map_err(|e| ProbeError::TlsConfig(format!("TLS config unusable for QUIC: {}", e)))?;

        let mut quic_config = quinn::ClientConfig::new(Arc::new(crypto));
        quic_config.version(QUIC_VERSION_1);
        if let Some(store) = &core.options().quic.token_store {
            quic_config.token_store(store.clone());
        }

        Ok(Self {
            core,
            quic_config,
            buffers,
            last_protocol: Mutex::new(None),
        })
    }

    pub fn core(&self) -> &TransportCore {
        &self.core
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.buffers
    }

    async fn run(
        &self,
        query: &Message,
        collector: &mut Collector,
        buffer: &mut PooledBuffer<'_>,
    ) -> Result<(Message, Option<ProbeError>), ProbeError> {
        // Only used to find a reachable address; the socket is dropped.
        let probe = self.core.dial_udp(None).await?;
        let target = probe.peer;
        drop(probe.conn);

        collector.exchange_started();

        let endpoint = self.endpoint(target)?;
        let outcome = self
            .session(&endpoint, target, query, collector, buffer)
            .await;
        endpoint.close(VarInt::from_u32(CLOSE_NO_ERROR), b"");
        outcome
    }

    fn endpoint(&self, target: SocketAddr) -> Result<Endpoint, ProbeError> {
        let port = self.core.options().quic.local_port.unwrap_or(0);
        let bind: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, port).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, port).into()
        };
        Endpoint::client(bind)
            .map_err(|e| ProbeError::Io(format!("Failed to bind QUIC endpoint on {}: {}", bind, e)))
    }

    async fn session(
        &self,
        endpoint: &Endpoint,
        target: SocketAddr,
        query: &Message,
        collector: &mut Collector,
        buffer: &mut PooledBuffer<'_>,
    ) -> Result<(Message, Option<ProbeError>), ProbeError> {
        let (connection, early) = self.connect(endpoint, target, collector).await?;

        let mut wire = codec::pack(query)?;
        let original_id = codec::wire_id(&wire).unwrap_or(0);

        if codec::has_tcp_keepalive(&wire) {
            connection.close(
                VarInt::from_u32(CLOSE_PROTOCOL_ERROR),
                b"edns-tcp-keepalive not allowed",
            );
            collector.qlog(
                "connectivity:connection_closed",
                json!({ "owner": "local", "application_code": CLOSE_PROTOCOL_ERROR }),
            );
            return Err(ProbeError::QuicProtocolViolation(
                "query carries the EDNS(0) TCP keepalive option".to_string(),
            ));
        }
        codec::set_wire_id(&mut wire, 0);

        let mut framed = self.uses_length_prefix(&connection);
        let mut outcome = self
            .query_stream(&connection, &wire, framed, target, collector, buffer)
            .await;
        if matches!(outcome, Err(StreamFailure::ZeroRttRejected)) {
            debug!(server = %target, "0-RTT rejected, resending over 1-RTT");
            collector.qlog(
                "connectivity:connection_state_updated",
                json!({ "new": "early_data_rejected" }),
            );
            framed = self.uses_length_prefix(&connection);
            outcome = self
                .query_stream(&connection, &wire, framed, target, collector, buffer)
                .await;
        }

        let used_0rtt = match early {
            Some(handshake) => self.settle_early_handshake(&connection, handshake, collector).await,
            None => false,
        };
        collector.quic_used_0rtt(used_0rtt);

        if let Err(StreamFailure::Failed(ProbeError::Quic {
            code: Some(code), ..
        })) = &outcome
        {
            collector.quic_error(QuicErrorCode(*code));
        }

        self.close(&connection, collector);

        let reply_len = match outcome {
            Ok(len) => len,
            Err(StreamFailure::Failed(e)) => return Err(e),
            Err(StreamFailure::ZeroRttRejected) => {
                return Err(ProbeError::Quic {
                    message: "0-RTT data rejected twice".to_string(),
                    code: None,
                })
            }
        };

        let reply = unframe(&mut buffer[..reply_len], framed)?;
        codec::set_wire_id(reply, original_id);
        let response = codec::unpack(reply)?;
        Ok((response, None))
    }

    async fn connect(
        &self,
        endpoint: &Endpoint,
        target: SocketAddr,
        collector: &mut Collector,
    ) -> Result<(Connection, Option<EarlyHandshake>), ProbeError> {
        let connecting = endpoint
            .connect_with(self.quic_config.clone(), target, self.core.address().host())
            .map_err(|e| ProbeError::Quic {
                message: format!("Failed to initiate QUIC connection to {}: {}", target, e),
                code: None,
            })?;

        collector.qlog(
            "connectivity:connection_started",
            json!({
                "dst": target.to_string(),
                "src": endpoint.local_addr().map(|a| a.to_string()).ok(),
                "version": format!("{:#010x}", QUIC_VERSION_1),
                "alpn": self.core.options().quic.allowed_versions,
            }),
        );
        collector.start(Phase::QuicHandshake);

        let connection = match connecting.into_0rtt() {
            Ok((connection, accepted)) => {
                let handshake = tokio::spawn(async move {
                    let accepted = accepted.await;
                    (accepted, Instant::now())
                });
                collector.qlog(
                    "connectivity:connection_state_updated",
                    json!({ "new": "early_data" }),
                );
                debug!(server = %target, "QUIC connection started with 0-RTT");
                return Ok((connection, Some(handshake)));
            }
            Err(connecting) => {
                let connection = tokio::time::timeout(QUIC_HANDSHAKE_TIMEOUT, connecting)
                    .await
                    .map_err(|_| ProbeError::timeout("QUIC handshake", target))?
                    .map_err(|e| {
                        if let Some(code) = classify::quic_error_code(&e) {
                            collector.quic_error(code);
                        }
                        collector.qlog(
                            "connectivity:connection_closed",
                            json!({ "owner": "remote", "error": e.to_string() }),
                        );
                        classify::quic_error(&e)
                    })?;
                connection
            }
        };

        self.handshake_complete(&connection, Instant::now(), false, collector);
        debug!(server = %target, "QUIC connection established");
        Ok((connection, None))
    }

    /// Waits for a 0-RTT handshake to finish and records it at the instant
    /// it completed. Returns whether the early data was accepted.
    async fn settle_early_handshake(
        &self,
        connection: &Connection,
        handshake: EarlyHandshake,
        collector: &mut Collector,
    ) -> bool {
        match tokio::time::timeout(QUIC_HANDSHAKE_TIMEOUT, handshake).await {
            Ok(Ok((accepted, done_at))) if connection.close_reason().is_none() => {
                self.handshake_complete(connection, done_at, accepted, collector);
                accepted
            }
            _ => false,
        }
    }

    fn handshake_complete(
        &self,
        connection: &Connection,
        done_at: Instant,
        early_data_accepted: bool,
        collector: &mut Collector,
    ) {
        let protocol = negotiated_protocol(connection);
        collector.quic_handshake_done_at(done_at, QUIC_VERSION_1, TLS13, protocol.clone());
        collector.qlog(
            "connectivity:connection_state_updated",
            json!({
                "new": "handshake_complete",
                "alpn": protocol,
                "early_data_accepted": early_data_accepted,
            }),
        );
        if let (Some(protocol), Ok(mut last)) = (protocol, self.last_protocol.lock()) {
            *last = Some(protocol);
        }
    }

    fn uses_length_prefix(&self, connection: &Connection) -> bool {
        let protocol = negotiated_protocol(connection)
            .or_else(|| self.last_protocol.lock().ok().and_then(|last| last.clone()))
            .or_else(|| self.core.options().quic.allowed_versions.first().cloned());
        protocol.as_deref() == Some(DOQ_VERSION_FINAL)
    }

    /// Opens a stream, sends the query, reads the reply into `buffer` until
    /// FIN and returns the number of bytes read.
    async fn query_stream(
        &self,
        connection: &Connection,
        wire: &[u8],
        framed: bool,
        target: SocketAddr,
        collector: &mut Collector,
        buffer: &mut PooledBuffer<'_>,
    ) -> Result<usize, StreamFailure> {
        let (mut send, mut recv) = self
            .core
            .deadline(connection.open_bi())
            .await
            .ok_or_else(|| ProbeError::timeout("QUIC stream open", target))?
            .map_err(|e| classify::quic_error(&e))?;

        collector.qlog(
            "transport:stream_state_updated",
            json!({ "stream_id": send.id().index(), "new": "open" }),
        );

        let mut request = Vec::with_capacity(wire.len() + 2);
        if framed {
            let length = u16::try_from(wire.len())
                .map_err(|_| ProbeError::Codec(format!("query too large: {} bytes", wire.len())))?;
            request.extend_from_slice(&length.to_be_bytes());
        }
        request.extend_from_slice(wire);

        collector.query_send();
        match send.write_all(&request).await {
            Ok(()) => {}
            Err(quinn::WriteError::ZeroRttRejected) => return Err(StreamFailure::ZeroRttRejected),
            Err(e) => {
                return Err(ProbeError::Io(format!("QUIC write to {} failed: {}", target, e)).into())
            }
        }
        // FIN: no further data on this stream.
        send.finish()
            .map_err(|e| ProbeError::Io(format!("Failed to finish QUIC stream: {}", e)))?;

        let filled = self
            .core
            .deadline(read_to_fin(&mut recv, buffer))
            .await
            .ok_or_else(|| ProbeError::timeout("QUIC read", target))??;
        collector.query_receive();

        debug!(server = %target, response_len = filled, "QUIC response received");
        Ok(filled)
    }

    fn close(&self, connection: &Connection, collector: &mut Collector) {
        connection.close(VarInt::from_u32(CLOSE_NO_ERROR), b"");

        let stats = connection.stats();
        collector.qlog(
            "recovery:metrics_updated",
            json!({
                "smoothed_rtt": stats.path.rtt.as_secs_f64() * 1000.0,
                "congestion_window": stats.path.cwnd,
                "lost_packets": stats.path.lost_packets,
                "datagrams_sent": stats.udp_tx.datagrams,
                "datagrams_received": stats.udp_rx.datagrams,
            }),
        );
        collector.qlog(
            "connectivity:connection_closed",
            json!({
                "owner": "local",
                "application_code": CLOSE_NO_ERROR,
                "name": QuicErrorCode::NO_ERROR.name(),
            }),
        );
    }
}

async fn read_to_fin(
    recv: &mut quinn::RecvStream,
    buffer: &mut [u8],
) -> Result<usize, StreamFailure> {
    let mut filled = 0;
    while filled < buffer.len() {
        match recv.read(&mut buffer[filled..]).await {
            Ok(Some(n)) => filled += n,
            Ok(None) => return Ok(filled),
            Err(e) => return Err(read_failure(e)),
        }
    }

    // Buffer is full: the reply fits only if FIN follows immediately.
    let mut extra = [0u8; 1];
    match recv.read(&mut extra).await {
        Ok(None) => Ok(filled),
        Ok(Some(_)) => Err(ProbeError::Protocol(format!(
            "QUIC response exceeds {} bytes",
            buffer.len()
        ))
        .into()),
        Err(e) => Err(read_failure(e)),
    }
}

fn read_failure(error: quinn::ReadError) -> StreamFailure {
    match error {
        quinn::ReadError::ZeroRttRejected => StreamFailure::ZeroRttRejected,
        quinn::ReadError::ConnectionLost(e) => classify::quic_error(&e).into(),
        e => ProbeError::Io(format!("QUIC read failed: {}", e)).into(),
    }
}

fn unframe(reply: &mut [u8], framed: bool) -> Result<&mut [u8], ProbeError> {
    if !framed {
        return Ok(reply);
    }
    if reply.len() < 2 {
        return Err(ProbeError::Codec(format!(
            "QUIC response too short: {} bytes",
            reply.len()
        )));
    }
    let declared = u16::from_be_bytes([reply[0], reply[1]]) as usize;
    if declared > reply.len() - 2 {
        return Err(ProbeError::Codec(format!(
            "QUIC response truncated: declared {} bytes, got {}",
            declared,
            reply.len() - 2
        )));
    }
    Ok(&mut reply[2..2 + declared])
}

fn negotiated_protocol(connection: &Connection) -> Option<String> {
    connection
        .handshake_data()?
        .downcast::<HandshakeData>()
        .ok()?
        .protocol
        .map(|p| String::from_utf8_lossy(&p).into_owned())
}

#[async_trait]
impl DnsClient for QuicClient {
    async fn exchange(&self, query: &Message) -> ExchangeResult {
        let mut collector = Collector::new();
        let mut buffer = self.buffers.acquire();

        let outcome = self.run(query, &mut collector, &mut buffer).await;
        drop(buffer);

        match outcome {
            Ok((response, error)) => {
                collector.exchange_finished();
                ExchangeResult::with_error(response, error, collector)
            }
            Err(e) => ExchangeResult::failed(e, collector),
        }
    }

    fn protocol_name(&self) -> &'static str {
        "QUIC"
    }
}
