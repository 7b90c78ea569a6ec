//! DNS over plain TCP (RFC 7766), two-byte length framing.

use super::core::TransportCore;
use super::DnsClient;
use crate::dns::codec::{self, read_with_length_prefix, send_with_length_prefix};
use crate::dns::exchange::ExchangeResult;
use async_trait::async_trait;
use dnsperf_domain::{Collector, ProbeError};
use hickory_proto::op::Message;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

pub struct TcpClient {
    core: TransportCore,
}

impl TcpClient {
    pub fn new(core: TransportCore) -> Self {
        Self { core }
    }

    pub fn core(&self) -> &TransportCore {
        &self.core
    }

    async fn run(
        &self,
        query: &Message,
        collector: &mut Collector,
    ) -> Result<(Message, Option<ProbeError>), ProbeError> {
        let packed = codec::pack(query)?;
        let dialed = self.core.dial_tcp(collector).await?;
        let mut stream = dialed.conn;

        framed_exchange(&self.core, &mut stream, &packed, dialed.peer, collector).await
    }
}

#[async_trait]
impl DnsClient for TcpClient {
    async fn exchange(&self, query: &Message) -> ExchangeResult {
        let mut collector = Collector::new();
        collector.exchange_started();

        match self.run(query, &mut collector).await {
            Ok((response, error)) => {
                collector.exchange_finished();
                ExchangeResult::with_error(response, error, collector)
            }
            Err(e) => ExchangeResult::failed(e, collector),
        }
    }

    fn protocol_name(&self) -> &'static str {
        "TCP"
    }
}

/// Writes one framed query and reads one framed reply under the core's
/// deadline. A reply with a different ID is returned with `IdMismatch`.
pub(crate) async fn framed_exchange<S>(
    core: &TransportCore,
    stream: &mut S,
    packed: &[u8],
    server: SocketAddr,
    collector: &mut Collector,
) -> Result<(Message, Option<ProbeError>), ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    collector.query_send();
    let reply = core
        .deadline(async {
            send_with_length_prefix(stream, packed).await?;
            debug!(server = %server, message_len = packed.len(), "Framed query sent");
            read_with_length_prefix(stream).await
        })
        .await
        .ok_or_else(|| ProbeError::timeout("framed exchange", server))?
        .map_err(|e| ProbeError::Io(format!("Exchange with {} failed: {}", server, e)))?;
    collector.query_receive();

    debug!(server = %server, response_len = reply.len(), "Framed response received");

    let mismatch = codec::wire_id(packed).and_then(|id| codec::id_mismatch(id, &reply));
    let response = codec::unpack(&reply)?;
    Ok((response, mismatch))
}
