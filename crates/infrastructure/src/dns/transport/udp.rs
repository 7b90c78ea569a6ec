//! DNS over plain UDP (RFC 1035 §4.2.1).
//!
//! One connected socket per exchange, one datagram each way. The ID is sent
//! as-is and a non-NOERROR reply is returned together with an error.

use super::core::TransportCore;
use super::DnsClient;
use crate::dns::codec::{self, MAX_MESSAGE_SIZE};
use crate::dns::exchange::ExchangeResult;
use async_trait::async_trait;
use dnsperf_domain::{Collector, ProbeError};
use hickory_proto::op::Message;
use tracing::debug;

pub struct UdpClient {
    core: TransportCore,
}

impl UdpClient {
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
        let dialed = self.core.dial_udp(Some(&mut *collector)).await?;
        let server = dialed.peer;
        let socket = dialed.conn;

        let mut recv_buf = vec![0u8; MAX_MESSAGE_SIZE];
        collector.query_send();
        let received = self
            .core
            .deadline(async {
                socket.send(&packed).await?;
                debug!(server = %server, bytes_sent = packed.len(), "UDP query sent");
                socket.recv(&mut recv_buf).await
            })
            .await
            .ok_or_else(|| ProbeError::timeout("UDP exchange", server))?
            .map_err(|e| ProbeError::Io(format!("UDP exchange with {} failed: {}", server, e)))?;
        collector.query_receive();

        debug!(server = %server, bytes_received = received, "UDP response received");

        let response = codec::unpack(&recv_buf[..received])?;
        let rcode_error = codec::rcode_error(&response);
        Ok((response, rcode_error))
    }
}

#[async_trait]
impl DnsClient for UdpClient {
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
        "UDP"
    }
}
