//! DNS over TLS (RFC 7858).
//!
//! Every exchange dials a fresh connection through the core so the TCP and
//! TLS handshakes are measured each time.

use super::core::TransportCore;
use super::tcp::framed_exchange;
use super::DnsClient;
use crate::dns::codec;
use crate::dns::exchange::ExchangeResult;
use async_trait::async_trait;
use dnsperf_domain::{Collector, ProbeError};
use hickory_proto::op::Message;
use tokio::io::AsyncWriteExt;

pub struct TlsClient {
    core: TransportCore,
}

impl TlsClient {
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
        let dialed = self.core.dial_tls(collector).await?;
        let mut stream = dialed.conn;

        let outcome = framed_exchange(&self.core, &mut stream, &packed, dialed.peer, collector).await;
        let _ = stream.shutdown().await;
        outcome
    }
}

#[async_trait]
impl DnsClient for TlsClient {
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
        "TLS"
    }
}
