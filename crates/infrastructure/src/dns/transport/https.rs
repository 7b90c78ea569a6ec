//! DNS over HTTPS (RFC 8484), GET variant.
//!
//! ```text
//! GET /dns-query?dns=<base64url(query)> HTTP/2
//! Accept: application/dns-message
//! ```
//!
//! Each exchange opens exactly one connection through the core's TLS dial
//! and drops it afterwards. HTTP/2 is used when ALPN selected `h2`,
//! HTTP/1.1 otherwise.

use super::core::TransportCore;
use super::DnsClient;
use crate::dns::codec;
use crate::dns::exchange::ExchangeResult;
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bytes::Bytes;
use dnsperf_domain::{Collector, ProbeError};
use hickory_proto::op::Message;
use http::{header, Method, Request, Response, StatusCode, Version};
use http_body_util::{BodyExt, Empty};
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use tracing::debug;

const DNS_MESSAGE_CONTENT_TYPE: &str = "application/dns-message";

pub struct HttpsClient {
    core: TransportCore,
}

impl HttpsClient {
    pub fn new(core: TransportCore) -> Self {
        Self { core }
    }

    pub fn core(&self) -> &TransportCore {
        &self.core
    }

    /// Origin-form target carrying the encoded query.
    pub fn request_target(&self, packed: &[u8]) -> String {
        let path = match self.core.address().url().path() {
            "" => "/",
            path => path,
        };
        let separator = if path.contains('?') { '&' } else { '?' };
        format!("{}{}dns={}", path, separator, URL_SAFE_NO_PAD.encode(packed))
    }

    async fn run(
        &self,
        query: &Message,
        collector: &mut Collector,
    ) -> Result<(Message, Option<ProbeError>), ProbeError> {
        let packed = codec::pack(query)?;
        let server = self.core.address().url().authority();

        self.core
            .deadline(self.request(&packed, collector))
            .await
            .ok_or_else(|| ProbeError::timeout("DoH request", server))?
    }

    async fn request(
        &self,
        packed: &[u8],
        collector: &mut Collector,
    ) -> Result<(Message, Option<ProbeError>), ProbeError> {
        let dialed = self.core.dial_tls(collector).await?;
        let peer = dialed.peer;
        collector.query_send();

        let h2 = dialed.conn.get_ref().1.alpn_protocol() == Some(b"h2".as_slice());
        let authority = self.core.address().url().authority();
        let target = self.request_target(packed);

        let builder = Request::builder()
            .method(Method::GET)
            .header(header::ACCEPT, DNS_MESSAGE_CONTENT_TYPE);
        let builder = if h2 {
            builder
                .version(Version::HTTP_2)
                .uri(format!("https://{}{}", authority, target))
        } else {
            builder.uri(target).header(header::HOST, authority.as_str())
        };
        let request = builder
            .body(Empty::<Bytes>::new())
            .map_err(|e| ProbeError::Protocol(format!("Failed to build DoH request: {}", e)))?;

        let io = TokioIo::new(dialed.conn);
        let response = if h2 {
            send_http2(io, request).await
        } else {
            send_http1(io, request).await
        }
        .map_err(|e| ProbeError::Io(format!("DoH request to {} failed: {}", peer, e)))?;

        collector.query_receive();
        collector.http_version(version_name(response.version()));

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ProbeError::Protocol(format!(
                "DoH server {} returned HTTP {}",
                authority, status
            )));
        }

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| ProbeError::Codec(format!("Failed to read DoH response body: {}", e)))?
            .to_bytes();

        debug!(
            server = %peer,
            response_len = body.len(),
            http2 = h2,
            "DoH response received"
        );

        let mismatch = codec::wire_id(packed).and_then(|id| codec::id_mismatch(id, &body));
        let response = codec::unpack(&body)?;
        Ok((response, mismatch))
    }
}

type Io = TokioIo<tokio_rustls::client::TlsStream<tokio::net::TcpStream>>;

async fn send_http1(
    io: Io,
    request: Request<Empty<Bytes>>,
) -> Result<Response<Incoming>, hyper::Error> {
    let (mut sender, connection) = hyper::client::conn::http1::handshake(io).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            debug!(error = %e, "DoH HTTP/1.1 connection closed with error");
        }
    });
    sender.send_request(request).await
}

async fn send_http2(
    io: Io,
    request: Request<Empty<Bytes>>,
) -> Result<Response<Incoming>, hyper::Error> {
    let (mut sender, connection) =
        hyper::client::conn::http2::handshake(TokioExecutor::new(), io).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            debug!(error = %e, "DoH HTTP/2 connection closed with error");
        }
    });
    sender.send_request(request).await
}

fn version_name(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "unknown",
    }
}

#[async_trait]
impl DnsClient for HttpsClient {
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
        "HTTPS"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::transport::{Options, SystemResolver};

    async fn client(url: &str) -> HttpsClient {
        let core = TransportCore::new(
            url.parse().unwrap(),
            Options::default().with_server_ips(vec!["127.0.0.1".parse().unwrap()]),
            &SystemResolver,
        )
        .await
        .unwrap();
        HttpsClient::new(core)
    }

    #[tokio::test]
    async fn test_target_appends_dns_parameter() {
        let client = client("https://dns.example/dns-query").await;
        let target = client.request_target(&[0xAB, 0xCD, 0xEF]);
        assert_eq!(target, "/dns-query?dns=q83v");
    }

    #[tokio::test]
    async fn test_target_keeps_existing_query() {
        let client = client("https://dns.example/resolve?ct=1").await;
        assert!(client.request_target(&[0]).starts_with("/resolve?ct=1&dns="));
    }

    #[tokio::test]
    async fn test_empty_path_becomes_root() {
        let client = client("https://dns.example").await;
        assert!(client.request_target(&[0]).starts_with("/?dns="));
    }

    #[test]
    fn test_version_names() {
        assert_eq!(version_name(Version::HTTP_2), "HTTP/2.0");
        assert_eq!(version_name(Version::HTTP_11), "HTTP/1.1");
    }
}
