pub mod buffer_pool;
pub mod core;
#[cfg(feature = "dns-over-https")]
pub mod https;
pub mod options;
#[cfg(feature = "dns-over-quic")]
pub mod quic;
pub mod resolver;
pub mod tcp;
pub mod tls;
pub mod tls_config;
pub mod udp;

use crate::dns::exchange::ExchangeResult;
use async_trait::async_trait;
use dnsperf_domain::{ProbeError, Scheme, UpstreamUrl};
use hickory_proto::op::Message;
use tracing::debug;

pub use self::core::{Dialed, TransportCore};
pub use buffer_pool::{BufferPool, BufferPoolStats};
pub use options::{Options, QuicPolicy, TlsTrust};
pub use resolver::{AddressResolver, SystemResolver};

/// One DNS exchange over a specific transport.
#[async_trait]
pub trait DnsClient: Send + Sync {
    /// Sends `query` and waits for one reply. Never panics on network
    /// failures; errors are carried in the result.
    async fn exchange(&self, query: &Message) -> ExchangeResult;

    fn protocol_name(&self) -> &'static str;
}

pub enum Transport {
    Udp(udp::UdpClient),
    Tcp(tcp::TcpClient),
    Tls(tls::TlsClient),
    #[cfg(feature = "dns-over-https")]
    Https(https::HttpsClient),
    #[cfg(feature = "dns-over-quic")]
    Quic(quic::QuicClient),
}

impl Transport {
    pub async fn exchange(&self, query: &Message) -> ExchangeResult {
        match self {
            Self::Udp(c) => DnsClient::exchange(c, query).await,
            Self::Tcp(c) => DnsClient::exchange(c, query).await,
            Self::Tls(c) => DnsClient::exchange(c, query).await,
            #[cfg(feature = "dns-over-https")]
            Self::Https(c) => DnsClient::exchange(c, query).await,
            #[cfg(feature = "dns-over-quic")]
            Self::Quic(c) => DnsClient::exchange(c, query).await,
        }
    }

    pub fn protocol_name(&self) -> &'static str {
        match self {
            Self::Udp(_) => "UDP",
            Self::Tcp(_) => "TCP",
            Self::Tls(_) => "TLS",
            #[cfg(feature = "dns-over-https")]
            Self::Https(_) => "HTTPS",
            #[cfg(feature = "dns-over-quic")]
            Self::Quic(_) => "QUIC",
        }
    }

    pub fn core(&self) -> &TransportCore {
        match self {
            Self::Udp(c) => c.core(),
            Self::Tcp(c) => c.core(),
            Self::Tls(c) => c.core(),
            #[cfg(feature = "dns-over-https")]
            Self::Https(c) => c.core(),
            #[cfg(feature = "dns-over-quic")]
            Self::Quic(c) => c.core(),
        }
    }
}

#[async_trait]
impl DnsClient for Transport {
    async fn exchange(&self, query: &Message) -> ExchangeResult {
        Transport::exchange(self, query).await
    }

    fn protocol_name(&self) -> &'static str {
        Transport::protocol_name(self)
    }
}

/// Builds the client for a `scheme://host[:port][/path]` upstream, resolving
/// the host through the operating system.
pub async fn create_client(address: &str, options: Options) -> Result<Transport, ProbeError> {
    create_client_with_resolver(address, options, &SystemResolver).await
}

pub async fn create_client_with_resolver(
    address: &str,
    options: Options,
    resolver: &dyn AddressResolver,
) -> Result<Transport, ProbeError> {
    let url: UpstreamUrl = address.parse()?;
    let scheme = url.scheme();
    let core = TransportCore::new(url, options, resolver).await?;

    debug!(upstream = %core.address().url(), protocol = scheme.protocol_name(), "Creating client");

    match scheme {
        Scheme::Udp => Ok(Transport::Udp(udp::UdpClient::new(core))),
        Scheme::Tcp => Ok(Transport::Tcp(tcp::TcpClient::new(core))),
        Scheme::Tls => Ok(Transport::Tls(tls::TlsClient::new(core))),

        #[cfg(feature = "dns-over-https")]
        Scheme::Https => Ok(Transport::Https(https::HttpsClient::new(core))),
        #[cfg(not(feature = "dns-over-https"))]
        Scheme::Https => Err(ProbeError::UnsupportedScheme(format!(
            "{} (enable the 'dns-over-https' feature)",
            scheme
        ))),

        #[cfg(feature = "dns-over-quic")]
        Scheme::Quic => Ok(Transport::Quic(quic::QuicClient::new(core)?)),
        #[cfg(not(feature = "dns-over-quic"))]
        Scheme::Quic => Err(ProbeError::UnsupportedScheme(format!(
            "{} (enable the 'dns-over-quic' feature)",
            scheme
        ))),
    }
}
