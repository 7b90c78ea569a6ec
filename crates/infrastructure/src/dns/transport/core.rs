//! Connection machinery shared by every transport: address selection,
//! dial-with-fallback and TLS-wrapped dialing.

use super::options::Options;
use super::resolver::AddressResolver;
use super::tls_config::build_client_config;
use crate::dns::classify;
use dnsperf_domain::{Collector, Phase, ProbeError, TlsAlert, UpstreamAddress, UpstreamUrl};
use rustls::pki_types::ServerName;
use rustls::ClientConfig;
use std::future::Future;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpStream, UdpSocket};
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

/// Budget for TCP connect plus TLS handshake.
pub const TLS_DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// A connection returned by dial-with-fallback.
#[derive(Debug)]
pub struct Dialed<C> {
    pub conn: C,
    pub peer: SocketAddr,
    /// Connection attempts made, including the successful one.
    pub attempts: usize,
}

pub struct TransportCore {
    address: UpstreamAddress,
    server_name: ServerName<'static>,
    tls_config: Arc<ClientConfig>,
    options: Options,
}

impl TransportCore {
    pub async fn new(
        url: UpstreamUrl,
        options: Options,
        resolver: &dyn AddressResolver,
    ) -> Result<Self, ProbeError> {
        let addresses = if options.server_ip_addrs.is_empty() {
            resolver.resolve(&url).await?
        } else {
            options
                .server_ip_addrs
                .iter()
                .map(|ip| SocketAddr::new(*ip, url.port()))
                .collect()
        };

        let tls_config =
            build_client_config(url.scheme(), &options.tls, &options.quic, &options.trust)?;

        let server_name = ServerName::try_from(url.host().to_string()).map_err(|e| {
            ProbeError::InvalidUpstream(format!("invalid TLS server name '{}': {}", url.host(), e))
        })?;

        let address = UpstreamAddress::new(url, addresses)?;
        debug!(
            upstream = %address.url(),
            addresses = ?address.addresses(),
            "Transport core ready"
        );

        Ok(Self {
            address,
            server_name,
            tls_config: Arc::new(tls_config),
            options,
        })
    }

    pub fn address(&self) -> &UpstreamAddress {
        &self.address
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn timeout(&self) -> Duration {
        self.options.timeout
    }

    pub fn tls_config(&self) -> &Arc<ClientConfig> {
        &self.tls_config
    }

    pub fn server_name(&self) -> &ServerName<'static> {
        &self.server_name
    }

    /// Bounds `fut` by the configured timeout; `None` when it elapsed.
    pub async fn deadline<F: Future>(&self, fut: F) -> Option<F::Output> {
        with_deadline(self.options.timeout, fut).await
    }

    /// Connects over TCP to the first reachable address, timing the
    /// successful attempt as the TCP handshake.
    pub async fn dial_tcp(&self, collector: &mut Collector) -> Result<Dialed<TcpStream>, ProbeError> {
        let mut failures = Vec::new();

        for (index, addr) in self.address.addresses().iter().enumerate() {
            collector.start(Phase::TcpHandshake);
            match with_deadline(self.options.timeout, TcpStream::connect(addr)).await {
                Some(Ok(stream)) => {
                    collector.finish(Phase::TcpHandshake);
                    let _ = stream.set_nodelay(true);
                    debug!(server = %addr, attempts = index + 1, "TCP connection established");
                    return Ok(Dialed {
                        conn: stream,
                        peer: *addr,
                        attempts: index + 1,
                    });
                }
                Some(Err(e)) => failures.push(format!("{}: {}", addr, e)),
                None => failures.push(format!("{}: connect timed out", addr)),
            }
        }

        Err(ProbeError::Dial { attempts: failures })
    }

    /// Binds and connects a UDP socket to the first usable address. Timing is
    /// recorded as UDP socket setup when a collector is given.
    pub async fn dial_udp(
        &self,
        mut collector: Option<&mut Collector>,
    ) -> Result<Dialed<UdpSocket>, ProbeError> {
        let mut failures = Vec::new();

        for (index, addr) in self.address.addresses().iter().enumerate() {
            if let Some(collector) = collector.as_deref_mut() {
                collector.start(Phase::UdpSocketSetup);
            }
            match with_deadline(self.options.timeout, connect_udp(*addr)).await {
                Some(Ok(socket)) => {
                    if let Some(collector) = collector.as_deref_mut() {
                        collector.finish(Phase::UdpSocketSetup);
                    }
                    return Ok(Dialed {
                        conn: socket,
                        peer: *addr,
                        attempts: index + 1,
                    });
                }
                Some(Err(e)) => failures.push(format!("{}: {}", addr, e)),
                None => failures.push(format!("{}: socket setup timed out", addr)),
            }
        }

        Err(ProbeError::Dial { attempts: failures })
    }

    /// TCP dial followed by a TLS handshake, both inside [`TLS_DIAL_TIMEOUT`].
    pub async fn dial_tls(
        &self,
        collector: &mut Collector,
    ) -> Result<Dialed<TlsStream<TcpStream>>, ProbeError> {
        let server = self.address.url().authority();

        tokio::time::timeout(TLS_DIAL_TIMEOUT, self.handshake(collector))
            .await
            .map_err(|_| ProbeError::timeout("TLS dial", server))?
    }

    async fn handshake(
        &self,
        collector: &mut Collector,
    ) -> Result<Dialed<TlsStream<TcpStream>>, ProbeError> {
        let dialed = self.dial_tcp(collector).await?;
        let connector = TlsConnector::from(self.tls_config.clone());

        collector.start(Phase::TlsHandshake);
        match connector
            .connect(self.server_name.clone(), dialed.conn)
            .await
        {
            Ok(stream) => {
                let version = stream.get_ref().1.protocol_version().map(u16::from);
                collector.tls_handshake_finished(version);
                debug!(
                    server = %dialed.peer,
                    tls_version = ?version,
                    "TLS handshake complete"
                );
                Ok(Dialed {
                    conn: stream,
                    peer: dialed.peer,
                    attempts: dialed.attempts,
                })
            }
            Err(e) => {
                collector.tls_handshake_finished(None);
                let err = classify::tls_handshake_error(&e);
                let mut alert = None;
                if let ProbeError::Tls {
                    reason,
                    alert: received,
                    ..
                } = &err
                {
                    if let Some(reason) = reason {
                        collector.tls_error(*reason);
                    }
                    alert = received.map(TlsAlert::name);
                }
                debug!(server = %dialed.peer, error = %err, alert, "TLS handshake failed");
                Err(err)
            }
        }
    }
}

async fn connect_udp(addr: SocketAddr) -> std::io::Result<UdpSocket> {
    let bind_addr: SocketAddr = if addr.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(bind_addr).await?;
    socket.connect(addr).await?;
    Ok(socket)
}

/// Zero disables the deadline.
pub(crate) async fn with_deadline<F: Future>(timeout: Duration, fut: F) -> Option<F::Output> {
    if timeout.is_zero() {
        Some(fut.await)
    } else {
        tokio::time::timeout(timeout, fut).await.ok()
    }
}
