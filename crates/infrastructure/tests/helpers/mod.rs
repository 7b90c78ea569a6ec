#![allow(dead_code)]
pub mod certs;
pub mod dns_server_mock;
pub mod dns_wire;
#[cfg(feature = "dns-over-https")]
pub mod doh_server_mock;
#[cfg(feature = "dns-over-quic")]
pub mod quic_server_mock;
pub mod stream_server_mock;

pub use certs::TestCert;
pub use dns_server_mock::MockDnsServer;
#[cfg(feature = "dns-over-https")]
pub use doh_server_mock::MockDohServer;
#[cfg(feature = "dns-over-quic")]
pub use quic_server_mock::MockQuicServer;
pub use stream_server_mock::MockStreamServer;

use async_trait::async_trait;
use dnsperf_domain::{ProbeError, UpstreamUrl};
use dnsperf_infrastructure::dns::transport::AddressResolver;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Resolver that hands out fixed addresses and counts lookups.
pub struct CountingResolver {
    addrs: Vec<SocketAddr>,
    calls: AtomicUsize,
}

impl CountingResolver {
    pub fn new(addrs: Vec<SocketAddr>) -> Self {
        Self {
            addrs,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AddressResolver for CountingResolver {
    async fn resolve(&self, url: &UpstreamUrl) -> Result<Vec<SocketAddr>, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .addrs
            .iter()
            .map(|a| SocketAddr::new(a.ip(), url.port()))
            .collect())
    }
}
