use dnsperf_domain::{ProbeConfig, TlsPolicy};
use rustls::crypto::CryptoProvider;
use rustls::RootCertStore;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// Trust anchors and crypto provider shared by every client built from the
/// same options. Must be complete before the first client is constructed.
#[derive(Clone)]
pub struct TlsTrust {
    pub roots: Arc<RootCertStore>,
    pub provider: Arc<CryptoProvider>,
}

impl TlsTrust {
    pub fn new(roots: RootCertStore) -> Self {
        Self {
            roots: Arc::new(roots),
            provider: Arc::new(rustls::crypto::aws_lc_rs::default_provider()),
        }
    }

    pub fn webpki() -> Self {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Self::new(roots)
    }
}

impl Default for TlsTrust {
    fn default() -> Self {
        Self::webpki()
    }
}

impl fmt::Debug for TlsTrust {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsTrust")
            .field("roots", &self.roots.len())
            .finish()
    }
}

#[derive(Clone)]
pub struct QuicPolicy {
    /// ALPN identifiers offered for DNS over QUIC, most preferred first.
    pub allowed_versions: Vec<String>,
    #[cfg(feature = "dns-over-quic")]
    pub token_store: Option<Arc<dyn quinn::TokenStore>>,
    pub local_port: Option<u16>,
}

impl Default for QuicPolicy {
    fn default() -> Self {
        let config = dnsperf_domain::config::QuicConfig::default();
        Self {
            allowed_versions: config.allowed_versions,
            #[cfg(feature = "dns-over-quic")]
            token_store: None,
            local_port: None,
        }
    }
}

impl fmt::Debug for QuicPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("QuicPolicy");
        out.field("allowed_versions", &self.allowed_versions);
        #[cfg(feature = "dns-over-quic")]
        out.field("token_store", &self.token_store.is_some());
        out.field("local_port", &self.local_port).finish()
    }
}

/// Runtime options for building a client.
#[derive(Debug, Clone)]
pub struct Options {
    /// Per-operation deadline, zero means none.
    pub timeout: Duration,
    /// When non-empty, used instead of resolving the upstream host.
    pub server_ip_addrs: Vec<IpAddr>,
    pub tls: TlsPolicy,
    pub quic: QuicPolicy,
    pub trust: TlsTrust,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            server_ip_addrs: Vec::new(),
            tls: TlsPolicy::default(),
            quic: QuicPolicy::default(),
            trust: TlsTrust::default(),
        }
    }
}

impl Options {
    pub fn from_config(config: &ProbeConfig) -> Self {
        Self {
            timeout: config.timeout(),
            server_ip_addrs: config.server_ips.clone(),
            tls: config.tls.clone(),
            quic: QuicPolicy {
                allowed_versions: config.quic.allowed_versions.clone(),
                #[cfg(feature = "dns-over-quic")]
                token_store: config.quic.token_store.then(|| {
                    Arc::new(quinn::TokenMemoryCache::default()) as Arc<dyn quinn::TokenStore>
                }),
                local_port: config.quic.local_port,
            },
            trust: TlsTrust::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_server_ips(mut self, ips: Vec<IpAddr>) -> Self {
        self.server_ip_addrs = ips;
        self
    }

    pub fn with_trust(mut self, trust: TlsTrust) -> Self {
        self.trust = trust;
        self
    }

    pub fn with_tls(mut self, tls: TlsPolicy) -> Self {
        self.tls = tls;
        self
    }
}
