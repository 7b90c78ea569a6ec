use dnsperf_infrastructure::dns::transport::TlsTrust;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::RootCertStore;
use std::sync::Arc;

pub struct TestCert {
    pub cert: CertificateDer<'static>,
    pub key: PrivateKeyDer<'static>,
}

impl TestCert {
    /// Self-signed certificate valid for `names`.
    pub fn self_signed(names: &[&str]) -> Self {
        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        let certified = rcgen::generate_simple_self_signed(names).unwrap();
        Self {
            cert: certified.cert.der().clone(),
            key: PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der())),
        }
    }

    /// Trust store containing only this certificate.
    pub fn trust(&self) -> TlsTrust {
        let mut roots = RootCertStore::empty();
        roots.add(self.cert.clone()).unwrap();
        TlsTrust::new(roots)
    }

    pub fn server_config(&self, alpn: &[&[u8]], tls13_only: bool) -> rustls::ServerConfig {
        let versions: &[&rustls::SupportedProtocolVersion] = if tls13_only {
            &[&rustls::version::TLS13]
        } else {
            rustls::DEFAULT_VERSIONS
        };
        self.server_config_with_versions(alpn, versions)
    }

    /// Server that refuses TLS 1.3.
    pub fn tls12_server_config(&self) -> rustls::ServerConfig {
        self.server_config_with_versions(&[], &[&rustls::version::TLS12])
    }

    fn server_config_with_versions(
        &self,
        alpn: &[&[u8]],
        versions: &[&'static rustls::SupportedProtocolVersion],
    ) -> rustls::ServerConfig {
        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let builder = rustls::ServerConfig::builder_with_provider(provider)
            .with_protocol_versions(versions)
            .unwrap();

        let mut config = builder
            .with_no_client_auth()
            .with_single_cert(vec![self.cert.clone()], self.key.clone_key())
            .unwrap();
        config.alpn_protocols = alpn.iter().map(|p| p.to_vec()).collect();
        config
    }
}
