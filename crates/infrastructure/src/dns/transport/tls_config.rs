//! Client TLS configuration built from a [`TlsPolicy`].

use super::options::{QuicPolicy, TlsTrust};
use dnsperf_domain::{ProbeError, Scheme, TlsPolicy, TlsVersion};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::ParsedCertificate;
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::sync::Arc;

const HTTP_ALPN: [&str; 2] = ["http/1.1", "h2"];

pub fn build_client_config(
    scheme: Scheme,
    policy: &TlsPolicy,
    quic: &QuicPolicy,
    trust: &TlsTrust,
) -> Result<ClientConfig, ProbeError> {
    let versions = protocol_versions(scheme, policy)?;

    let builder = ClientConfig::builder_with_provider(trust.provider.clone())
        .with_protocol_versions(&versions)
        .map_err(|e| ProbeError::TlsConfig(e.to_string()))?;

    let mut config = if policy.insecure_skip_verify {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate {
                provider: trust.provider.clone(),
            }))
            .with_no_client_auth()
    } else if policy.skip_common_name {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(ChainOnlyVerifier {
                roots: trust.roots.clone(),
                provider: trust.provider.clone(),
            }))
            .with_no_client_auth()
    } else {
        builder
            .with_root_certificates(trust.roots.clone())
            .with_no_client_auth()
    };

    config.alpn_protocols = alpn_protocols(scheme, quic);
    if scheme == Scheme::Quic {
        config.enable_early_data = true;
    }

    Ok(config)
}

pub fn alpn_protocols(scheme: Scheme, quic: &QuicPolicy) -> Vec<Vec<u8>> {
    let http = HTTP_ALPN.iter().map(|p| p.as_bytes().to_vec());
    match scheme {
        Scheme::Https => http.collect(),
        Scheme::Quic => quic
            .allowed_versions
            .iter()
            .map(|v| v.as_bytes().to_vec())
            .chain(http)
            .collect(),
        Scheme::Udp | Scheme::Tcp | Scheme::Tls => Vec::new(),
    }
}

fn protocol_versions(
    scheme: Scheme,
    policy: &TlsPolicy,
) -> Result<Vec<&'static rustls::SupportedProtocolVersion>, ProbeError> {
    let candidates: &[&'static rustls::SupportedProtocolVersion] = if scheme == Scheme::Quic {
        &[&rustls::version::TLS13]
    } else {
        &[&rustls::version::TLS13, &rustls::version::TLS12]
    };

    let versions: Vec<_> = candidates
        .iter()
        .copied()
        .filter(|v| {
            TlsVersion::from_code(u16::from(v.version)).is_some_and(|version| policy.allows(version))
        })
        .collect();

    if versions.is_empty() {
        return Err(ProbeError::TlsConfig(format!(
            "no TLS protocol version usable for {} within {:?}..{:?}",
            scheme, policy.min_version, policy.max_version
        )));
    }
    Ok(versions)
}

/// Verifies the chain against the trust roots but not the server name.
#[derive(Debug)]
struct ChainOnlyVerifier {
    roots: Arc<RootCertStore>,
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for ChainOnlyVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let cert = ParsedCertificate::try_from(end_entity)?;
        rustls::client::verify_server_cert_signed_by_trust_anchor(
            &cert,
            &self.roots,
            intermediates,
            now,
            self.provider.signature_verification_algorithms.all,
        )?;
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Accepts any certificate. Handshake signatures are still checked.
#[derive(Debug)]
struct AcceptAnyCertificate {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
