//! Maps TLS and QUIC library failures onto stable codes.

use dnsperf_domain::{CertificateInvalidReason, ProbeError, QuicErrorCode, TlsAlert};
use rustls::CertificateError;

/// Certificate-invalid reason for a rustls certificate error.
pub fn certificate_reason(error: &CertificateError) -> CertificateInvalidReason {
    match error {
        CertificateError::BadEncoding => CertificateInvalidReason::BadEncoding,
        CertificateError::Expired | CertificateError::ExpiredContext { .. } => {
            CertificateInvalidReason::Expired
        }
        CertificateError::NotValidYet | CertificateError::NotValidYetContext { .. } => {
            CertificateInvalidReason::NotValidYet
        }
        CertificateError::Revoked => CertificateInvalidReason::Revoked,
        CertificateError::UnhandledCriticalExtension => {
            CertificateInvalidReason::UnhandledCriticalExtension
        }
        CertificateError::UnknownIssuer => CertificateInvalidReason::UnknownIssuer,
        CertificateError::UnknownRevocationStatus => {
            CertificateInvalidReason::UnknownRevocationStatus
        }
        CertificateError::BadSignature => CertificateInvalidReason::BadSignature,
        CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. } => {
            CertificateInvalidReason::NameMismatch
        }
        CertificateError::InvalidPurpose => CertificateInvalidReason::IncompatibleUsage,
        CertificateError::ApplicationVerificationFailure => {
            CertificateInvalidReason::ApplicationVerificationFailure
        }
        _ => CertificateInvalidReason::Other,
    }
}

/// Finds the rustls error behind an I/O error raised by a TLS stream.
pub fn rustls_error(error: &std::io::Error) -> Option<&rustls::Error> {
    error.get_ref()?.downcast_ref::<rustls::Error>()
}

pub fn tls_error(error: &rustls::Error) -> ProbeError {
    let (reason, alert) = match error {
        rustls::Error::InvalidCertificate(cert) => (Some(certificate_reason(cert)), None),
        rustls::Error::AlertReceived(description) => {
            (None, TlsAlert::from_code(u8::from(*description)))
        }
        _ => (None, None),
    };
    ProbeError::Tls {
        message: error.to_string(),
        reason,
        alert,
    }
}

/// Classifies a failed TLS handshake. Errors that are not rustls errors stay
/// unclassified.
pub fn tls_handshake_error(error: &std::io::Error) -> ProbeError {
    match rustls_error(error) {
        Some(inner) => tls_error(inner),
        None => ProbeError::Tls {
            message: error.to_string(),
            reason: None,
            alert: None,
        },
    }
}

#[cfg(feature = "dns-over-quic")]
pub fn quic_error_code(error: &quinn::ConnectionError) -> Option<QuicErrorCode> {
    use quinn::ConnectionError;

    match error {
        ConnectionError::TransportError(transport) => {
            Some(QuicErrorCode(u64::from(transport.code)))
        }
        ConnectionError::ConnectionClosed(close) => {
            Some(QuicErrorCode(u64::from(close.error_code)))
        }
        ConnectionError::ApplicationClosed(close) => {
            Some(QuicErrorCode(close.error_code.into_inner()))
        }
        ConnectionError::VersionMismatch => Some(QuicErrorCode::PROTOCOL_VIOLATION),
        _ => None,
    }
}

#[cfg(feature = "dns-over-quic")]
pub fn quic_error(error: &quinn::ConnectionError) -> ProbeError {
    let code = quic_error_code(error);
    let message = match code.and_then(QuicErrorCode::tls_alert) {
        Some(alert) => format!("{} (TLS alert {})", error, alert),
        None => error.to_string(),
    };
    ProbeError::Quic {
        message,
        code: code.map(|code| code.0),
    }
}
