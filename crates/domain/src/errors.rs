use crate::codes::{CertificateInvalidReason, TlsAlert};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("Invalid upstream address: {0}")]
    InvalidUpstream(String),

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Failed to resolve {host}: {reason}")]
    Resolution { host: String, reason: String },

    #[error("Invalid TLS configuration: {0}")]
    TlsConfig(String),

    #[error("All dialers failed to initialize connection: {}", .attempts.join("; "))]
    Dial { attempts: Vec<String> },

    #[error("TLS handshake failed: {message}")]
    Tls {
        message: String,
        reason: Option<CertificateInvalidReason>,
        alert: Option<TlsAlert>,
    },

    #[error("QUIC connection failed: {message}")]
    Quic { message: String, code: Option<u64> },

    #[error("QUIC protocol violation: {0}")]
    QuicProtocolViolation(String),

    #[error("DNS message codec error: {0}")]
    Codec(String),

    #[error("Unexpected upstream response: {0}")]
    Protocol(String),

    #[error("DNS ID mismatch: sent {expected:#06x}, received {actual:#06x}")]
    IdMismatch { expected: u16, actual: u16 },

    #[error("Upstream answered with response code {0}")]
    ResponseCode(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Timeout during {operation} with {server}")]
    Timeout { operation: String, server: String },
}

impl ProbeError {
    /// Errors raised while building a client, before any exchange runs.
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            ProbeError::InvalidUpstream(_)
                | ProbeError::UnsupportedScheme(_)
                | ProbeError::Resolution { .. }
                | ProbeError::TlsConfig(_)
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ProbeError::Timeout { .. })
    }

    pub fn timeout(operation: impl Into<String>, server: impl ToString) -> Self {
        ProbeError::Timeout {
            operation: operation.into(),
            server: server.to_string(),
        }
    }
}
