//! Stable numeric codes for classified TLS and QUIC failures.
//!
//! These values end up in serialized measurements, so they must never be
//! renumbered.

use serde::{Serialize, Serializer};
use std::fmt;

/// Why a presented certificate chain was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CertificateInvalidReason {
    NotAuthorizedToSign,
    Expired,
    NotValidYet,
    Revoked,
    UnknownIssuer,
    BadSignature,
    NameMismatch,
    IncompatibleUsage,
    BadEncoding,
    UnhandledCriticalExtension,
    UnknownRevocationStatus,
    ApplicationVerificationFailure,
    Other,
}

impl CertificateInvalidReason {
    pub fn code(self) -> u8 {
        match self {
            Self::NotAuthorizedToSign => 0,
            Self::Expired => 1,
            Self::NotValidYet => 2,
            Self::Revoked => 3,
            Self::UnknownIssuer => 4,
            Self::BadSignature => 5,
            Self::NameMismatch => 6,
            Self::IncompatibleUsage => 7,
            Self::BadEncoding => 8,
            Self::UnhandledCriticalExtension => 9,
            Self::UnknownRevocationStatus => 10,
            Self::ApplicationVerificationFailure => 11,
            Self::Other => 255,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotAuthorizedToSign => "not_authorized_to_sign",
            Self::Expired => "expired",
            Self::NotValidYet => "not_valid_yet",
            Self::Revoked => "revoked",
            Self::UnknownIssuer => "unknown_issuer",
            Self::BadSignature => "bad_signature",
            Self::NameMismatch => "name_mismatch",
            Self::IncompatibleUsage => "incompatible_usage",
            Self::BadEncoding => "bad_encoding",
            Self::UnhandledCriticalExtension => "unhandled_critical_extension",
            Self::UnknownRevocationStatus => "unknown_revocation_status",
            Self::ApplicationVerificationFailure => "application_verification_failure",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for CertificateInvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.code())
    }
}

impl Serialize for CertificateInvalidReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// TLS alert descriptions (RFC 8446 §6 and RFC 5246 §7.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TlsAlert {
    CloseNotify = 0,
    UnexpectedMessage = 10,
    BadRecordMac = 20,
    DecryptionFailed = 21,
    RecordOverflow = 22,
    DecompressionFailure = 30,
    HandshakeFailure = 40,
    BadCertificate = 42,
    UnsupportedCertificate = 43,
    CertificateRevoked = 44,
    CertificateExpired = 45,
    CertificateUnknown = 46,
    IllegalParameter = 47,
    UnknownCa = 48,
    AccessDenied = 49,
    DecodeError = 50,
    DecryptError = 51,
    ExportRestriction = 60,
    ProtocolVersion = 70,
    InsufficientSecurity = 71,
    InternalError = 80,
    InappropriateFallback = 86,
    UserCanceled = 90,
    NoRenegotiation = 100,
    MissingExtension = 109,
    UnsupportedExtension = 110,
    UnrecognizedName = 112,
    BadCertificateStatusResponse = 113,
    UnknownPskIdentity = 115,
    CertificateRequired = 116,
    NoApplicationProtocol = 120,
}

impl TlsAlert {
    pub fn from_code(code: u8) -> Option<Self> {
        let alert = match code {
            0 => Self::CloseNotify,
            10 => Self::UnexpectedMessage,
            20 => Self::BadRecordMac,
            21 => Self::DecryptionFailed,
            22 => Self::RecordOverflow,
            30 => Self::DecompressionFailure,
            40 => Self::HandshakeFailure,
            42 => Self::BadCertificate,
            43 => Self::UnsupportedCertificate,
            44 => Self::CertificateRevoked,
            45 => Self::CertificateExpired,
            46 => Self::CertificateUnknown,
            47 => Self::IllegalParameter,
            48 => Self::UnknownCa,
            49 => Self::AccessDenied,
            50 => Self::DecodeError,
            51 => Self::DecryptError,
            60 => Self::ExportRestriction,
            70 => Self::ProtocolVersion,
            71 => Self::InsufficientSecurity,
            80 => Self::InternalError,
            86 => Self::InappropriateFallback,
            90 => Self::UserCanceled,
            100 => Self::NoRenegotiation,
            109 => Self::MissingExtension,
            110 => Self::UnsupportedExtension,
            112 => Self::UnrecognizedName,
            113 => Self::BadCertificateStatusResponse,
            115 => Self::UnknownPskIdentity,
            116 => Self::CertificateRequired,
            120 => Self::NoApplicationProtocol,
            _ => return None,
        };
        Some(alert)
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Description as written in the RFC registry.
    pub fn name(self) -> &'static str {
        match self {
            Self::CloseNotify => "close_notify",
            Self::UnexpectedMessage => "unexpected_message",
            Self::BadRecordMac => "bad_record_mac",
            Self::DecryptionFailed => "decryption_failed",
            Self::RecordOverflow => "record_overflow",
            Self::DecompressionFailure => "decompression_failure",
            Self::HandshakeFailure => "handshake_failure",
            Self::BadCertificate => "bad_certificate",
            Self::UnsupportedCertificate => "unsupported_certificate",
            Self::CertificateRevoked => "certificate_revoked",
            Self::CertificateExpired => "certificate_expired",
            Self::CertificateUnknown => "certificate_unknown",
            Self::IllegalParameter => "illegal_parameter",
            Self::UnknownCa => "unknown_ca",
            Self::AccessDenied => "access_denied",
            Self::DecodeError => "decode_error",
            Self::DecryptError => "decrypt_error",
            Self::ExportRestriction => "export_restriction",
            Self::ProtocolVersion => "protocol_version",
            Self::InsufficientSecurity => "insufficient_security",
            Self::InternalError => "internal_error",
            Self::InappropriateFallback => "inappropriate_fallback",
            Self::UserCanceled => "user_canceled",
            Self::NoRenegotiation => "no_renegotiation",
            Self::MissingExtension => "missing_extension",
            Self::UnsupportedExtension => "unsupported_extension",
            Self::UnrecognizedName => "unrecognized_name",
            Self::BadCertificateStatusResponse => "bad_certificate_status_response",
            Self::UnknownPskIdentity => "unknown_psk_identity",
            Self::CertificateRequired => "certificate_required",
            Self::NoApplicationProtocol => "no_application_protocol",
        }
    }
}

impl fmt::Display for TlsAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

/// A QUIC transport or application error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct QuicErrorCode(pub u64);

impl QuicErrorCode {
    pub const NO_ERROR: Self = Self(0x0);
    pub const INTERNAL_ERROR: Self = Self(0x1);
    pub const CONNECTION_REFUSED: Self = Self(0x2);
    pub const PROTOCOL_VIOLATION: Self = Self(0xa);
    pub const CRYPTO_ERROR_BASE: u64 = 0x100;

    /// Codes 0x100..=0x1ff carry a TLS alert in the low byte.
    pub fn is_crypto_error(self) -> bool {
        (Self::CRYPTO_ERROR_BASE..=0x1ff).contains(&self.0)
    }

    pub fn tls_alert(self) -> Option<TlsAlert> {
        if self.is_crypto_error() {
            TlsAlert::from_code((self.0 & 0xff) as u8)
        } else {
            None
        }
    }

    pub fn name(self) -> &'static str {
        match self.0 {
            0x0 => "NO_ERROR",
            0x1 => "INTERNAL_ERROR",
            0x2 => "CONNECTION_REFUSED",
            0x3 => "FLOW_CONTROL_ERROR",
            0x4 => "STREAM_LIMIT_ERROR",
            0x5 => "STREAM_STATE_ERROR",
            0x6 => "FINAL_SIZE_ERROR",
            0x7 => "FRAME_ENCODING_ERROR",
            0x8 => "TRANSPORT_PARAMETER_ERROR",
            0x9 => "CONNECTION_ID_LIMIT_ERROR",
            0xa => "PROTOCOL_VIOLATION",
            0xb => "INVALID_TOKEN",
            0xc => "APPLICATION_ERROR",
            0xd => "CRYPTO_BUFFER_EXCEEDED",
            0xe => "KEY_UPDATE_ERROR",
            0xf => "AEAD_LIMIT_REACHED",
            0x10 => "NO_VIABLE_PATH",
            0x100..=0x1ff => "CRYPTO_ERROR",
            _ => "UNKNOWN",
        }
    }
}

impl fmt::Display for QuicErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tls_alert() {
            Some(alert) => write!(f, "{} ({:#x}, alert {})", self.name(), self.0, alert.name()),
            None => write!(f, "{} ({:#x})", self.name(), self.0),
        }
    }
}
