use serde::{Deserialize, Serialize};
use std::fmt;

/// TLS protocol versions accepted in a version range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub enum TlsVersion {
    #[serde(rename = "1.0")]
    Tls10,
    #[serde(rename = "1.1")]
    Tls11,
    #[serde(rename = "1.2")]
    Tls12,
    #[serde(rename = "1.3")]
    Tls13,
}

impl TlsVersion {
    /// Wire value, e.g. `0x0304` for TLS 1.3.
    pub fn code(self) -> u16 {
        match self {
            TlsVersion::Tls10 => 0x0301,
            TlsVersion::Tls11 => 0x0302,
            TlsVersion::Tls12 => 0x0303,
            TlsVersion::Tls13 => 0x0304,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0x0301 => Some(TlsVersion::Tls10),
            0x0302 => Some(TlsVersion::Tls11),
            0x0303 => Some(TlsVersion::Tls12),
            0x0304 => Some(TlsVersion::Tls13),
            _ => None,
        }
    }
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TlsVersion::Tls10 => "TLS 1.0",
            TlsVersion::Tls11 => "TLS 1.1",
            TlsVersion::Tls12 => "TLS 1.2",
            TlsVersion::Tls13 => "TLS 1.3",
        };
        f.write_str(name)
    }
}

/// Certificate and protocol-version policy for TLS and QUIC handshakes.
///
/// `insecure_skip_verify` and `skip_common_name` are independent:
/// the latter still requires a chain trusted by the configured roots,
/// it only drops the server-name check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TlsPolicy {
    #[serde(default)]
    pub min_version: Option<TlsVersion>,

    #[serde(default)]
    pub max_version: Option<TlsVersion>,

    #[serde(default)]
    pub insecure_skip_verify: bool,

    #[serde(default)]
    pub skip_common_name: bool,
}

impl TlsPolicy {
    /// Whether `version` lies inside the configured range.
    pub fn allows(&self, version: TlsVersion) -> bool {
        self.min_version.map_or(true, |min| version >= min)
            && self.max_version.map_or(true, |max| version <= max)
    }
}
