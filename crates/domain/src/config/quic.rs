use serde::{Deserialize, Serialize};

pub const DOQ_VERSION_FINAL: &str = "doq";
pub const DOQ_VERSION_I00: &str = "doq-i00";
pub const DOQ_VERSION_I01: &str = "doq-i01";
pub const DOQ_VERSION_I02: &str = "doq-i02";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct QuicConfig {
    /// DoQ ALPN tokens offered during the handshake, in preference order.
    #[serde(default = "default_allowed_versions")]
    pub allowed_versions: Vec<String>,

    /// Local UDP port for the QUIC endpoint; ephemeral when unset.
    #[serde(default)]
    pub local_port: Option<u16>,

    /// Keep address-validation tokens between exchanges.
    #[serde(default = "default_true")]
    pub token_store: bool,
}

impl Default for QuicConfig {
    fn default() -> Self {
        Self {
            allowed_versions: default_allowed_versions(),
            local_port: None,
            token_store: true,
        }
    }
}

fn default_allowed_versions() -> Vec<String> {
    vec![
        DOQ_VERSION_FINAL.to_string(),
        DOQ_VERSION_I02.to_string(),
        DOQ_VERSION_I01.to_string(),
        DOQ_VERSION_I00.to_string(),
    ]
}

fn default_true() -> bool {
    true
}
