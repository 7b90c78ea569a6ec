use crate::errors::ProbeError;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

/// Wire transport selected by the upstream URL scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Udp,
    Tcp,
    Tls,
    Https,
    Quic,
}

impl Scheme {
    pub const ALL: [Scheme; 5] = [
        Scheme::Udp,
        Scheme::Tcp,
        Scheme::Tls,
        Scheme::Https,
        Scheme::Quic,
    ];

    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Udp | Scheme::Tcp => 53,
            Scheme::Tls => 853,
            Scheme::Https => 443,
            // draft-ietf-dprive-dnsoquic-00 §8.2.1: early experiments MAY use 784
            Scheme::Quic => 784,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Udp => "udp",
            Scheme::Tcp => "tcp",
            Scheme::Tls => "tls",
            Scheme::Https => "https",
            Scheme::Quic => "quic",
        }
    }

    pub fn protocol_name(self) -> &'static str {
        match self {
            Scheme::Udp => "UDP",
            Scheme::Tcp => "TCP",
            Scheme::Tls => "TLS",
            Scheme::Https => "HTTPS",
            Scheme::Quic => "QUIC",
        }
    }
}

impl FromStr for Scheme {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scheme::ALL
            .into_iter()
            .find(|scheme| scheme.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ProbeError::UnsupportedScheme(s.to_string()))
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed `scheme://host[:port][/path]` upstream with its port filled in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpstreamUrl {
    scheme: Scheme,
    host: String,
    port: u16,
    explicit_port: bool,
    path: String,
}

impl UpstreamUrl {
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Host without IPv6 brackets.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether the port came from the input rather than the scheme default.
    pub fn has_explicit_port(&self) -> bool {
        self.explicit_port
    }

    /// Path and query as given, empty when absent.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn host_ip(&self) -> Option<IpAddr> {
        self.host.parse().ok()
    }

    /// `host:port` with IPv6 hosts bracketed.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

fn split_host_port(authority: &str) -> Result<(&str, Option<&str>), String> {
    if let Some(rest) = authority.strip_prefix('[') {
        let end = rest
            .find(']')
            .ok_or_else(|| format!("unterminated IPv6 literal in '{}'", authority))?;
        let host = &rest[..end];
        let after = &rest[end + 1..];
        if after.is_empty() {
            return Ok((host, None));
        }
        let port = after
            .strip_prefix(':')
            .ok_or_else(|| format!("unexpected characters after IPv6 literal in '{}'", authority))?;
        return Ok((host, Some(port)));
    }
    match authority.rsplit_once(':') {
        Some((host, _)) if host.contains(':') => {
            Err(format!("IPv6 literal must be bracketed in '{}'", authority))
        }
        Some((host, port)) => Ok((host, Some(port))),
        None => Ok((authority, None)),
    }
}

impl FromStr for UpstreamUrl {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme_str, rest) = s.split_once("://").ok_or_else(|| {
            ProbeError::InvalidUpstream(format!(
                "'{}' is not scheme-qualified, expected scheme://host[:port]",
                s
            ))
        })?;
        let scheme: Scheme = scheme_str.parse()?;

        let path_start = rest.find(['/', '?']).unwrap_or(rest.len());
        let (authority, path) = rest.split_at(path_start);

        let (host, port_str) =
            split_host_port(authority).map_err(ProbeError::InvalidUpstream)?;
        if host.is_empty() {
            return Err(ProbeError::InvalidUpstream(format!("missing host in '{}'", s)));
        }

        let (port, explicit_port) = match port_str {
            Some(p) => {
                let port = p.parse::<u16>().map_err(|e| {
                    ProbeError::InvalidUpstream(format!("invalid port in '{}': {}", s, e))
                })?;
                (port, true)
            }
            None => (scheme.default_port(), false),
        };

        Ok(UpstreamUrl {
            scheme,
            host: host.to_string(),
            port,
            explicit_port,
            path: path.to_string(),
        })
    }
}

impl fmt::Display for UpstreamUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.authority(), self.path)
    }
}

/// An upstream URL bound to the socket addresses it resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamAddress {
    url: UpstreamUrl,
    addresses: Vec<SocketAddr>,
}

impl UpstreamAddress {
    pub fn new(url: UpstreamUrl, addresses: Vec<SocketAddr>) -> Result<Self, ProbeError> {
        if addresses.is_empty() {
            return Err(ProbeError::Resolution {
                host: url.host().to_string(),
                reason: "no usable addresses".to_string(),
            });
        }
        Ok(Self { url, addresses })
    }

    pub fn url(&self) -> &UpstreamUrl {
        &self.url
    }

    pub fn scheme(&self) -> Scheme {
        self.url.scheme()
    }

    pub fn host(&self) -> &str {
        self.url.host()
    }

    pub fn port(&self) -> u16 {
        self.url.port()
    }

    /// Never empty.
    pub fn addresses(&self) -> &[SocketAddr] {
        &self.addresses
    }
}

impl fmt::Display for UpstreamAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}
