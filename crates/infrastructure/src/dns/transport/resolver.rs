use async_trait::async_trait;
use dnsperf_domain::{ProbeError, UpstreamUrl};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::debug;

const RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bootstrap resolution of an upstream host.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    async fn resolve(&self, url: &UpstreamUrl) -> Result<Vec<SocketAddr>, ProbeError>;
}

/// Resolves through the operating system (`getaddrinfo`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl AddressResolver for SystemResolver {
    async fn resolve(&self, url: &UpstreamUrl) -> Result<Vec<SocketAddr>, ProbeError> {
        if let Some(ip) = url.host_ip() {
            return Ok(vec![SocketAddr::new(ip, url.port())]);
        }
        resolve_all(url.host(), url.port(), RESOLVE_TIMEOUT).await
    }
}

/// Resolves a hostname to all its IP addresses (IPv4 + IPv6), lookup order
/// kept and duplicates dropped.
pub async fn resolve_all(
    hostname: &str,
    port: u16,
    timeout: Duration,
) -> Result<Vec<SocketAddr>, ProbeError> {
    let target = format!("{}:{}", hostname, port);
    let resolution_error = |reason: String| ProbeError::Resolution {
        host: hostname.to_string(),
        reason,
    };

    let addrs_iter = tokio::time::timeout(timeout, tokio::net::lookup_host(&target))
        .await
        .map_err(|_| resolution_error(format!("lookup timed out after {:?}", timeout)))?
        .map_err(|e| resolution_error(e.to_string()))?;

    let mut addrs: Vec<SocketAddr> = Vec::new();
    for addr in addrs_iter {
        if !addrs.contains(&addr) {
            addrs.push(addr);
        }
    }

    if addrs.is_empty() {
        return Err(resolution_error("no addresses found".to_string()));
    }

    debug!(host = %hostname, count = addrs.len(), "Resolved upstream host");
    Ok(addrs)
}
