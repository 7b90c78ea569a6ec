mod helpers;

use dnsperf_domain::{ProbeError, Scheme};
use dnsperf_infrastructure::dns::transport::{create_client, create_client_with_resolver, Options};
use dnsperf_infrastructure::dns::DnsClient;
use helpers::CountingResolver;
use std::net::SocketAddr;

fn resolver() -> CountingResolver {
    CountingResolver::new(vec!["192.0.2.53:0".parse::<SocketAddr>().unwrap()])
}

#[tokio::test]
async fn test_default_port_per_scheme() {
    let cases = [
        ("udp://dns.example", 53, "UDP"),
        ("tcp://dns.example", 53, "TCP"),
        ("tls://dns.example", 853, "TLS"),
        ("https://dns.example/dns-query", 443, "HTTPS"),
        ("quic://dns.example", 784, "QUIC"),
    ];

    for (url, port, protocol) in cases {
        let resolver = resolver();
        let client = create_client_with_resolver(url, Options::default(), &resolver)
            .await
            .unwrap();

        assert_eq!(resolver.calls(), 1, "{}", url);
        assert_eq!(client.core().address().port(), port, "{}", url);
        assert_eq!(client.core().address().addresses()[0].port(), port, "{}", url);
        assert_eq!(DnsClient::protocol_name(&client), protocol);
    }
}

#[tokio::test]
async fn test_explicit_port_wins() {
    let resolver = resolver();
    let client = create_client_with_resolver("tls://dns.example:8853", Options::default(), &resolver)
        .await
        .unwrap();
    assert_eq!(client.core().address().scheme(), Scheme::Tls);
    assert_eq!(client.core().address().port(), 8853);
}

#[tokio::test]
async fn test_ip_override_skips_resolver() {
    let resolver = resolver();
    let options = Options::default().with_server_ips(vec![
        "203.0.113.7".parse().unwrap(),
        "2001:db8::7".parse().unwrap(),
    ]);

    let client = create_client_with_resolver("tcp://dns.example:5353", options, &resolver)
        .await
        .unwrap();

    assert_eq!(resolver.calls(), 0);
    let addrs = client.core().address().addresses();
    assert_eq!(addrs.len(), 2);
    assert_eq!(addrs[0], "203.0.113.7:5353".parse().unwrap());
    assert_eq!(addrs[1], "[2001:db8::7]:5353".parse().unwrap());
}

#[tokio::test]
async fn test_ip_literal_host_needs_no_lookup() {
    let client = create_client("udp://127.0.0.1:5300", Options::default())
        .await
        .unwrap();
    assert_eq!(
        client.core().address().addresses(),
        &["127.0.0.1:5300".parse::<SocketAddr>().unwrap()]
    );
}

#[tokio::test]
async fn test_unsupported_scheme() {
    let err = create_client_with_resolver("sdns://AQcAAAAAAAAA", Options::default(), &resolver())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ProbeError::UnsupportedScheme(_)));
    assert!(err.is_construction());
}

#[tokio::test]
async fn test_missing_scheme_is_invalid() {
    let resolver = resolver();
    let err = create_client_with_resolver("dns.example:53", Options::default(), &resolver)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ProbeError::InvalidUpstream(_)));
    assert_eq!(resolver.calls(), 0);
}

#[tokio::test]
async fn test_unresolvable_host_fails_construction() {
    let err = create_client("udp://does-not-exist.invalid", Options::default())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ProbeError::Resolution { .. }));
}
