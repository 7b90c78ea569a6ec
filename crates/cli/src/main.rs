use anyhow::Context;
use clap::Parser;
use dnsperf_domain::config::CliOverrides;
use dnsperf_infrastructure::dns::transport::{create_client, Options};
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{DNSClass, Name, RecordType};
use std::net::IpAddr;
use std::str::FromStr;
use tracing::{info, warn};

mod bootstrap;
mod report;

#[derive(Parser)]
#[command(name = "dnsperf")]
#[command(version)]
#[command(about = "Measure DNS exchanges over UDP, TCP, DoT, DoH and DoQ")]
struct Cli {
    /// Upstream, e.g. udp://9.9.9.9, tls://dns.google, https://dns.google/dns-query, quic://dns.adguard.com
    upstream: String,

    /// Name to query
    #[arg(default_value = "example.com.")]
    name: String,

    /// Record type
    #[arg(short = 't', long = "type", default_value = "A")]
    record_type: String,

    /// Number of sequential exchanges
    #[arg(short = 'n', long, default_value_t = 1)]
    count: usize,

    /// Per-operation timeout in milliseconds, 0 disables it
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Connect to these IPs instead of resolving the upstream host
    #[arg(long = "server-ip", value_name = "IP")]
    server_ips: Vec<IpAddr>,

    /// Accept any certificate
    #[arg(long)]
    insecure: bool,

    /// Verify the chain but not the server name
    #[arg(long)]
    skip_common_name: bool,

    /// Local UDP port for QUIC
    #[arg(long)]
    local_port: Option<u16>,

    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

fn build_query(name: &str, record_type: &str) -> anyhow::Result<Message> {
    let name = Name::from_str(name).with_context(|| format!("invalid query name '{}'", name))?;
    let record_type = RecordType::from_str(&record_type.to_ascii_uppercase())
        .with_context(|| format!("unknown record type '{}'", record_type))?;

    let mut query = Query::new();
    query.set_name(name);
    query.set_query_type(record_type);
    query.set_query_class(DNSClass::IN);

    let mut message = Message::new(fastrand::u16(..), MessageType::Query, OpCode::Query);
    message.set_recursion_desired(true);
    message.add_query(query);
    Ok(message)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let overrides = CliOverrides {
        timeout_ms: cli.timeout_ms,
        server_ips: cli.server_ips.clone(),
        insecure_skip_verify: cli.insecure,
        skip_common_name: cli.skip_common_name,
        local_port: cli.local_port,
        log_level: cli.log_level.clone(),
    };
    let config = bootstrap::load_config(cli.config.as_deref(), overrides)?;
    bootstrap::init_logging(&config);

    let client = create_client(&cli.upstream, Options::from_config(&config))
        .await
        .with_context(|| format!("failed to set up client for {}", cli.upstream))?;
    let protocol = client.protocol_name();
    info!(upstream = %cli.upstream, protocol, count = cli.count, "Starting exchanges");

    let mut failures = 0;
    for attempt in 1..=cli.count {
        let query = build_query(&cli.name, &cli.record_type)?;
        let result = client.exchange(&query).await;
        if let Some(error) = result.error() {
            failures += 1;
            warn!(attempt, error = %error, "Exchange failed");
        }

        let report = report::ExchangeReport::new(&cli.upstream, protocol, attempt, &result);
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    if failures == cli.count && cli.count > 0 {
        anyhow::bail!("all {} exchanges failed", failures);
    }
    Ok(())
}
