use super::certs::TestCert;
use super::dns_wire;
use quinn::crypto::rustls::QuicServerConfig;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Default)]
pub struct QuicObservations {
    /// DNS IDs exactly as they arrived on the wire.
    pub wire_ids: Mutex<Vec<u16>>,
    pub streams: Mutex<usize>,
    pub close_reasons: Mutex<Vec<quinn::ConnectionError>>,
}

/// DoQ responder. `doq` replies are length-prefixed, draft ALPNs are not.
pub struct MockQuicServer {
    addr: SocketAddr,
    endpoint: quinn::Endpoint,
    alpn: String,
    observed: Arc<QuicObservations>,
    task: JoinHandle<()>,
}

impl MockQuicServer {
    pub async fn start(cert: &TestCert, alpn: &str) -> Self {
        let endpoint =
            quinn::Endpoint::server(server_config(cert, alpn), "127.0.0.1:0".parse().unwrap())
                .unwrap();
        let accept_endpoint = endpoint.clone();
        let addr = endpoint.local_addr().unwrap();
        let observed = Arc::new(QuicObservations::default());
        let state = observed.clone();
        let framed = alpn == "doq";

        let task = tokio::spawn(async move {
            while let Some(incoming) = accept_endpoint.accept().await {
                let state = state.clone();
                tokio::spawn(async move {
                    let Ok(connection) = incoming.await else {
                        return;
                    };
                    loop {
                        match connection.accept_bi().await {
                            Ok((mut send, mut recv)) => {
                                *state.streams.lock().unwrap() += 1;
                                let Ok(request) = recv.read_to_end(65535).await else {
                                    continue;
                                };
                                let query = if framed { &request[2..] } else { &request[..] };
                                state.wire_ids.lock().unwrap().push(dns_wire::wire_id(query));

                                let response = dns_wire::answer(query, 0);
                                let mut out = Vec::new();
                                if framed {
                                    out.extend_from_slice(&(response.len() as u16).to_be_bytes());
                                }
                                out.extend_from_slice(&response);
                                let _ = send.write_all(&out).await;
                                let _ = send.finish();
                            }
                            Err(e) => {
                                state.close_reasons.lock().unwrap().push(e);
                                return;
                            }
                        }
                    }
                });
            }
        });

        Self {
            addr,
            endpoint,
            alpn: alpn.to_string(),
            observed,
            task,
        }
    }

    /// Swaps in a fresh TLS config. Sessions issued before the swap can no
    /// longer be resumed, so their early data is rejected.
    pub fn rotate_session_keys(&self, cert: &TestCert) {
        self.endpoint
            .set_server_config(Some(server_config(cert, &self.alpn)));
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn wire_ids(&self) -> Vec<u16> {
        self.observed.wire_ids.lock().unwrap().clone()
    }

    pub fn streams(&self) -> usize {
        *self.observed.streams.lock().unwrap()
    }

    /// Waits until at least one connection has been closed.
    pub async fn wait_for_close(&self) -> Option<quinn::ConnectionError> {
        for _ in 0..100 {
            if let Some(reason) = self.observed.close_reasons.lock().unwrap().first() {
                return Some(reason.clone());
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        None
    }
}

fn server_config(cert: &TestCert, alpn: &str) -> quinn::ServerConfig {
    let mut crypto = cert.server_config(&[alpn.as_bytes()], true);
    crypto.max_early_data_size = u32::MAX;
    quinn::ServerConfig::with_crypto(Arc::new(QuicServerConfig::try_from(crypto).unwrap()))
}

impl Drop for MockQuicServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
