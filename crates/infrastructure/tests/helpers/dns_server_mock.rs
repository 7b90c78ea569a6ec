use super::dns_wire;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;

/// UDP responder answering every query with a fixed A record.
pub struct MockDnsServer {
    addr: SocketAddr,
    queries: Arc<AtomicUsize>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockDnsServer {
    pub async fn start() -> Result<Self, std::io::Error> {
        Self::start_with_rcode(0).await
    }

    pub async fn start_with_rcode(rcode: u8) -> Result<Self, std::io::Error> {
        Self::spawn(Some(rcode)).await
    }

    /// Receives queries but never answers.
    pub async fn start_silent() -> Result<Self, std::io::Error> {
        Self::spawn(None).await
    }

    async fn spawn(rcode: Option<u8>) -> Result<Self, std::io::Error> {
        let socket = UdpSocket::bind("127.0.0.1:0").await?;
        let addr = socket.local_addr()?;
        let queries = Arc::new(AtomicUsize::new(0));
        let counter = queries.clone();

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        break;
                    }
                    result = socket.recv_from(&mut buf) => {
                        if let Ok((len, peer)) = result {
                            counter.fetch_add(1, Ordering::SeqCst);
                            if let Some(rcode) = rcode {
                                let response = dns_wire::answer(&buf[..len], rcode);
                                let _ = socket.send_to(&response, peer).await;
                            }
                        }
                    }
                }
            }
        });

        Ok(Self {
            addr,
            queries,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockDnsServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
