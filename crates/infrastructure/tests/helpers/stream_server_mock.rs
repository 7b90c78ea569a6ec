use super::certs::TestCert;
use super::dns_wire;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;

/// Length-framed DNS responder over TCP, optionally wrapped in TLS.
pub struct MockStreamServer {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl MockStreamServer {
    pub async fn start_tcp() -> Self {
        Self::spawn(None, None).await
    }

    pub async fn start_tls(cert: &TestCert) -> Self {
        Self::spawn(Some(cert.server_config(&[], false)), None).await
    }

    /// TLS responder that always answers with `reply_id`.
    pub async fn start_tls_with_reply_id(cert: &TestCert, reply_id: u16) -> Self {
        Self::spawn(Some(cert.server_config(&[], false)), Some(reply_id)).await
    }

    /// TLS responder limited to TLS 1.2.
    pub async fn start_tls12(cert: &TestCert) -> Self {
        Self::spawn(Some(cert.tls12_server_config()), None).await
    }

    async fn spawn(config: Option<rustls::ServerConfig>, reply_id: Option<u16>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let acceptor = config.map(|c| TlsAcceptor::from(Arc::new(c)));
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = connections.clone();

        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let acceptor = acceptor.clone();
                tokio::spawn(async move {
                    match acceptor {
                        Some(acceptor) => {
                            if let Ok(tls) = acceptor.accept(stream).await {
                                serve(tls, reply_id).await;
                            }
                        }
                        None => serve(stream, reply_id).await,
                    }
                });
            }
        });

        Self {
            addr,
            connections,
            task,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for MockStreamServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve<S>(mut stream: S, reply_id: Option<u16>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let mut len_buf = [0u8; 2];
        if stream.read_exact(&mut len_buf).await.is_err() {
            return;
        }
        let mut query = vec![0u8; u16::from_be_bytes(len_buf) as usize];
        if stream.read_exact(&mut query).await.is_err() {
            return;
        }

        let mut response = dns_wire::answer(&query, 0);
        if let Some(id) = reply_id {
            response[..2].copy_from_slice(&id.to_be_bytes());
        }

        let mut frame = (response.len() as u16).to_be_bytes().to_vec();
        frame.extend_from_slice(&response);
        if stream.write_all(&frame).await.is_err() {
            return;
        }
        let _ = stream.flush().await;
    }
}
