use super::certs::TestCert;
use super::dns_wire;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bytes::Bytes;
use http::{header, Request, Response, StatusCode};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;

#[derive(Clone, Copy)]
struct Behaviour {
    status: StatusCode,
    reply_id: Option<u16>,
}

/// DoH GET responder over TLS. HTTP/1.1 or HTTP/2 depending on the ALPN
/// it advertises.
pub struct MockDohServer {
    addr: SocketAddr,
    targets: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

impl MockDohServer {
    pub async fn start(cert: &TestCert) -> Self {
        Self::spawn(cert, b"http/1.1", StatusCode::OK, None).await
    }

    pub async fn start_h2(cert: &TestCert) -> Self {
        Self::spawn(cert, b"h2", StatusCode::OK, None).await
    }

    pub async fn start_with_status(cert: &TestCert, status: u16) -> Self {
        let status = StatusCode::from_u16(status).unwrap();
        Self::spawn(cert, b"http/1.1", status, None).await
    }

    /// HTTP/2 responder that always answers with `reply_id`.
    pub async fn start_h2_with_reply_id(cert: &TestCert, reply_id: u16) -> Self {
        Self::spawn(cert, b"h2", StatusCode::OK, Some(reply_id)).await
    }

    async fn spawn(cert: &TestCert, alpn: &[u8], status: StatusCode, reply_id: Option<u16>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let acceptor = TlsAcceptor::from(Arc::new(cert.server_config(&[alpn], false)));
        let targets = Arc::new(Mutex::new(Vec::new()));
        let seen = targets.clone();
        let behaviour = Behaviour { status, reply_id };

        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let acceptor = acceptor.clone();
                let seen = seen.clone();
                tokio::spawn(async move {
                    let Ok(tls) = acceptor.accept(stream).await else {
                        return;
                    };
                    let service = service_fn(move |request: Request<Incoming>| {
                        let response = respond(&request, behaviour, &seen);
                        async move { Ok::<_, Infallible>(response) }
                    });
                    let _ = auto::Builder::new(TokioExecutor::new())
                        .serve_connection(TokioIo::new(tls), service)
                        .await;
                });
            }
        });

        Self {
            addr,
            targets,
            task,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Origin-form targets of every request received.
    pub fn targets(&self) -> Vec<String> {
        self.targets.lock().unwrap().clone()
    }
}

fn respond(
    request: &Request<Incoming>,
    behaviour: Behaviour,
    seen: &Mutex<Vec<String>>,
) -> Response<Full<Bytes>> {
    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_default();
    seen.lock().unwrap().push(target.clone());

    let query = target
        .split(['?', '&'])
        .find_map(|part| part.strip_prefix("dns="))
        .and_then(|encoded| URL_SAFE_NO_PAD.decode(encoded).ok());

    let (status, body) = match (behaviour.status, query) {
        (StatusCode::OK, Some(query)) => {
            let mut body = dns_wire::answer(&query, 0);
            if let Some(id) = behaviour.reply_id {
                body[..2].copy_from_slice(&id.to_be_bytes());
            }
            (StatusCode::OK, body)
        }
        (StatusCode::OK, None) => (StatusCode::BAD_REQUEST, Vec::new()),
        (status, _) => (status, Vec::new()),
    };

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/dns-message")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

impl Drop for MockDohServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
