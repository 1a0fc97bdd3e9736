//! Local HTTPS server with a self-signed certificate.
//!
//! Paths select the reply:
//! - `/redirect` answers `302` pointing at `/hello`
//! - `/truncated` promises 100 bytes, sends 5 and closes
//! - `/stall` reads the request and never answers
//! - anything else answers `200` with `hello`

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    task::JoinHandle,
};
use tokio_rustls::TlsAcceptor;

use crate::{ClientConfig, ClientFactory};

pub struct TlsServer {
    addr: SocketAddr,
    cert: CertificateDer<'static>,
    requests: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl TlsServer {
    pub async fn start() -> Self {
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let cert = cert.der().clone();
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

        let tls = rustls::ServerConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert.clone()], key)
        .unwrap();
        let acceptor = TlsAcceptor::from(Arc::new(tls));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(AtomicUsize::new(0));

        let task = {
            let requests = Arc::clone(&requests);
            tokio::spawn(async move {
                while let Ok((tcp, _)) = listener.accept().await {
                    let acceptor = acceptor.clone();
                    let requests = Arc::clone(&requests);
                    tokio::spawn(async move {
                        if let Ok(stream) = acceptor.accept(tcp).await {
                            serve(stream, addr, &requests).await;
                        }
                    });
                }
            })
        };

        Self {
            addr,
            cert,
            requests,
            task,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("https://localhost:{}{path}", self.addr.port())
    }

    /// Requests received so far, across all connections.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// A factory whose transport also trusts this server's certificate.
    pub fn factory(&self, config: ClientConfig) -> ClientFactory {
        config.validate().unwrap();
        let transport = config
            .transport_builder()
            .add_root_certificate(reqwest::Certificate::from_der(&self.cert).unwrap())
            .build()
            .unwrap();
        ClientFactory::with_transport(config, transport)
    }
}

impl Drop for TlsServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve<S>(mut stream: S, addr: SocketAddr, requests: &AtomicUsize)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    loop {
        let head_end = loop {
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
            let mut chunk = [0u8; 1024];
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
        buf.drain(..head_end);
        requests.fetch_add(1, Ordering::SeqCst);

        let path = head.split_whitespace().nth(1).unwrap_or("/");
        let reply = match path {
            "/redirect" => format!(
                "HTTP/1.1 302 Found\r\nlocation: https://localhost:{}/hello\r\ncontent-length: 0\r\n\r\n",
                addr.port()
            ),
            "/truncated" => {
                let _ = stream
                    .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 100\r\n\r\nhello")
                    .await;
                let _ = stream.shutdown().await;
                return;
            }
            "/stall" => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                return;
            }
            _ => "HTTP/1.1 200 OK\r\ncontent-length: 5\r\n\r\nhello".to_string(),
        };
        if stream.write_all(reply.as_bytes()).await.is_err() {
            return;
        }
        let _ = stream.flush().await;
    }
}
