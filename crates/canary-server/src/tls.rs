//! HTTPS serving: PEM loading and a TLS listener for `axum::serve`.

use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use axum::serve::Listener;
use rustls::ServerConfig;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::server::TlsStream;
use tracing::{debug, warn};

const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Handshaken connections waiting for the server to pick them up.
const PENDING_CONNECTIONS: usize = 64;

/// Server-auth-only config from a PEM certificate chain and private key.
pub fn load_server_config(cert: &Path, key: &Path) -> Result<Arc<ServerConfig>> {
    let chain = CertificateDer::pem_file_iter(cert)
        .map_err(|e| anyhow!("Cannot read certificate {}: {:?}", cert.display(), e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| anyhow!("Malformed certificate {}: {:?}", cert.display(), e))?;
    if chain.is_empty() {
        bail!("No certificate found in {}", cert.display());
    }

    let key = PrivateKeyDer::from_pem_file(key)
        .map_err(|e| anyhow!("Cannot read private key {}: {:?}", key.display(), e))?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .context("TLS protocol setup failed")?
        .with_no_client_auth()
        .with_single_cert(chain, key)
        .context("Certificate and private key are not a usable TLS identity")?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

/// TCP listener that only hands out connections after a completed TLS
/// handshake. Handshakes run on their own tasks so a slow client never
/// holds up the others.
pub struct TlsListener {
    incoming: mpsc::Receiver<(TlsStream<TcpStream>, SocketAddr)>,
    local_addr: SocketAddr,
}

impl TlsListener {
    /// Must be called from within a tokio runtime.
    pub fn new(tcp: TcpListener, config: Arc<ServerConfig>) -> io::Result<Self> {
        let local_addr = tcp.local_addr()?;
        let (tx, incoming) = mpsc::channel(PENDING_CONNECTIONS);
        tokio::spawn(run_accept_loop(tcp, TlsAcceptor::from(config), tx));
        Ok(Self { incoming, local_addr })
    }
}

async fn run_accept_loop(
    tcp: TcpListener,
    acceptor: TlsAcceptor,
    tx: mpsc::Sender<(TlsStream<TcpStream>, SocketAddr)>,
) {
    loop {
        let (stream, addr) = tokio::select! {
            // The server dropped the listener
            _ = tx.closed() => break,
            accepted = tcp.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("TCP accept failed: {}", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            },
        };

        let acceptor = acceptor.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            match tokio::time::timeout(TLS_HANDSHAKE_TIMEOUT, acceptor.accept(stream)).await {
                Ok(Ok(tls)) => {
                    let _ = tx.send((tls, addr)).await;
                }
                Ok(Err(e)) => debug!("TLS handshake with {} failed: {}", addr, e),
                Err(_) => debug!("TLS handshake with {} timed out", addr),
            }
        });
    }
    debug!("TLS accept loop stopped");
}

impl Listener for TlsListener {
    type Io = TlsStream<TcpStream>;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        match self.incoming.recv().await {
            Some(conn) => conn,
            // The accept loop only stops once this listener is gone
            None => std::future::pending().await,
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        Ok(self.local_addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn pem_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn self_signed() -> (NamedTempFile, NamedTempFile, CertificateDer<'static>) {
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        (
            pem_file(&cert.pem()),
            pem_file(&key_pair.serialize_pem()),
            cert.der().clone(),
        )
    }

    #[test]
    fn loads_a_pem_identity() {
        let (cert, key, _) = self_signed();
        let config = load_server_config(cert.path(), key.path()).unwrap();
        assert_eq!(config.alpn_protocols, vec![b"http/1.1".to_vec()]);
    }

    #[test]
    fn rejects_unusable_files() {
        let (cert, key, _) = self_signed();
        let junk = pem_file("not a certificate\n");

        assert!(load_server_config(junk.path(), key.path()).is_err());
        assert!(load_server_config(cert.path(), junk.path()).is_err());
        assert!(load_server_config(Path::new("/nonexistent/cert.pem"), key.path()).is_err());
    }

    #[tokio::test]
    async fn listener_hands_out_handshaken_connections() {
        let (cert, key, cert_der) = self_signed();
        let config = load_server_config(cert.path(), key.path()).unwrap();
        let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut listener = TlsListener::new(tcp, config).unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut roots = rustls::RootCertStore::empty();
            roots.add(cert_der).unwrap();
            let provider = Arc::new(rustls::crypto::ring::default_provider());
            let config = rustls::ClientConfig::builder_with_provider(provider)
                .with_safe_default_protocol_versions()
                .unwrap()
                .with_root_certificates(roots)
                .with_no_client_auth();
            let connector = tokio_rustls::TlsConnector::from(Arc::new(config));
            let stream = TcpStream::connect(addr).await.unwrap();
            let name = rustls::pki_types::ServerName::try_from("localhost").unwrap();
            connector.connect(name, stream).await.unwrap()
        });

        let (_io, peer) = listener.accept().await;
        assert!(peer.ip().is_loopback());
        client.await.unwrap();
    }
}
