//! HTTPS accept loop.
//!
//! Every accepted TCP connection gets its own task: TLS handshake with the
//! bootstrap credential, then HTTP/1.1 served by the [`Engine`]. There is no
//! plaintext fallback.

use std::future::{pending, Future};
use std::net::SocketAddr;

use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

use crate::error::EngineError;
use crate::identity::Credential;
use crate::server::engine::Engine;

/// A bound TLS listener ready to serve an [`Engine`].
pub struct Server {
    engine: Engine,
    listener: TcpListener,
    acceptor: TlsAcceptor,
}

impl Server {
    /// Bind to the engine identity's internal address.
    ///
    /// # Errors
    ///
    /// [`EngineError::ResourceClosed`] if the address cannot be bound.
    pub async fn bind(engine: Engine, credential: &Credential) -> Result<Self, EngineError> {
        let addr = engine.identity().internal.clone();
        Self::bind_addr(engine, credential, &addr).await
    }

    /// Bind to an explicit address, e.g. `127.0.0.1:0` in tests.
    pub async fn bind_addr(
        engine: Engine,
        credential: &Credential,
        addr: &str,
    ) -> Result<Self, EngineError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| EngineError::ResourceClosed(format!("bind {addr}: {e}")))?;
        Ok(Self {
            engine,
            listener,
            acceptor: TlsAcceptor::from(credential.server_config()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, EngineError> {
        self.listener
            .local_addr()
            .map_err(|e| EngineError::ResourceClosed(e.to_string()))
    }

    /// Serve until the listener fails.
    ///
    /// # Errors
    ///
    /// Always ends in [`EngineError::ResourceClosed`].
    pub async fn run(self) -> Result<(), EngineError> {
        self.serve_with_shutdown(pending()).await
    }

    /// Serve until `shutdown` resolves or the listener fails.
    ///
    /// In-flight connections keep running on their own tasks after shutdown.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<(), EngineError>
    where
        F: Future<Output = ()>,
    {
        let identity = self.engine.identity();
        info!(
            id = %identity.id,
            name = %identity.name,
            internal = ?self.listener.local_addr().ok(),
            external = %identity.external,
            "listening"
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested, no longer accepting connections");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        debug!(%peer_addr, "accepted TCP connection");
                        let acceptor = self.acceptor.clone();
                        let engine = self.engine.clone();
                        tokio::spawn(serve_connection(stream, peer_addr, acceptor, engine));
                    }
                    Err(e) => {
                        error!(error = %e, "accept error");
                        return Err(EngineError::ResourceClosed(e.to_string()));
                    }
                },
            }
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    acceptor: TlsAcceptor,
    engine: Engine,
) {
    let tls = match acceptor.accept(stream).await {
        Ok(tls) => tls,
        Err(e) => {
            warn!(%peer_addr, error = %e, "TLS handshake failed");
            return;
        }
    };

    let service = TowerToHyperService::new(engine);
    if let Err(e) = hyper::server::conn::http1::Builder::new()
        .serve_connection(TokioIo::new(tls), service)
        .await
    {
        warn!(%peer_addr, error = %e, "connection error");
    }
}
