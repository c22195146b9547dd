//! Accept loop shared by the mock server and the admin API.

use crate::response::MockResponse;
use futures::future::BoxFuture;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info};

/// Function answering every request of a listener
pub type RequestHandler =
    Arc<dyn Fn(Request<Incoming>, SocketAddr) -> BoxFuture<'static, MockResponse> + Send + Sync>;

/// Handle of a running accept loop
pub struct RunningListener {
    name: &'static str,
    addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl RunningListener {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for the accept loop to end.
    /// Connections already accepted finish their in-flight requests.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            error!(listener = self.name, "Accept loop ended abnormally: {}", e);
        }
        info!(listener = self.name, addr = %self.addr, "Stopped listening");
    }
}

/// Start accepting connections on `listener`
pub fn spawn(
    name: &'static str,
    listener: TcpListener,
    tls: Option<TlsAcceptor>,
    handler: RequestHandler,
) -> std::io::Result<RunningListener> {
    let addr = listener.local_addr()?;
    let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let handler = Arc::clone(&handler);
                            let tls = tls.clone();
                            tokio::spawn(async move {
                                match tls {
                                    Some(acceptor) => match acceptor.accept(stream).await {
                                        Ok(stream) => serve_connection(stream, peer, handler, name).await,
                                        Err(e) => debug!(listener = name, "TLS handshake failed: {}", e),
                                    },
                                    None => serve_connection(stream, peer, handler, name).await,
                                }
                            });
                        }
                        Err(e) => {
                            error!(listener = name, "Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    debug!(listener = name, "Shutting down accept loop");
                    break;
                }
            }
        }
    });

    Ok(RunningListener {
        name,
        addr,
        shutdown_tx,
        task,
    })
}

async fn serve_connection<I>(
    stream: I,
    peer: SocketAddr,
    handler: RequestHandler,
    name: &'static str,
) where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(stream);
    let service = service_fn(move |req| {
        let handler = Arc::clone(&handler);
        async move { Ok::<_, Infallible>(handler(req, peer).await) }
    });
    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
        debug!(listener = name, "Connection error: {}", e);
    }
}
