//! Listener sockets.

use crate::error::ServerError;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Create a TCP listener with SO_REUSEADDR enabled, so a restarted server
/// can bind the port of the previous one right away.
pub fn create_listener(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;

    socket.bind(&addr.into())?;
    socket.listen(1024)?;

    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener)
}

/// Resolve `host` and bind a listener on `port` (0 picks a free port)
pub async fn bind(host: &str, port: u16) -> Result<TcpListener, ServerError> {
    let addr = tokio::net::lookup_host((host, port))
        .await
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| ServerError::InvalidAddress(format!("{host}:{port}")))?;
    create_listener(addr).map_err(|e| ServerError::Bind(addr, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let listener = bind("127.0.0.1", 0).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_rebind_after_close() {
        let listener = bind("127.0.0.1", 0).await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        assert!(create_listener(addr).is_ok());
    }

    #[tokio::test]
    async fn test_port_in_use() {
        let listener = bind("127.0.0.1", 0).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        // SO_REUSEADDR does not allow two listening sockets on one port
        let err = bind("127.0.0.1", port).await.unwrap_err();
        assert!(matches!(err, ServerError::Bind(..)));
    }

    #[tokio::test]
    async fn test_invalid_host() {
        let err = bind("not a host name", 0).await.unwrap_err();
        assert!(matches!(err, ServerError::InvalidAddress(_)));
    }
}
