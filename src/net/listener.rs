//! TCP listener binding.

use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// The configured address could not be parsed.
    #[error("Invalid bind address '{0}'")]
    Address(String),
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    Bind(#[from] std::io::Error),
}

/// Bind a TCP socket to `bind_address`.
///
/// Port `0` asks the OS for a free port; use `local_addr` to find it.
pub async fn bind(bind_address: &str) -> Result<TcpListener, ListenerError> {
    let addr: SocketAddr = bind_address
        .parse()
        .map_err(|_| ListenerError::Address(bind_address.to_string()))?;

    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(address = %local_addr, "Listener bound");

    Ok(listener)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_ephemeral_port() {
        let listener = bind("127.0.0.1:0").await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn rejects_bad_address() {
        let err = bind("localhost").await.unwrap_err();
        assert!(matches!(err, ListenerError::Address(_)));
    }

    #[tokio::test]
    async fn reports_port_in_use() {
        let first = bind("127.0.0.1:0").await.unwrap();
        let addr = first.local_addr().unwrap().to_string();
        let err = bind(&addr).await.unwrap_err();
        assert!(matches!(err, ListenerError::Bind(_)));
    }
}
