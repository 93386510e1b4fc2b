use std::fmt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Identifier of one running exchange process.
///
/// Every connection handle records which exchange accepted it; the
/// distribution path compares that id against its own to decide between a
/// local socket write and inter-exchange forwarding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExchangeId(String);

impl ExchangeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Write side of one registered node connection.
///
/// The token doubles as the ring registration key; the handle is owned by
/// the [`Router`](crate::exchange::Router) for exactly the lifetime of the
/// TCP session. The transport is boxed so tests can register in-memory
/// pipes instead of sockets.
pub struct CrawlerHandle {
    token: String,
    exchange_id: ExchangeId,
    transport: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
}

impl CrawlerHandle {
    pub fn new(
        token: impl Into<String>,
        exchange_id: ExchangeId,
        transport: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            token: token.into(),
            exchange_id,
            transport: Mutex::new(Box::new(transport)),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn exchange_id(&self) -> &ExchangeId {
        &self.exchange_id
    }

    /// Writes one newline-terminated line to the node, flushing before
    /// returning. `write_all` keeps retrying partial writes, so either the
    /// whole line reaches the transport or the connection has failed.
    pub async fn send_line(&self, line: &str) -> std::io::Result<()> {
        let mut transport = self.transport.lock().await;
        transport.write_all(line.as_bytes()).await?;
        transport.write_all(b"\n").await?;
        transport.flush().await
    }
}

impl fmt::Debug for CrawlerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrawlerHandle")
            .field("token", &self.token)
            .field("exchange_id", &self.exchange_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_send_line_appends_newline() {
        let (client, mut server) = tokio::io::duplex(256);
        let handle = CrawlerHandle::new("tok-1", ExchangeId::new("ex-1"), client);

        handle.send_line("http://example.com/").await.unwrap();

        let mut buf = vec![0u8; 64];
        let n = server.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"http://example.com/\n");
    }

    #[tokio::test]
    async fn test_accessors() {
        let (client, _server) = tokio::io::duplex(16);
        let handle = CrawlerHandle::new("tok-9", ExchangeId::new("ex-2"), client);
        assert_eq!(handle.token(), "tok-9");
        assert_eq!(handle.exchange_id(), &ExchangeId::new("ex-2"));
    }
}
