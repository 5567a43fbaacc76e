//! WebSocket transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use super::{EngineEndpoint, EngineTransport};
use crate::config::TransportKind;
use crate::error::{ClientError, Result};
use crate::protocol::engine::{EnginePacket, Handshake, PROBE};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport; one engine packet per text frame.
pub struct WebSocketTransport {
    sink: Mutex<SplitSink<Socket, Message>>,
    stream: Mutex<SplitStream<Socket>>,
    connected: AtomicBool,
}

impl WebSocketTransport {
    async fn dial(endpoint: &EngineEndpoint, sid: Option<&str>) -> Result<Self> {
        let url = endpoint.url(TransportKind::Websocket, sid)?;
        debug!(url = %url, "Opening websocket transport");
        let (socket, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        let (sink, stream) = socket.split();
        Ok(Self { sink: Mutex::new(sink), stream: Mutex::new(stream), connected: AtomicBool::new(true) })
    }

    /// Connect directly, without a polling handshake first.
    pub async fn open(endpoint: &EngineEndpoint) -> Result<(Self, Handshake)> {
        let transport = Self::dial(endpoint, None).await?;
        match transport.next_packet().await? {
            EnginePacket::Open(handshake) => Ok((transport, handshake)),
            other => Err(ClientError::Protocol(format!("expected open packet, got {}", other.kind()))),
        }
    }

    /// Upgrade an existing polling session: `2probe`, expect `3probe`, then `5`.
    pub async fn probe(endpoint: &EngineEndpoint, sid: &str, wait: Duration) -> Result<Self> {
        let transport = Self::dial(endpoint, Some(sid)).await?;
        transport.send(&[EnginePacket::Ping(Some(PROBE.to_string()))]).await?;

        let reply = tokio::time::timeout(wait, transport.next_packet())
            .await
            .map_err(|_| ClientError::Timeout("websocket probe".to_string()))??;
        if reply != EnginePacket::Pong(Some(PROBE.to_string())) {
            let _ = transport.close().await;
            return Err(ClientError::Protocol(format!("unexpected probe reply: {}", reply.kind())));
        }

        transport.send(&[EnginePacket::Upgrade]).await?;
        Ok(transport)
    }

    async fn next_packet(&self) -> Result<EnginePacket> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    trace!(len = text.len(), "WebSocket receive");
                    return EnginePacket::decode(&text);
                }
                Some(Ok(Message::Close(frame))) => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(ClientError::Connection(format!("websocket closed by server: {frame:?}")));
                }
                Some(Ok(Message::Binary(_))) => {
                    return Err(ClientError::Protocol("binary frames are not supported".to_string()));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(e.into());
                }
                None => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(ClientError::Connection("websocket stream ended".to_string()));
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl EngineTransport for WebSocketTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Websocket
    }

    async fn send(&self, packets: &[EnginePacket]) -> Result<()> {
        if !self.is_connected() {
            return Err(ClientError::Connection("Not connected".to_string()));
        }
        let mut sink = self.sink.lock().await;
        for packet in packets {
            sink.send(Message::Text(packet.encode()?)).await?;
        }
        Ok(())
    }

    async fn receive(&self) -> Result<Vec<EnginePacket>> {
        if !self.is_connected() {
            return Err(ClientError::Connection("Not connected".to_string()));
        }
        Ok(vec![self.next_packet().await?])
    }

    async fn close(&self) -> Result<()> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let mut sink = self.sink.lock().await;
        let _ = sink.send(Message::Text(EnginePacket::Close.encode()?)).await;
        sink.close().await?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_refused() {
        // Port 9 (discard) is not listening in test environments.
        let endpoint = EngineEndpoint::new("http://127.0.0.1:9", "/socket.io/").unwrap();
        assert!(WebSocketTransport::open(&endpoint).await.is_err());
    }
}
