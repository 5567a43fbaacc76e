//! HTTP long-polling transport.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, trace};
use url::Url;

use super::{EngineEndpoint, EngineTransport};
use crate::config::TransportKind;
use crate::error::{ClientError, Result};
use crate::protocol::engine::{EnginePacket, Handshake};

/// Long-polling transport bound to one engine session.
pub struct PollingTransport {
    /// Session URL including `sid`.
    url: Url,
    /// HTTP client.
    client: reqwest::Client,
    /// Connection status.
    connected: AtomicBool,
    /// Packets that arrived alongside the handshake.
    pending: Mutex<Vec<EnginePacket>>,
}

impl PollingTransport {
    /// Perform the polling handshake.
    pub async fn open(client: reqwest::Client, endpoint: &EngineEndpoint) -> Result<(Self, Handshake)> {
        let handshake_url = endpoint.url(TransportKind::Polling, None)?;
        debug!(url = %handshake_url, "Opening polling transport");

        let body = get_text(&client, &handshake_url).await?;
        let mut packets = EnginePacket::decode_payload(&body)?.into_iter();
        let Some(EnginePacket::Open(handshake)) = packets.next() else {
            return Err(ClientError::Protocol("polling handshake did not start with an open packet".to_string()));
        };

        let url = endpoint.url(TransportKind::Polling, Some(&handshake.sid))?;
        let transport =
            Self { url, client, connected: AtomicBool::new(true), pending: Mutex::new(packets.collect()) };
        Ok((transport, handshake))
    }

    /// Retire this transport after a successful WebSocket upgrade.
    pub fn mark_upgraded(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(ClientError::Connection("Not connected".to_string()))
        }
    }
}

async fn get_text(client: &reqwest::Client, url: &Url) -> Result<String> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| ClientError::Transport(format!("Failed to poll {url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ClientError::Transport(format!("Polling request to {url} returned {status}")));
    }

    response.text().await.map_err(|e| ClientError::Transport(format!("Failed to read polling response: {e}")))
}

#[async_trait::async_trait]
impl EngineTransport for PollingTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Polling
    }

    async fn send(&self, packets: &[EnginePacket]) -> Result<()> {
        self.ensure_connected()?;
        let body = EnginePacket::encode_payload(packets)?;
        trace!(len = body.len(), "Polling send");

        let response = self
            .client
            .post(self.url.clone())
            .header("Content-Type", "text/plain;charset=UTF-8")
            .body(body)
            .send()
            .await
            .map_err(|e| ClientError::Transport(format!("Failed to send via polling to {}: {e}", self.url)))?;

        if !response.status().is_success() {
            return Err(ClientError::Transport(format!("Polling send returned {}", response.status())));
        }
        Ok(())
    }

    async fn receive(&self) -> Result<Vec<EnginePacket>> {
        self.ensure_connected()?;
        {
            let mut pending = self.pending.lock().await;
            if !pending.is_empty() {
                return Ok(std::mem::take(&mut *pending));
            }
        }

        let body = get_text(&self.client, &self.url).await?;
        trace!(len = body.len(), "Polling receive");
        EnginePacket::decode_payload(&body)
    }

    async fn close(&self) -> Result<()> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let response = self
            .client
            .post(self.url.clone())
            .header("Content-Type", "text/plain;charset=UTF-8")
            .body(EnginePacket::Close.encode()?)
            .send()
            .await
            .map_err(|e| ClientError::Transport(format!("Failed to close polling session: {e}")))?;
        debug!(status = %response.status(), "Polling transport closed");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPEN: &str = r#"0{"sid":"s1","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

    #[tokio::test]
    async fn test_polling_handshake() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/socket.io/")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("EIO".into(), "4".into()),
                mockito::Matcher::UrlEncoded("transport".into(), "polling".into()),
            ]))
            .with_status(200)
            .with_body(OPEN)
            .create_async()
            .await;

        let endpoint = EngineEndpoint::new(&server.url(), "/socket.io/").unwrap();
        let (transport, handshake) = PollingTransport::open(reqwest::Client::new(), &endpoint).await.unwrap();

        mock.assert_async().await;
        assert_eq!(handshake.sid, "s1");
        assert!(transport.is_connected());
        assert_eq!(transport.kind(), TransportKind::Polling);
    }

    #[tokio::test]
    async fn test_handshake_rejects_non_open_packet() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/socket.io/")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body("6")
            .create_async()
            .await;

        let endpoint = EngineEndpoint::new(&server.url(), "/socket.io/").unwrap();
        let result = PollingTransport::open(reqwest::Client::new(), &endpoint).await;
        assert!(matches!(result, Err(ClientError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_handshake_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/socket.io/")
            .match_query(mockito::Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let endpoint = EngineEndpoint::new(&server.url(), "/socket.io/").unwrap();
        let result = PollingTransport::open(reqwest::Client::new(), &endpoint).await;
        assert!(matches!(result, Err(ClientError::Transport(_))));
    }

    #[tokio::test]
    async fn test_send_after_upgrade_fails() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/socket.io/")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(OPEN)
            .create_async()
            .await;

        let endpoint = EngineEndpoint::new(&server.url(), "/socket.io/").unwrap();
        let (transport, _) = PollingTransport::open(reqwest::Client::new(), &endpoint).await.unwrap();
        transport.mark_upgraded();

        let result = transport.send(&[EnginePacket::Pong(None)]).await;
        assert!(result.unwrap_err().to_string().contains("Not connected"));
        assert!(transport.close().await.is_ok());
    }
}
