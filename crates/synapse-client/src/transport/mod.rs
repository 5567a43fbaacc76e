//! Engine transports for the training event stream.

pub mod polling;
pub mod websocket;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use crate::config::{TransportConfig, TransportKind};
use crate::error::{ClientError, Result};
use crate::protocol::engine::{self, EnginePacket, Handshake};

pub use polling::PollingTransport;
pub use websocket::WebSocketTransport;

/// A bidirectional Engine.IO packet channel.
///
/// Methods take `&self` so one task may block in `receive` while another sends.
#[async_trait::async_trait]
pub trait EngineTransport: Send + Sync {
    /// Which transport this is.
    fn kind(&self) -> TransportKind;

    /// Send packets to the server.
    async fn send(&self, packets: &[EnginePacket]) -> Result<()>;

    /// Wait for the next batch of packets from the server.
    async fn receive(&self) -> Result<Vec<EnginePacket>>;

    /// Close the transport. Safe to call more than once.
    async fn close(&self) -> Result<()>;

    /// Check if the transport is connected.
    fn is_connected(&self) -> bool;
}

/// Builds Engine.IO URLs for a server base and path.
#[derive(Debug, Clone)]
pub struct EngineEndpoint {
    base: Url,
}

impl EngineEndpoint {
    /// Combine a server base such as `http://localhost:8000` with an endpoint path.
    pub fn new(server: &str, path: &str) -> Result<Self> {
        let mut base = Url::parse(server)?;
        let path = if path.starts_with('/') { path.to_string() } else { format!("/{path}") };
        let path = if path.ends_with('/') { path } else { format!("{path}/") };
        base.set_path(&path);
        base.set_query(None);
        Ok(Self { base })
    }

    /// Server base including the endpoint path.
    #[must_use]
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// URL for a transport, optionally bound to an existing session.
    pub fn url(&self, kind: TransportKind, sid: Option<&str>) -> Result<Url> {
        let mut url = self.base.clone();
        if kind == TransportKind::Websocket {
            let scheme = match url.scheme() {
                "https" | "wss" => "wss",
                _ => "ws",
            };
            url.set_scheme(scheme)
                .map_err(|()| ClientError::Config(format!("cannot use scheme {scheme} for {}", self.base)))?;
        }
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("EIO", engine::PROTOCOL_VERSION).append_pair("transport", kind.as_str());
            if let Some(sid) = sid {
                query.append_pair("sid", sid);
            }
        }
        Ok(url)
    }
}

/// Open a transport following the configured preference order.
///
/// Polling-first handshakes over HTTP and then probes a WebSocket upgrade,
/// staying on polling if the probe fails. WebSocket-first connects directly and
/// falls back to the next transport in the list.
pub async fn open(
    config: &TransportConfig,
    endpoint: &EngineEndpoint,
    http: &reqwest::Client,
) -> Result<(Arc<dyn EngineTransport>, Handshake)> {
    let mut last_error = None;

    for (position, kind) in config.transports.iter().copied().enumerate() {
        let opened = match kind {
            TransportKind::Polling => open_polling(config, endpoint, http, position).await,
            TransportKind::Websocket => WebSocketTransport::open(endpoint)
                .await
                .map(|(transport, handshake)| (Arc::new(transport) as Arc<dyn EngineTransport>, handshake)),
        };
        match opened {
            Ok(opened) => return Ok(opened),
            Err(e) => {
                warn!(transport = %kind, error = %e, "Transport failed to open");
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| ClientError::Config("no transports configured".to_string())))
}

async fn open_polling(
    config: &TransportConfig,
    endpoint: &EngineEndpoint,
    http: &reqwest::Client,
    position: usize,
) -> Result<(Arc<dyn EngineTransport>, Handshake)> {
    let (polling, handshake) = PollingTransport::open(http.clone(), endpoint).await?;

    let wants_upgrade = config.transports[position + 1..].contains(&TransportKind::Websocket);
    if wants_upgrade && handshake.can_upgrade_to_websocket() {
        match WebSocketTransport::probe(endpoint, &handshake.sid, probe_timeout(&handshake, config)).await {
            Ok(upgraded) => {
                info!(sid = %handshake.sid, "Upgraded transport to websocket");
                polling.mark_upgraded();
                return Ok((Arc::new(upgraded), handshake));
            }
            Err(e) => debug!(sid = %handshake.sid, error = %e, "WebSocket probe failed, staying on polling"),
        }
    }

    Ok((Arc::new(polling), handshake))
}

fn probe_timeout(handshake: &Handshake, config: &TransportConfig) -> Duration {
    Duration::from_millis(handshake.ping_timeout).min(config.connect_timeout())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polling_url() {
        let endpoint = EngineEndpoint::new("http://localhost:8000", "/socket.io/").unwrap();
        let url = endpoint.url(TransportKind::Polling, None).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/socket.io/?EIO=4&transport=polling");
    }

    #[test]
    fn test_websocket_url_with_sid() {
        let endpoint = EngineEndpoint::new("https://trainer.example.com", "socket.io").unwrap();
        let url = endpoint.url(TransportKind::Websocket, Some("abc")).unwrap();
        assert_eq!(url.as_str(), "wss://trainer.example.com/socket.io/?EIO=4&transport=websocket&sid=abc");
    }

    #[test]
    fn test_invalid_server_url() {
        assert!(EngineEndpoint::new("not a url", "/socket.io/").is_err());
    }
}
