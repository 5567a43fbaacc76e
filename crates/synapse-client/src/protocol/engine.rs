//! Engine.IO v4 packet codec.

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Protocol revision sent in the `EIO` query parameter.
pub const PROTOCOL_VERSION: &str = "4";

/// Record separator between packets in a long-polling payload.
pub const PAYLOAD_SEPARATOR: char = '\u{1e}';

/// Probe body exchanged while upgrading to WebSocket.
pub const PROBE: &str = "probe";

/// Handshake carried by the `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    /// Engine session id.
    pub sid: String,
    /// Transports the session may upgrade to.
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Server ping period in milliseconds.
    pub ping_interval: u64,
    /// Grace period after a missed ping, in milliseconds.
    pub ping_timeout: u64,
    /// Largest payload the server accepts, in bytes.
    #[serde(default)]
    pub max_payload: Option<u64>,
}

impl Handshake {
    /// Silence after which the connection counts as lost.
    #[must_use]
    pub fn liveness_window(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }

    /// Whether the server offers a WebSocket upgrade.
    #[must_use]
    pub fn can_upgrade_to_websocket(&self) -> bool {
        self.upgrades.iter().any(|u| u == "websocket")
    }
}

/// A single Engine.IO packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(Option<String>),
    Pong(Option<String>),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    /// Encode to the text wire form.
    pub fn encode(&self) -> Result<String> {
        let encoded = match self {
            Self::Open(handshake) => format!("0{}", serde_json::to_string(handshake)?),
            Self::Close => "1".to_string(),
            Self::Ping(data) => format!("2{}", data.as_deref().unwrap_or_default()),
            Self::Pong(data) => format!("3{}", data.as_deref().unwrap_or_default()),
            Self::Message(data) => format!("4{data}"),
            Self::Upgrade => "5".to_string(),
            Self::Noop => "6".to_string(),
        };
        Ok(encoded)
    }

    /// Decode one packet from its text wire form.
    pub fn decode(raw: &str) -> Result<Self> {
        let mut chars = raw.chars();
        let kind = chars.next().ok_or_else(|| ClientError::Protocol("empty engine packet".to_string()))?;
        let body = chars.as_str();
        let optional = || (!body.is_empty()).then(|| body.to_string());

        match kind {
            '0' => Ok(Self::Open(serde_json::from_str(body)?)),
            '1' => Ok(Self::Close),
            '2' => Ok(Self::Ping(optional())),
            '3' => Ok(Self::Pong(optional())),
            '4' => Ok(Self::Message(body.to_string())),
            '5' => Ok(Self::Upgrade),
            '6' => Ok(Self::Noop),
            'b' => Err(ClientError::Protocol("binary engine packets are not supported".to_string())),
            other => Err(ClientError::Protocol(format!("unknown engine packet type '{other}'"))),
        }
    }

    /// Decode a long-polling payload into its packets.
    pub fn decode_payload(payload: &str) -> Result<Vec<Self>> {
        payload.split(PAYLOAD_SEPARATOR).filter(|p| !p.is_empty()).map(Self::decode).collect()
    }

    /// Encode packets as one long-polling payload.
    pub fn encode_payload(packets: &[Self]) -> Result<String> {
        let encoded = packets.iter().map(Self::encode).collect::<Result<Vec<_>>>()?;
        Ok(encoded.join(&PAYLOAD_SEPARATOR.to_string()))
    }

    /// Short name for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Open(_) => "open",
            Self::Close => "close",
            Self::Ping(_) => "ping",
            Self::Pong(_) => "pong",
            Self::Message(_) => "message",
            Self::Upgrade => "upgrade",
            Self::Noop => "noop",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPEN: &str =
        r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":["websocket"],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

    #[test]
    fn test_decode_open() {
        let EnginePacket::Open(handshake) = EnginePacket::decode(OPEN).unwrap() else {
            panic!("expected open packet");
        };
        assert_eq!(handshake.sid, "lv_VI97HAXpY6yYWAAAC");
        assert!(handshake.can_upgrade_to_websocket());
        assert_eq!(handshake.liveness_window(), std::time::Duration::from_millis(45_000));
        assert_eq!(handshake.max_payload, Some(1_000_000));
    }

    #[test]
    fn test_decode_simple_packets() {
        assert_eq!(EnginePacket::decode("1").unwrap(), EnginePacket::Close);
        assert_eq!(EnginePacket::decode("2").unwrap(), EnginePacket::Ping(None));
        assert_eq!(EnginePacket::decode("3probe").unwrap(), EnginePacket::Pong(Some("probe".to_string())));
        assert_eq!(EnginePacket::decode("40").unwrap(), EnginePacket::Message("0".to_string()));
        assert_eq!(EnginePacket::decode("5").unwrap(), EnginePacket::Upgrade);
        assert_eq!(EnginePacket::decode("6").unwrap(), EnginePacket::Noop);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(EnginePacket::decode("").is_err());
        assert!(EnginePacket::decode("9").is_err());
        assert!(EnginePacket::decode("bAAEC").is_err());
        assert!(EnginePacket::decode("0{not json").is_err());
    }

    #[test]
    fn test_payload_split_and_join() {
        let payload = "2\u{1e}42[\"training_update\",{}]\u{1e}6";
        let packets = EnginePacket::decode_payload(payload).unwrap();
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0], EnginePacket::Ping(None));
        assert_eq!(packets[2], EnginePacket::Noop);
        assert_eq!(EnginePacket::encode_payload(&packets).unwrap(), payload);
    }

    #[test]
    fn test_encode_ping_probe() {
        assert_eq!(EnginePacket::Ping(Some(PROBE.to_string())).encode().unwrap(), "2probe");
        assert_eq!(EnginePacket::Pong(None).encode().unwrap(), "3");
    }
}
