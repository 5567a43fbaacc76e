//! Socket.IO v5 packet codec (text packets only).

use serde_json::Value;

use crate::error::{ClientError, Result};

/// Reason reported when the server closes the namespace on purpose.
pub const SERVER_DISCONNECT_REASON: &str = "io server disconnect";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketPacketType {
    Connect,
    Disconnect,
    Event,
    Ack,
    ConnectError,
}

impl SocketPacketType {
    fn code(self) -> char {
        match self {
            Self::Connect => '0',
            Self::Disconnect => '1',
            Self::Event => '2',
            Self::Ack => '3',
            Self::ConnectError => '4',
        }
    }

    fn from_code(code: char) -> Result<Self> {
        match code {
            '0' => Ok(Self::Connect),
            '1' => Ok(Self::Disconnect),
            '2' => Ok(Self::Event),
            '3' => Ok(Self::Ack),
            '4' => Ok(Self::ConnectError),
            '5' | '6' => Err(ClientError::Protocol("binary socket packets are not supported".to_string())),
            other => Err(ClientError::Protocol(format!("unknown socket packet type '{other}'"))),
        }
    }
}

/// A Socket.IO packet carried inside an engine `message`.
#[derive(Debug, Clone, PartialEq)]
pub struct SocketPacket {
    pub packet_type: SocketPacketType,
    pub namespace: String,
    pub ack_id: Option<u64>,
    pub data: Option<Value>,
}

impl SocketPacket {
    fn new(packet_type: SocketPacketType, namespace: &str, data: Option<Value>) -> Self {
        Self { packet_type, namespace: normalize_namespace(namespace), ack_id: None, data }
    }

    /// Namespace join request.
    #[must_use]
    pub fn connect(namespace: &str) -> Self {
        Self::new(SocketPacketType::Connect, namespace, None)
    }

    /// Namespace leave request.
    #[must_use]
    pub fn disconnect(namespace: &str) -> Self {
        Self::new(SocketPacketType::Disconnect, namespace, None)
    }

    /// Named event with a single payload argument.
    #[must_use]
    pub fn event(namespace: &str, name: &str, payload: Value) -> Self {
        Self::new(SocketPacketType::Event, namespace, Some(Value::Array(vec![Value::String(name.to_string()), payload])))
    }

    /// Event name and arguments, for event packets.
    #[must_use]
    pub fn event_parts(&self) -> Option<(&str, &[Value])> {
        if self.packet_type != SocketPacketType::Event {
            return None;
        }
        let Some(Value::Array(items)) = &self.data else {
            return None;
        };
        let (name, args) = items.split_first()?;
        Some((name.as_str()?, args))
    }

    /// Socket id granted by a `connect` reply.
    #[must_use]
    pub fn connect_sid(&self) -> Option<&str> {
        if self.packet_type != SocketPacketType::Connect {
            return None;
        }
        self.data.as_ref()?.get("sid")?.as_str()
    }

    /// Human-readable reason carried by a `connect_error`.
    #[must_use]
    pub fn error_message(&self) -> String {
        match &self.data {
            Some(Value::Object(map)) => {
                map.get("message").and_then(Value::as_str).unwrap_or("connection refused").to_string()
            }
            Some(Value::String(message)) => message.clone(),
            _ => "connection refused".to_string(),
        }
    }

    /// Encode to the text wire form.
    pub fn encode(&self) -> Result<String> {
        let mut out = String::new();
        out.push(self.packet_type.code());
        if self.namespace != "/" {
            out.push_str(&self.namespace);
            out.push(',');
        }
        if let Some(id) = self.ack_id {
            out.push_str(&id.to_string());
        }
        if let Some(data) = &self.data {
            out.push_str(&serde_json::to_string(data)?);
        }
        Ok(out)
    }

    /// Decode from the text wire form.
    pub fn decode(raw: &str) -> Result<Self> {
        let mut chars = raw.chars();
        let code = chars.next().ok_or_else(|| ClientError::Protocol("empty socket packet".to_string()))?;
        let packet_type = SocketPacketType::from_code(code)?;
        let mut rest = chars.as_str();

        let mut namespace = "/".to_string();
        if rest.starts_with('/') {
            let (ns, tail) = rest.split_once(',').unwrap_or((rest, ""));
            namespace = ns.to_string();
            rest = tail;
        }

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let ack_id = if digits > 0 {
            let id = rest[..digits].parse::<u64>().map_err(|e| ClientError::Protocol(format!("bad ack id: {e}")))?;
            rest = &rest[digits..];
            Some(id)
        } else {
            None
        };

        let data = if rest.is_empty() { None } else { Some(serde_json::from_str(rest)?) };
        Ok(Self { packet_type, namespace, ack_id, data })
    }
}

/// `""` and `"admin"` become `"/"` and `"/admin"`.
pub fn normalize_namespace(namespace: &str) -> String {
    if namespace.is_empty() {
        "/".to_string()
    } else if namespace.starts_with('/') {
        namespace.to_string()
    } else {
        format!("/{namespace}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_connect_default_namespace() {
        assert_eq!(SocketPacket::connect("/").encode().unwrap(), "0");
        assert_eq!(SocketPacket::connect("admin").encode().unwrap(), "0/admin,");
    }

    #[test]
    fn test_encode_event() {
        let packet = SocketPacket::event("/", "keepalive", json!({"timestamp": 1}));
        assert_eq!(packet.encode().unwrap(), r#"2["keepalive",{"timestamp":1}]"#);
    }

    #[test]
    fn test_decode_connect_reply() {
        let packet = SocketPacket::decode(r#"0{"sid":"abc123"}"#).unwrap();
        assert_eq!(packet.packet_type, SocketPacketType::Connect);
        assert_eq!(packet.connect_sid(), Some("abc123"));
    }

    #[test]
    fn test_decode_event_with_namespace_and_ack() {
        let packet = SocketPacket::decode(r#"2/train,12["training_update",{"epoch":1}]"#).unwrap();
        assert_eq!(packet.namespace, "/train");
        assert_eq!(packet.ack_id, Some(12));
        let (name, args) = packet.event_parts().unwrap();
        assert_eq!(name, "training_update");
        assert_eq!(args[0]["epoch"], 1);
    }

    #[test]
    fn test_decode_connect_error() {
        let packet = SocketPacket::decode(r#"4{"message":"Not authorized"}"#).unwrap();
        assert_eq!(packet.packet_type, SocketPacketType::ConnectError);
        assert_eq!(packet.error_message(), "Not authorized");
    }

    #[test]
    fn test_decode_disconnect() {
        let packet = SocketPacket::decode("1").unwrap();
        assert_eq!(packet.packet_type, SocketPacketType::Disconnect);
        assert!(packet.data.is_none());
    }

    #[test]
    fn test_decode_rejects_binary() {
        assert!(SocketPacket::decode(r#"51-["x",{"_placeholder":true,"num":0}]"#).is_err());
    }
}
