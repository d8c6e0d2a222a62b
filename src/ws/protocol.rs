//! Engine.IO v4 / Socket.IO v5 text framing.
//!
//! Only the default namespace and text frames are supported, which is all
//! the exchange feed uses.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::KuruError;

/// Socket.IO connect request to the default namespace.
pub const CONNECT: &str = "40";
/// Socket.IO disconnect from the default namespace.
pub const DISCONNECT: &str = "41";

/// Engine.IO handshake data sent with the open packet.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings.
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong.
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

impl OpenInfo {
    /// Longest silence after which the connection is considered dead.
    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_interval + self.ping_timeout)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum EnginePacket {
    Open(OpenInfo),
    Close,
    Ping(String),
    Pong(String),
    Message(SocketPacket),
    Upgrade,
    Noop,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SocketPacket {
    Connect(Option<Value>),
    Disconnect,
    Event { name: String, data: Value },
    Ack(String),
    ConnectError(Value),
}

impl EnginePacket {
    pub fn decode(text: &str) -> Result<Self, KuruError> {
        let mut chars = text.chars();
        let kind = chars
            .next()
            .ok_or_else(|| KuruError::Protocol("empty engine.io packet".to_string()))?;
        let rest = chars.as_str();
        Ok(match kind {
            '0' => EnginePacket::Open(serde_json::from_str(rest)?),
            '1' => EnginePacket::Close,
            '2' => EnginePacket::Ping(rest.to_string()),
            '3' => EnginePacket::Pong(rest.to_string()),
            '4' => EnginePacket::Message(SocketPacket::decode(rest)?),
            '5' => EnginePacket::Upgrade,
            '6' => EnginePacket::Noop,
            other => {
                return Err(KuruError::Protocol(format!(
                    "unknown engine.io packet type {other:?}"
                )));
            }
        })
    }

    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(info) => format!(
                "0{}",
                serde_json::json!({
                    "sid": info.sid,
                    "upgrades": info.upgrades,
                    "pingInterval": info.ping_interval,
                    "pingTimeout": info.ping_timeout,
                    "maxPayload": info.max_payload,
                })
            ),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(payload) => format!("2{payload}"),
            EnginePacket::Pong(payload) => format!("3{payload}"),
            EnginePacket::Message(packet) => format!("4{}", packet.encode()),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

impl SocketPacket {
    pub fn decode(text: &str) -> Result<Self, KuruError> {
        let mut chars = text.chars();
        let kind = chars
            .next()
            .ok_or_else(|| KuruError::Protocol("empty socket.io packet".to_string()))?;
        let body = strip_namespace(chars.as_str());
        Ok(match kind {
            '0' => SocketPacket::Connect(if body.is_empty() {
                None
            } else {
                Some(serde_json::from_str(body)?)
            }),
            '1' => SocketPacket::Disconnect,
            '2' => {
                let body = body.trim_start_matches(|c: char| c.is_ascii_digit());
                let mut args: Vec<Value> = serde_json::from_str(body)?;
                if args.is_empty() {
                    return Err(KuruError::Protocol("event without name".to_string()));
                }
                let name = match args.remove(0) {
                    Value::String(name) => name,
                    other => {
                        return Err(KuruError::Protocol(format!(
                            "event name is not a string: {other}"
                        )));
                    }
                };
                let data = if args.is_empty() {
                    Value::Null
                } else {
                    args.swap_remove(0)
                };
                SocketPacket::Event { name, data }
            }
            '3' => SocketPacket::Ack(body.to_string()),
            '4' => SocketPacket::ConnectError(if body.is_empty() {
                Value::Null
            } else {
                serde_json::from_str(body)?
            }),
            other => {
                return Err(KuruError::Protocol(format!(
                    "unsupported socket.io packet type {other:?}"
                )));
            }
        })
    }

    pub fn encode(&self) -> String {
        match self {
            SocketPacket::Connect(None) => "0".to_string(),
            SocketPacket::Connect(Some(data)) => format!("0{data}"),
            SocketPacket::Disconnect => "1".to_string(),
            SocketPacket::Event { name, data } => {
                format!("2{}", serde_json::json!([name, data]))
            }
            SocketPacket::Ack(body) => format!("3{body}"),
            SocketPacket::ConnectError(data) => format!("4{data}"),
        }
    }
}

/// Drops a `/namespace,` prefix if present.
fn strip_namespace(body: &str) -> &str {
    if body.starts_with('/') {
        match body.find(',') {
            Some(idx) => &body[idx + 1..],
            None => "",
        }
    } else {
        body
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_decode_open() {
        let packet = EnginePacket::decode(
            r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#,
        )
        .unwrap();
        let EnginePacket::Open(info) = packet else {
            panic!("expected open packet, got {packet:?}");
        };
        assert_eq!(info.sid, "abc");
        assert_eq!(info.liveness_timeout(), Duration::from_secs(45));
    }

    #[test]
    fn test_decode_ping_and_control() {
        assert_eq!(
            EnginePacket::decode("2").unwrap(),
            EnginePacket::Ping(String::new())
        );
        assert_eq!(EnginePacket::Pong("probe".to_string()).encode(), "3probe");
        assert_eq!(EnginePacket::decode("1").unwrap(), EnginePacket::Close);
        assert_eq!(EnginePacket::decode("6").unwrap(), EnginePacket::Noop);
        assert!(matches!(
            EnginePacket::decode("9"),
            Err(KuruError::Protocol(_))
        ));
        assert!(EnginePacket::decode("").is_err());
    }

    #[test]
    fn test_decode_connect_ack_and_error() {
        assert_eq!(
            EnginePacket::decode(r#"40{"sid":"xyz"}"#).unwrap(),
            EnginePacket::Message(SocketPacket::Connect(Some(json!({"sid": "xyz"}))))
        );
        assert_eq!(
            EnginePacket::decode("40").unwrap(),
            EnginePacket::Message(SocketPacket::Connect(None))
        );
        assert_eq!(
            EnginePacket::decode(r#"44{"message":"not allowed"}"#).unwrap(),
            EnginePacket::Message(SocketPacket::ConnectError(
                json!({"message": "not allowed"})
            ))
        );
        assert_eq!(
            EnginePacket::decode("41").unwrap(),
            EnginePacket::Message(SocketPacket::Disconnect)
        );
    }

    #[test]
    fn test_decode_event() {
        assert_eq!(
            EnginePacket::decode(r#"42["Trade",{"orderId":1}]"#).unwrap(),
            EnginePacket::Message(SocketPacket::Event {
                name: "Trade".to_string(),
                data: json!({"orderId": 1}),
            })
        );
        // Namespace and ack id prefixes are tolerated
        assert_eq!(
            SocketPacket::decode(r#"2/feed,12["OrderCreated",{"orderId":2}]"#).unwrap(),
            SocketPacket::Event {
                name: "OrderCreated".to_string(),
                data: json!({"orderId": 2}),
            }
        );
        assert_eq!(
            SocketPacket::decode(r#"2["ping"]"#).unwrap(),
            SocketPacket::Event {
                name: "ping".to_string(),
                data: Value::Null,
            }
        );
        assert!(SocketPacket::decode("2[]").is_err());
        assert!(SocketPacket::decode("2[1,2]").is_err());
        assert!(SocketPacket::decode("2{not json").is_err());
    }

    #[test]
    fn test_encode_event() {
        let packet = EnginePacket::Message(SocketPacket::Event {
            name: "OrdersCanceled".to_string(),
            data: json!({"orderIds": [1]}),
        });
        assert_eq!(packet.encode(), r#"42["OrdersCanceled",{"orderIds":[1]}]"#);
        assert_eq!(
            EnginePacket::decode(&packet.encode()).unwrap(),
            packet
        );
        assert_eq!(
            EnginePacket::Message(SocketPacket::Connect(None)).encode(),
            CONNECT
        );
        assert_eq!(
            EnginePacket::Message(SocketPacket::Disconnect).encode(),
            DISCONNECT
        );
    }
}
