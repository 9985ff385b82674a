//! Socket.IO wire format and sensor event types.
//!
//! The sensor server speaks Socket.IO v4 over an Engine.IO v4 WebSocket.
//! Every text frame starts with an Engine.IO packet type digit; Socket.IO
//! packets ride inside Engine.IO `message` packets, so a sensor event
//! arrives as `42["water_level_reading",{"value":260}]`.
//!
//! Events are deserialized into a strongly-typed [`InboundEvent`] enum by
//! re-wrapping `["name", payload]` as `{"type": name, "data": payload}`.

use serde::Deserialize;
use serde_json::Value;

use floodwatch_core::hazard::HazardReading;

/// Engine.IO pong, sent in reply to every server ping.
pub const PONG: &str = "3";

/// Socket.IO connect request for the default namespace.
pub const CONNECT_REQUEST: &str = "40";

/// Socket.IO disconnect for the default namespace.
pub const DISCONNECT_REQUEST: &str = "41";

/// A decoded Engine.IO packet.
#[derive(Debug, Clone)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    Message(SocketPacket),
    Noop,
}

/// Engine.IO open handshake. Intervals are in milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    pub ping_interval: u64,
    pub ping_timeout: u64,
}

/// A decoded Socket.IO packet.
#[derive(Debug, Clone)]
pub enum SocketPacket {
    /// Namespace connect acknowledged.
    Connect,
    /// Server-initiated namespace disconnect.
    Disconnect,
    /// Server refused the namespace connect.
    ConnectError(String),
    Event(InboundEvent),
}

/// All sensor events the server emits.
///
/// `connect` and `disconnect` are not listed: they are Socket.IO
/// lifecycle packets, surfaced as [`SocketPacket::Connect`] and
/// [`SocketPacket::Disconnect`].
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum InboundEvent {
    #[serde(rename = "connection_status")]
    ConnectionStatus(StatusData),

    #[serde(rename = "smoke_sensor_reading")]
    SmokeReading(SmokeReadingData),

    #[serde(rename = "smoke_alert")]
    SmokeAlert(AlertData),

    #[serde(rename = "rain_sensor_reading")]
    RainReading(RainReadingData),

    #[serde(rename = "rain_alert")]
    RainAlert(AlertData),

    #[serde(rename = "water_level_reading")]
    WaterLevelReading(WaterLevelData),

    #[serde(rename = "water_level_alert")]
    WaterLevelAlert(AlertData),

    /// Left as raw JSON; the frame relay resolves its shape.
    #[serde(rename = "camera_data")]
    CameraData(Value),

    #[serde(rename = "camera_alert")]
    CameraAlert(AlertData),
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusData {
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertData {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmokeReadingData {
    pub smoke_detected: bool,
    pub value: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RainReadingData {
    pub rain_detected: bool,
    pub value: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaterLevelData {
    pub value: f64,
    /// Legacy producers only.
    #[serde(default)]
    pub high_water_level: Option<bool>,
}

impl From<SmokeReadingData> for HazardReading {
    fn from(d: SmokeReadingData) -> Self {
        HazardReading::Smoke {
            detected: d.smoke_detected,
            raw_value: d.value,
        }
    }
}

impl From<RainReadingData> for HazardReading {
    fn from(d: RainReadingData) -> Self {
        HazardReading::Rain {
            detected: d.rain_detected,
            raw_value: d.value,
        }
    }
}

impl From<WaterLevelData> for HazardReading {
    fn from(d: WaterLevelData) -> Self {
        HazardReading::WaterLevel {
            raw_value: d.value,
            high_water_level: d.high_water_level,
        }
    }
}

/// Errors produced while decoding a text frame.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Empty frame")]
    Empty,

    #[error("Unknown packet type: {0}")]
    UnknownPacket(String),

    #[error("Unsupported packet: {0}")]
    Unsupported(&'static str),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Event packet is not a [name, payload] array")]
    BadEventArray,
}

/// Parse one Engine.IO text frame.
///
/// Returns `Err` for malformed frames, unknown event names, and payloads
/// missing required fields. Callers should log the error and continue.
pub fn parse_packet(text: &str) -> Result<EnginePacket, MessageError> {
    let mut chars = text.chars();
    let kind = chars.next().ok_or(MessageError::Empty)?;
    let body = chars.as_str();

    match kind {
        '0' => Ok(EnginePacket::Open(serde_json::from_str(body)?)),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping),
        '3' => Ok(EnginePacket::Pong),
        '4' => Ok(EnginePacket::Message(parse_socket_packet(body)?)),
        '5' => Err(MessageError::Unsupported("transport upgrade")),
        '6' => Ok(EnginePacket::Noop),
        other => Err(MessageError::UnknownPacket(other.to_string())),
    }
}

fn parse_socket_packet(body: &str) -> Result<SocketPacket, MessageError> {
    let mut chars = body.chars();
    let kind = chars.next().ok_or(MessageError::Empty)?;
    let rest = skip_ack_id(skip_namespace(chars.as_str()));

    match kind {
        '0' => Ok(SocketPacket::Connect),
        '1' => Ok(SocketPacket::Disconnect),
        '2' => Ok(SocketPacket::Event(parse_event(rest)?)),
        '4' => {
            let message = serde_json::from_str::<Value>(rest)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
                .unwrap_or_else(|| rest.to_string());
            Ok(SocketPacket::ConnectError(message))
        }
        '3' => Err(MessageError::Unsupported("ack")),
        '5' | '6' => Err(MessageError::Unsupported("binary event")),
        other => Err(MessageError::UnknownPacket(format!("4{other}"))),
    }
}

/// `/admin,["x"]` -> `["x"]`. The default namespace carries no prefix.
fn skip_namespace(s: &str) -> &str {
    if s.starts_with('/') {
        s.split_once(',').map_or("", |(_, rest)| rest)
    } else {
        s
    }
}

/// `12["x"]` -> `["x"]`.
fn skip_ack_id(s: &str) -> &str {
    s.trim_start_matches(|c: char| c.is_ascii_digit())
}

fn parse_event(body: &str) -> Result<InboundEvent, MessageError> {
    let array: Vec<Value> = serde_json::from_str(body)?;
    let mut items = array.into_iter();
    let name = match items.next() {
        Some(Value::String(name)) => name,
        _ => return Err(MessageError::BadEventArray),
    };
    let payload = items.next().unwrap_or(Value::Null);
    let envelope = serde_json::json!({ "type": name, "data": payload });
    Ok(serde_json::from_value(envelope)?)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn event(text: &str) -> InboundEvent {
        match parse_packet(text).unwrap() {
            EnginePacket::Message(SocketPacket::Event(e)) => e,
            other => panic!("Expected event, got {other:?}"),
        }
    }

    #[test]
    fn parse_open_handshake() {
        let text = r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;
        match parse_packet(text).unwrap() {
            EnginePacket::Open(h) => {
                assert_eq!(h.sid, "abc");
                assert_eq!(h.ping_interval, 25000);
                assert_eq!(h.ping_timeout, 20000);
            }
            other => panic!("Expected Open, got {other:?}"),
        }
    }

    #[test]
    fn parse_heartbeat_and_lifecycle_packets() {
        assert_matches!(parse_packet("2"), Ok(EnginePacket::Ping));
        assert_matches!(parse_packet("3"), Ok(EnginePacket::Pong));
        assert_matches!(parse_packet("1"), Ok(EnginePacket::Close));
        assert_matches!(parse_packet("6"), Ok(EnginePacket::Noop));
        assert_matches!(
            parse_packet(r#"40{"sid":"xyz"}"#),
            Ok(EnginePacket::Message(SocketPacket::Connect))
        );
        assert_matches!(
            parse_packet("41"),
            Ok(EnginePacket::Message(SocketPacket::Disconnect))
        );
    }

    #[test]
    fn parse_connect_error_message() {
        let packet = parse_packet(r#"44{"message":"Not authorized"}"#).unwrap();
        assert_matches!(
            packet,
            EnginePacket::Message(SocketPacket::ConnectError(m)) if m == "Not authorized"
        );
    }

    #[test]
    fn parse_water_level_reading() {
        match event(r#"42["water_level_reading",{"value":260}]"#) {
            InboundEvent::WaterLevelReading(d) => {
                assert_eq!(d.value, 260.0);
                assert!(d.high_water_level.is_none());
            }
            other => panic!("Expected WaterLevelReading, got {other:?}"),
        }
    }

    #[test]
    fn parse_legacy_water_level_override() {
        match event(r#"42["water_level_reading",{"value":12.5,"high_water_level":true}]"#) {
            InboundEvent::WaterLevelReading(d) => assert_eq!(d.high_water_level, Some(true)),
            other => panic!("Expected WaterLevelReading, got {other:?}"),
        }
    }

    #[test]
    fn parse_smoke_and_rain_readings() {
        match event(r#"42["smoke_sensor_reading",{"smoke_detected":true,"value":0.73}]"#) {
            InboundEvent::SmokeReading(d) => {
                assert!(d.smoke_detected);
                assert_eq!(d.value, 0.73);
            }
            other => panic!("Expected SmokeReading, got {other:?}"),
        }
        match event(r#"42["rain_sensor_reading",{"rain_detected":false,"value":0}]"#) {
            InboundEvent::RainReading(d) => assert!(!d.rain_detected),
            other => panic!("Expected RainReading, got {other:?}"),
        }
    }

    #[test]
    fn parse_alerts_and_status() {
        assert_matches!(
            event(r#"42["smoke_alert",{"message":"Smoke near intake"}]"#),
            InboundEvent::SmokeAlert(AlertData { message }) if message == "Smoke near intake"
        );
        assert_matches!(
            event(r#"42["camera_alert",{"message":"Lens blocked"}]"#),
            InboundEvent::CameraAlert(_)
        );
        assert_matches!(
            event(r#"42["connection_status",{"status":"sensors online"}]"#),
            InboundEvent::ConnectionStatus(StatusData { status }) if status == "sensors online"
        );
    }

    #[test]
    fn parse_camera_data_keeps_raw_payload() {
        match event(r#"42["camera_data",{"frame":{"image":"abc"},"fire_detected":1}]"#) {
            InboundEvent::CameraData(v) => {
                assert_eq!(v["frame"]["image"], "abc");
                assert_eq!(v["fire_detected"], 1);
            }
            other => panic!("Expected CameraData, got {other:?}"),
        }
    }

    #[test]
    fn namespace_and_ack_id_are_skipped() {
        assert_matches!(
            event(r#"42/,7["rain_alert",{"message":"heavy"}]"#),
            InboundEvent::RainAlert(_)
        );
        assert_matches!(
            event(r#"4215["water_level_alert",{"message":"rising"}]"#),
            InboundEvent::WaterLevelAlert(_)
        );
    }

    #[test]
    fn missing_required_field_is_an_error() {
        assert_matches!(
            parse_packet(r#"42["smoke_sensor_reading",{"value":1}]"#),
            Err(MessageError::Json(_))
        );
    }

    #[test]
    fn unknown_event_is_an_error() {
        assert_matches!(
            parse_packet(r#"42["humidity_reading",{"value":1}]"#),
            Err(MessageError::Json(_))
        );
    }

    #[test]
    fn malformed_frames_are_errors() {
        assert_matches!(parse_packet(""), Err(MessageError::Empty));
        assert_matches!(parse_packet("9"), Err(MessageError::UnknownPacket(_)));
        assert_matches!(parse_packet("42{}"), Err(MessageError::Json(_)));
        assert_matches!(parse_packet("42[1,2]"), Err(MessageError::BadEventArray));
        assert_matches!(parse_packet("451-[\"x\"]"), Err(MessageError::Unsupported(_)));
    }

    #[test]
    fn readings_convert_to_hazard_readings() {
        let reading: HazardReading = WaterLevelData {
            value: 510.0,
            high_water_level: None,
        }
        .into();
        assert_eq!(
            reading,
            HazardReading::WaterLevel {
                raw_value: 510.0,
                high_water_level: None
            }
        );
    }
}
