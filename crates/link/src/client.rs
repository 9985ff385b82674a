//! WebSocket client for the sensor server.
//!
//! [`EventSourceClient`] holds the endpoint and transport preferences.
//! Call [`EventSourceClient::connect`] to open a WebSocket, complete the
//! Engine.IO/Socket.IO handshake, and obtain a live [`EventConnection`].

use std::str::FromStr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use floodwatch_core::error::CoreError;

use crate::messages::{parse_packet, EnginePacket, SocketPacket, CONNECT_REQUEST, PONG};

/// The WebSocket stream type used for a live connection.
pub type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Path and query of the Engine.IO v4 WebSocket endpoint.
const SOCKET_IO_PATH: &str = "/socket.io/?EIO=4&transport=websocket";

/// Transports a Socket.IO producer may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    WebSocket,
    Polling,
}

impl FromStr for Transport {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "websocket" => Ok(Transport::WebSocket),
            "polling" => Ok(Transport::Polling),
            other => Err(CoreError::Configuration(format!(
                "unknown transport '{other}' (expected 'websocket' or 'polling')"
            ))),
        }
    }
}

/// Check a transport preference list. Only WebSocket is implemented.
pub fn validate_transports(transports: &[Transport]) -> Result<(), CoreError> {
    if !transports.contains(&Transport::WebSocket) {
        return Err(CoreError::Configuration(
            "transport list must include 'websocket'".into(),
        ));
    }
    if transports.contains(&Transport::Polling) {
        tracing::warn!("Long-polling transport is not supported, using websocket only");
    }
    Ok(())
}

/// Build the Engine.IO WebSocket URL for a server endpoint.
///
/// `http`/`https` endpoints map to `ws`/`wss`.
pub fn socket_url(endpoint: &str) -> Result<String, CoreError> {
    let endpoint = endpoint.trim().trim_end_matches('/');
    let (scheme, rest) = endpoint.split_once("://").ok_or_else(|| {
        CoreError::Configuration(format!("endpoint '{endpoint}' has no scheme"))
    })?;
    let ws_scheme = match scheme.to_ascii_lowercase().as_str() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(CoreError::Configuration(format!(
                "unsupported endpoint scheme '{other}'"
            )))
        }
    };
    if rest.is_empty() {
        return Err(CoreError::Configuration(format!(
            "endpoint '{endpoint}' has no host"
        )));
    }
    Ok(format!("{ws_scheme}://{rest}{SOCKET_IO_PATH}"))
}

/// Connection settings for the sensor server.
#[derive(Debug)]
pub struct EventSourceClient {
    url: String,
    connect_timeout: Duration,
}

/// A live, handshaken connection to the sensor server.
#[derive(Debug)]
pub struct EventConnection {
    /// Local identifier for tracing this connection.
    pub session_id: String,
    /// Engine.IO session id assigned by the server.
    pub sid: String,
    /// Silence longer than this means the server is gone.
    pub heartbeat_timeout: Duration,
    /// The raw WebSocket stream for reading/writing frames.
    pub ws_stream: WsStream,
}

impl EventSourceClient {
    /// * `endpoint`        - server base URL, e.g. `http://host:5000`.
    /// * `connect_timeout` - bound on socket open plus handshake.
    pub fn new(endpoint: &str, connect_timeout: Duration) -> Result<Self, CoreError> {
        Ok(Self {
            url: socket_url(endpoint)?,
            connect_timeout,
        })
    }

    /// Full WebSocket URL including the Engine.IO query.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Open the WebSocket and complete the handshake within the connect timeout.
    pub async fn connect(&self) -> Result<EventConnection, LinkError> {
        tokio::time::timeout(self.connect_timeout, self.open())
            .await
            .map_err(|_| LinkError::Timeout(self.connect_timeout))?
    }

    async fn open(&self) -> Result<EventConnection, LinkError> {
        let session_id = uuid::Uuid::new_v4().to_string();

        let (mut ws_stream, _response) = connect_async(&self.url).await.map_err(|e| {
            LinkError::Connection(format!("Failed to connect to {}: {e}", self.url))
        })?;

        let handshake = loop {
            match next_packet(&mut ws_stream).await? {
                EnginePacket::Open(handshake) => break handshake,
                EnginePacket::Noop => {}
                other => {
                    return Err(LinkError::Protocol(format!(
                        "expected open packet, got {other:?}"
                    )))
                }
            }
        };

        ws_stream
            .send(Message::Text(CONNECT_REQUEST.to_string()))
            .await
            .map_err(|e| LinkError::Connection(e.to_string()))?;

        loop {
            match next_packet(&mut ws_stream).await? {
                EnginePacket::Message(SocketPacket::Connect) => break,
                EnginePacket::Message(SocketPacket::ConnectError(message)) => {
                    return Err(LinkError::Protocol(format!("connect refused: {message}")))
                }
                EnginePacket::Ping => {
                    ws_stream
                        .send(Message::Text(PONG.to_string()))
                        .await
                        .map_err(|e| LinkError::Connection(e.to_string()))?;
                }
                EnginePacket::Close => {
                    return Err(LinkError::Connection("server closed during handshake".into()))
                }
                other => {
                    tracing::debug!(session_id = %session_id, packet = ?other, "Ignoring packet during handshake");
                }
            }
        }

        tracing::info!(
            session_id = %session_id,
            sid = %handshake.sid,
            ping_interval_ms = handshake.ping_interval,
            "Connected to sensor server at {}",
            self.url,
        );

        Ok(EventConnection {
            session_id,
            sid: handshake.sid,
            heartbeat_timeout: Duration::from_millis(
                handshake.ping_interval.saturating_add(handshake.ping_timeout),
            ),
            ws_stream,
        })
    }
}

/// Read frames until one decodes into a packet.
async fn next_packet(ws_stream: &mut WsStream) -> Result<EnginePacket, LinkError> {
    loop {
        match ws_stream.next().await {
            Some(Ok(Message::Text(text))) => {
                return parse_packet(&text).map_err(|e| LinkError::Protocol(e.to_string()))
            }
            Some(Ok(Message::Close(frame))) => {
                return Err(LinkError::Connection(format!(
                    "closed during handshake: {frame:?}"
                )))
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(LinkError::Connection(e.to_string())),
            None => return Err(LinkError::Connection("stream ended during handshake".into())),
        }
    }
}

/// Errors that can occur while establishing a connection.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Failed to open the socket, or it dropped during the handshake.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The socket opened but the handshake was not understood or was refused.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Socket open plus handshake exceeded the connect timeout.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}
